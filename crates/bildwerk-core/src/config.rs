// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image ingestion configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BildwerkError, Result};
use crate::types::{DEFAULT_JPEG_QUALITY, SOURCE_DPI};

/// Settings applied when images are decoded and re-encoded.
///
/// Quality is captured at decode time; changing the config afterwards does
/// not affect images that are already loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// JPEG quality (1-100, default 75).
    pub jpeg_quality: u8,
    /// Initial interpolation hint handed to drawing contexts.
    pub interpolate: bool,
    /// Assumed source resolution. Must stay at 96.
    pub source_dpi: f64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            interpolate: true,
            source_dpi: SOURCE_DPI,
        }
    }
}

impl ImageConfig {
    /// Reject values the encoders can't honour.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(BildwerkError::InvalidArgument(format!(
                "jpeg_quality {} outside 1..=100",
                self.jpeg_quality
            )));
        }
        if self.source_dpi != SOURCE_DPI {
            return Err(BildwerkError::InvalidArgument(format!(
                "source_dpi is fixed at {}, got {}",
                SOURCE_DPI, self.source_dpi
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
