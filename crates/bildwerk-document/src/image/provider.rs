// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image source provider — the pluggable decoding backend, and the
// process-wide default used when callers do not inject one.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use bildwerk_core::DEFAULT_JPEG_QUALITY;
use bildwerk_core::error::{BildwerkError, Result};
use tracing::info;

use super::backend::RasterProvider;
use super::handle::DecodedImage;
use super::source::{BufferSource, StreamSource};

/// Turns raw input into a [`DecodedImage`].
///
/// Providers hold no per-image state; each call is independent. `quality`
/// is the JPEG quality baked into the returned handle (1-100, `None` means
/// [`DEFAULT_JPEG_QUALITY`]).
pub trait ImageSourceProvider: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    /// Decode the file at `path`. The handle is named after the path.
    fn decode_file(&self, path: &Path, quality: Option<u8>) -> Result<Box<dyn DecodedImage>>;

    /// Open `source` once, decode everything it yields, then drop the stream.
    fn decode_stream(
        &self,
        name: &str,
        source: &mut dyn StreamSource,
        quality: Option<u8>,
    ) -> Result<Box<dyn DecodedImage>>;

    /// Read `source` once and decode the bytes.
    fn decode_buffer(
        &self,
        name: &str,
        source: &mut dyn BufferSource,
        quality: Option<u8>,
    ) -> Result<Box<dyn DecodedImage>>;
}

/// Apply the default and range-check a requested quality.
pub fn resolve_quality(quality: Option<u8>) -> Result<u8> {
    let quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY);
    if !(1..=100).contains(&quality) {
        return Err(BildwerkError::InvalidArgument(format!(
            "quality {} outside 1..=100",
            quality
        )));
    }
    Ok(quality)
}

static PROVIDER: OnceLock<Arc<dyn ImageSourceProvider>> = OnceLock::new();

/// The process-wide provider, installing [`RasterProvider`] on first use.
pub fn default_provider() -> Arc<dyn ImageSourceProvider> {
    PROVIDER
        .get_or_init(|| {
            info!("Installing default image source provider");
            let provider: Arc<dyn ImageSourceProvider> = Arc::new(RasterProvider::new());
            provider
        })
        .clone()
}

/// Replace the default backend. Only possible before anything has asked for
/// [`default_provider`]; afterwards the active provider is kept and an
/// `InvariantViolation` is returned.
pub fn install_provider(provider: Arc<dyn ImageSourceProvider>) -> Result<()> {
    let name = provider.name().to_string();
    PROVIDER.set(provider).map_err(|_rejected| {
        let active = PROVIDER.get().map(|p| p.name().to_string()).unwrap_or_default();
        BildwerkError::InvariantViolation(format!(
            "cannot install provider '{}': '{}' is already active",
            name, active
        ))
    })?;
    info!(provider = %name, "Image source provider installed");
    Ok(())
}
