// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Bildwerk image ingestion.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resolution every source image is assumed to have. Embedded DPI metadata is
/// never consulted.
pub const SOURCE_DPI: f64 = 96.0;

/// PDF user-space units per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// JPEG quality used when the caller does not pick one.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Bit depth of bitmap output; 32 keeps the alpha channel.
pub const BITMAP_BITS_PER_PIXEL: u8 = 32;

/// Marks a display name as generated rather than a real path.
pub const SYNTHETIC_NAME_PREFIX: char = '*';

/// Unique identifier for one image facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(pub Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one drawing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Format an image intends to be embedded with, fixed when the image is loaded.
///
/// The tag only reflects whether the source has an alpha channel. It does not
/// promise that a lossless encoder is available: the bitmap path is the one
/// that keeps alpha, and `Png` is just the name the tag has always carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclaredFormat {
    /// Opaque, continuous-tone content. Embedded as lossy JPEG.
    Jpeg,
    /// Content with transparency.
    Png,
}

impl DeclaredFormat {
    pub fn from_transparency(has_transparency: bool) -> Self {
        if has_transparency { Self::Png } else { Self::Jpeg }
    }

    /// MIME type string matching the tag.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn is_lossless_intent(&self) -> bool {
        matches!(self, Self::Png)
    }
}

/// A size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSize {
    pub width: f64,
    pub height: f64,
}

impl PointSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A placement rectangle in PDF points, origin at the top-left of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PointRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_origin_size(x: f64, y: f64, size: PointSize) -> Self {
        Self::new(x, y, size.width, size.height)
    }

    pub fn size(&self) -> PointSize {
        PointSize::new(self.width, self.height)
    }
}

/// Convert a pixel count at [`SOURCE_DPI`] into PDF points.
pub fn pixels_to_points(pixels: u32) -> f64 {
    pixels as f64 * POINTS_PER_INCH / SOURCE_DPI
}

/// Generate a placeholder name for an image that has no path, e.g.
/// `*{67e55044-10b1-426f-9247-bb680e5fe0c8}`.
pub fn synthetic_name() -> String {
    format!("{}{{{}}}", SYNTHETIC_NAME_PREFIX, Uuid::new_v4())
}

/// Whether `name` was produced by [`synthetic_name`].
pub fn is_synthetic_name(name: &str) -> bool {
    name.starts_with(SYNTHETIC_NAME_PREFIX)
}
