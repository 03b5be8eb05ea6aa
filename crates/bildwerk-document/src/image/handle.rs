// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoded image handle — the backend-neutral view of one decoded image.

use std::fmt;
use std::io::Write;

use bildwerk_core::error::Result;

/// One fully decoded image, owned by exactly one `PdfImage`.
///
/// Geometry, transparency and name are fixed once decoding finishes and stay
/// readable after [`release`](DecodedImage::release). Encoding a released
/// handle fails with `BildwerkError::Encode`; it never writes empty output.
pub trait DecodedImage: Send {
    /// Pixel width.
    fn width(&self) -> u32;

    /// Pixel height.
    fn height(&self) -> u32;

    /// True if the source carries an alpha channel.
    fn has_transparency(&self) -> bool;

    /// Stable display name: the source path or a synthetic `*{uuid}` token.
    fn name(&self) -> &str;

    /// Write the image as a lossy JPEG at the quality chosen at decode time.
    fn encode_jpeg(&self, out: &mut dyn Write) -> Result<()>;

    /// Write the image as an uncompressed 32 bpp BMP.
    fn encode_bitmap(&self, out: &mut dyn Write) -> Result<()>;

    /// Hand the pixel buffer back to the backend. Calling it twice is a no-op.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

impl fmt::Debug for dyn DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("name", &self.name())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("transparent", &self.has_transparency())
            .field("released", &self.is_released())
            .finish()
    }
}
