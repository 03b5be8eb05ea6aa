// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster backend — the default image source provider, decoding with the
// `image` crate and re-encoding to JPEG or 32-bit BMP.

use std::io::{Read, Write};
use std::path::Path;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::{BITMAP_BITS_PER_PIXEL, synthetic_name};
use image::DynamicImage;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, info, instrument};

use super::handle::DecodedImage;
use super::provider::{ImageSourceProvider, resolve_quality};
use super::source::{BufferSource, StreamSource};

/// Default provider backed by the `image` crate.
#[derive(Debug, Clone, Default)]
pub struct RasterProvider;

impl RasterProvider {
    pub fn new() -> Self {
        Self
    }

    /// Wrap an image that was decoded elsewhere. The handle gets a synthetic
    /// name since there is no path to identify it by.
    pub fn from_dynamic(image: DynamicImage, quality: Option<u8>) -> Result<RasterHandle> {
        let quality = resolve_quality(quality)?;
        RasterHandle::new(synthetic_name(), image, quality)
    }

    fn handle(
        &self,
        name: &str,
        image: DynamicImage,
        quality: Option<u8>,
    ) -> Result<Box<dyn DecodedImage>> {
        let quality = resolve_quality(quality)?;
        let handle = RasterHandle::new(name.to_string(), image, quality)?;
        info!(
            name,
            width = handle.width,
            height = handle.height,
            transparent = handle.has_alpha,
            "Image decoded"
        );
        Ok(Box::new(handle))
    }
}

impl ImageSourceProvider for RasterProvider {
    fn name(&self) -> &str {
        "image-rs"
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    fn decode_file(&self, path: &Path, quality: Option<u8>) -> Result<Box<dyn DecodedImage>> {
        let image = image::ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|err| {
                BildwerkError::Decode(format!("failed to open {}: {}", path.display(), err))
            })?
            .decode()
            .map_err(|err| {
                BildwerkError::Decode(format!("failed to decode {}: {}", path.display(), err))
            })?;
        self.handle(&path.display().to_string(), image, quality)
    }

    #[instrument(skip(self, source))]
    fn decode_stream(
        &self,
        name: &str,
        source: &mut dyn StreamSource,
        quality: Option<u8>,
    ) -> Result<Box<dyn DecodedImage>> {
        let mut data = Vec::new();
        {
            let mut stream = source.open().map_err(|err| {
                BildwerkError::Decode(format!("failed to open image stream: {}", err))
            })?;
            stream.read_to_end(&mut data).map_err(|err| {
                BildwerkError::Decode(format!("failed to read image stream: {}", err))
            })?;
        }
        debug!(data_len = data.len(), "Stream drained");
        let image = decode_bytes(&data)?;
        self.handle(name, image, quality)
    }

    #[instrument(skip(self, source))]
    fn decode_buffer(
        &self,
        name: &str,
        source: &mut dyn BufferSource,
        quality: Option<u8>,
    ) -> Result<Box<dyn DecodedImage>> {
        let data = source.read().map_err(|err| {
            BildwerkError::Decode(format!("failed to read image buffer: {}", err))
        })?;
        let image = decode_bytes(&data)?;
        self.handle(name, image, quality)
    }
}

/// A decoded image held by the raster backend.
pub struct RasterHandle {
    name: String,
    width: u32,
    height: u32,
    has_alpha: bool,
    quality: u8,
    /// Pixel data; `None` once released.
    image: Option<DynamicImage>,
}

impl RasterHandle {
    /// Wrap a decoded image. Zero-sized images are rejected.
    pub fn new(name: String, image: DynamicImage, quality: u8) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(BildwerkError::Decode(format!(
                "{} has no pixels ({}x{})",
                name,
                image.width(),
                image.height()
            )));
        }
        Ok(Self {
            width: image.width(),
            height: image.height(),
            has_alpha: image.color().has_alpha(),
            name,
            quality,
            image: Some(image),
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn pixels(&self) -> Result<&DynamicImage> {
        self.image.as_ref().ok_or_else(|| {
            BildwerkError::Encode(format!("{} has already been released", self.name))
        })
    }
}

impl DecodedImage for RasterHandle {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn has_transparency(&self) -> bool {
        self.has_alpha
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn encode_jpeg(&self, out: &mut dyn Write) -> Result<()> {
        // JPEG has no alpha channel.
        let rgb = self.pixels()?.to_rgb8();
        let encoder = JpegEncoder::new_with_quality(out, self.quality);
        rgb.write_with_encoder(encoder).map_err(|err| {
            BildwerkError::Encode(format!("JPEG encoding failed: {}", err))
        })?;
        debug!(name = %self.name, quality = self.quality, "Encoded JPEG");
        Ok(())
    }

    fn encode_bitmap(&self, mut out: &mut dyn Write) -> Result<()> {
        // Always RGBA so the output is 32 bpp, opaque sources included.
        let rgba = self.pixels()?.to_rgba8();
        let encoder = BmpEncoder::new(&mut out);
        rgba.write_with_encoder(encoder)
            .map_err(|err| BildwerkError::Encode(format!("BMP encoding failed: {}", err)))?;
        debug!(name = %self.name, bits_per_pixel = BITMAP_BITS_PER_PIXEL, "Encoded BMP");
        Ok(())
    }

    fn release(&mut self) {
        if self.image.take().is_some() {
            debug!(name = %self.name, "Pixel buffer released");
        }
    }

    fn is_released(&self) -> bool {
        self.image.is_none()
    }
}

impl Drop for RasterHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Decode in-memory bytes, sniffing the container from its signature.
fn decode_bytes(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|err| BildwerkError::Decode(format!("failed to decode image: {}", err)))
}
