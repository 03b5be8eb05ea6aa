// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page canvas — a drawing context that places images on a single PDF page
// using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: a page is a `Vec<Op>`, images are
// registered once as XObjects and referenced by `Op::UseXobject`.

use std::collections::HashMap;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::{ContextId, ImageId, POINTS_PER_INCH, PointRect, PointSize, SOURCE_DPI};
use image::ImageFormat;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectId, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::image::{ImageRegistry, PdfImage};

/// A4 in points.
pub const A4: PointSize = PointSize {
    width: 595.0,
    height: 842.0,
};

const MM_PER_INCH: f64 = 25.4;

/// Something images can be drawn onto.
///
/// A context owns an [`ImageRegistry`]; drawing an image associates it with
/// the context, and the image can only be placed elsewhere once it has been
/// released again.
pub trait DrawingContext {
    fn registry(&self) -> &ImageRegistry;

    fn id(&self) -> ContextId {
        self.registry().context_id()
    }

    /// Place `image` into `rect` (points, origin top-left).
    fn draw_image(&mut self, image: &mut PdfImage, rect: PointRect) -> Result<()>;

    /// End the association between `image` and this context.
    fn release_image(&mut self, image: &mut PdfImage) -> Result<()> {
        image.disassociate_from(self.registry())
    }
}

/// One PDF page under construction.
pub struct PageCanvas {
    registry: ImageRegistry,
    size: PointSize,
    document: PdfDocument,
    ops: Vec<Op>,
    /// XObjects already added to `document`, so each image is embedded once.
    embedded: HashMap<ImageId, XObjectId>,
}

impl PageCanvas {
    /// Empty page of `size` points titled `title`.
    pub fn new(title: &str, size: PointSize) -> Self {
        Self {
            registry: ImageRegistry::new(),
            size,
            document: PdfDocument::new(title),
            ops: Vec::new(),
            embedded: HashMap::new(),
        }
    }

    pub fn a4(title: &str) -> Self {
        Self::new(title, A4)
    }

    pub fn page_size(&self) -> PointSize {
        self.size
    }

    /// Number of distinct images embedded so far.
    pub fn image_count(&self) -> usize {
        self.embedded.len()
    }

    /// Number of placements drawn so far.
    pub fn placement_count(&self) -> usize {
        self.ops.len()
    }

    /// Place `image` at `(x, y)` at its natural point size.
    pub fn draw_image_at(&mut self, image: &mut PdfImage, x: f64, y: f64) -> Result<()> {
        let rect = PointRect::from_origin_size(x, y, image.size());
        self.draw_image(image, rect)
    }

    /// Serialise the page. Images drawn here lose their association once
    /// the canvas is gone.
    #[instrument(skip(self), fields(placements = self.ops.len()))]
    pub fn save(self) -> Vec<u8> {
        let Self {
            size,
            mut document,
            ops,
            ..
        } = self;
        let page = PdfPage::new(points_to_mm(size.width), points_to_mm(size.height), ops);
        document.with_pages(vec![page]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = document.save(&PdfSaveOptions::default(), &mut warnings);
        info!(bytes = output.len(), warnings = warnings.len(), "Page saved");
        output
    }

    /// Register `image` as an XObject, re-encoding it the way its declared
    /// format asks for.
    fn embed(&mut self, image: &PdfImage) -> Result<XObjectId> {
        if let Some(id) = self.embedded.get(&image.id()) {
            return Ok(id.clone());
        }

        let (pixels, data_format) = if image.has_transparency() {
            let stream = image.as_bitmap()?;
            let decoded = image::load_from_memory_with_format(stream.get_ref(), ImageFormat::Bmp)
                .map_err(|err| {
                    BildwerkError::Encode(format!("bitmap for {} unreadable: {}", image.path(), err))
                })?;
            (decoded.to_rgba8().into_raw(), RawImageFormat::RGBA8)
        } else {
            let stream = image.as_jpeg()?;
            let decoded = image::load_from_memory_with_format(stream.get_ref(), ImageFormat::Jpeg)
                .map_err(|err| {
                    BildwerkError::Encode(format!("JPEG for {} unreadable: {}", image.path(), err))
                })?;
            (decoded.to_rgb8().into_raw(), RawImageFormat::RGB8)
        };

        let raw = RawImage {
            pixels: RawImageData::U8(pixels),
            width: image.pixel_width() as usize,
            height: image.pixel_height() as usize,
            data_format,
            tag: Vec::new(),
        };
        let id = self.document.add_image(&raw);
        self.embedded.insert(image.id(), id.clone());
        debug!(path = image.path(), format = ?image.format(), "Image embedded");
        Ok(id)
    }
}

impl DrawingContext for PageCanvas {
    fn registry(&self) -> &ImageRegistry {
        &self.registry
    }

    #[instrument(skip(self, image), fields(path = image.path()))]
    fn draw_image(&mut self, image: &mut PdfImage, rect: PointRect) -> Result<()> {
        if !(rect.x.is_finite() && rect.y.is_finite()) {
            return Err(BildwerkError::InvalidArgument(format!(
                "placement origin ({}, {}) must be finite",
                rect.x, rect.y
            )));
        }
        // NaN fails both comparisons.
        if !(rect.width > 0.0 && rect.width.is_finite())
            || !(rect.height > 0.0 && rect.height.is_finite())
        {
            return Err(BildwerkError::InvalidArgument(format!(
                "placement {}x{} must be positive and finite",
                rect.width, rect.height
            )));
        }
        let newly_associated = image.associated_context() != Some(self.registry.context_id());
        if newly_associated {
            image.associate(&self.registry)?;
        }

        let id = match self.embed(image) {
            Ok(id) => id,
            Err(err) => {
                if newly_associated {
                    image.disassociate_from(&self.registry)?;
                }
                return Err(err);
            }
        };

        // At SOURCE_DPI the XObject's natural size equals the image's point size.
        let natural = image.size();
        let scale_x = (rect.width / natural.width) as f32;
        let scale_y = (rect.height / natural.height) as f32;
        // PDF user space grows upwards from the bottom-left corner.
        let bottom = self.size.height - rect.y - rect.height;

        self.ops.push(Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(Pt(rect.x as f32)),
                translate_y: Some(Pt(bottom as f32)),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                dpi: Some(SOURCE_DPI as f32),
                rotate: None,
            },
        });
        debug!(x = rect.x, y = rect.y, scale_x, scale_y, "Image placed");
        Ok(())
    }
}

fn points_to_mm(points: f64) -> Mm {
    Mm((points / POINTS_PER_INCH * MM_PER_INCH) as f32)
}
