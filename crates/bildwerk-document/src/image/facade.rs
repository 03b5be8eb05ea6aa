// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image facade — what callers hold: geometry in PDF points, the declared
// embedding format, re-encoding to JPEG/BMP, and the exclusive association
// with one drawing context.

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::{
    ContextId, DeclaredFormat, ImageConfig, ImageId, PointSize, SOURCE_DPI, pixels_to_points,
    synthetic_name,
};
use tracing::{debug, info, instrument, warn};

use super::backend::RasterProvider;
use super::handle::DecodedImage;
use super::provider::{ImageSourceProvider, default_provider};
use super::registry::{ImageRegistry, RegistryLink};
use super::source::{BufferSource, StreamSource};
use crate::pdf::form::{PdfForm, pdf_signature_version};

/// Builds [`PdfImage`]s through an explicit provider and config.
///
/// `ImageLoader::default()` uses the process-wide provider; tests and
/// alternate backends pass their own to [`ImageLoader::new`].
#[derive(Clone)]
pub struct ImageLoader {
    provider: Arc<dyn ImageSourceProvider>,
    config: ImageConfig,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            config: ImageConfig::default(),
        }
    }
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageLoader")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ImageLoader {
    pub fn new(provider: Arc<dyn ImageSourceProvider>, config: ImageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    /// Loader over a fresh [`RasterProvider`].
    pub fn from_config(config: ImageConfig) -> Result<Self> {
        Self::new(Arc::new(RasterProvider::new()), config)
    }

    pub fn provider(&self) -> &Arc<dyn ImageSourceProvider> {
        &self.provider
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Load a file. PDFs (detected by signature, not extension) come back as
    /// [`LoadedImage::PageForm`]; everything else is decoded as a raster.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file(&self, path: impl AsRef<Path>) -> Result<LoadedImage> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(BildwerkError::InvalidArgument("image path is empty".into()));
        }

        let signature = pdf_signature_version(path).map_err(|err| {
            BildwerkError::Decode(format!("failed to read {}: {}", path.display(), err))
        })?;
        if let Some(version) = signature {
            info!(version, "File is a PDF, loading as page form");
            return Ok(LoadedImage::PageForm(PdfForm::open(path)?));
        }

        let handle = self
            .provider
            .decode_file(path, Some(self.config.jpeg_quality))?;
        Ok(LoadedImage::Raster(PdfImage::new(
            path.display().to_string(),
            handle,
            &self.config,
        )))
    }

    /// Decode an image from a stream factory, invoked once.
    pub fn from_stream<S: StreamSource>(&self, mut source: S) -> Result<PdfImage> {
        let path = synthetic_name();
        let quality = Some(self.config.jpeg_quality);
        let handle = self.provider.decode_stream(&path, &mut source, quality)?;
        Ok(PdfImage::new(path, handle, &self.config))
    }

    /// Decode an image from a byte-buffer factory, invoked once.
    pub fn from_buffer<B: BufferSource>(&self, mut source: B) -> Result<PdfImage> {
        let path = synthetic_name();
        let quality = Some(self.config.jpeg_quality);
        let handle = self.provider.decode_buffer(&path, &mut source, quality)?;
        Ok(PdfImage::new(path, handle, &self.config))
    }

    /// Wrap a handle decoded elsewhere. Its own name becomes the path.
    ///
    /// The handle keeps the JPEG quality it was decoded with; this loader's
    /// `jpeg_quality` is not applied. Only `interpolate` comes from the config.
    pub fn from_decoded(&self, handle: Box<dyn DecodedImage>) -> Result<PdfImage> {
        if handle.is_released() {
            return Err(BildwerkError::InvalidArgument(format!(
                "handle {} has already been released",
                handle.name()
            )));
        }
        Ok(PdfImage::new(handle.name().to_string(), handle, &self.config))
    }
}

/// Result of loading a file: a raster image or a PDF page used as an image.
#[derive(Debug)]
pub enum LoadedImage {
    Raster(PdfImage),
    PageForm(PdfForm),
}

impl LoadedImage {
    pub fn path(&self) -> &str {
        match self {
            Self::Raster(image) => image.path(),
            Self::PageForm(form) => form.path(),
        }
    }

    /// Natural size in points (first page for page forms).
    pub fn point_size(&self) -> PointSize {
        match self {
            Self::Raster(image) => image.size(),
            Self::PageForm(form) => form.point_size(),
        }
    }

    pub fn as_raster(&self) -> Option<&PdfImage> {
        match self {
            Self::Raster(image) => Some(image),
            Self::PageForm(_) => None,
        }
    }

    pub fn into_raster(self) -> Option<PdfImage> {
        match self {
            Self::Raster(image) => Some(image),
            Self::PageForm(_) => None,
        }
    }
}

/// A decoded image ready to be measured, re-encoded and placed on a page.
///
/// Owns its [`DecodedImage`] exclusively. Geometry assumes a 96 DPI source:
/// one pixel is 0.75 pt. At most one drawing context may be associated at a
/// time; associate and disassociate calls must pair up.
pub struct PdfImage {
    id: ImageId,
    /// Source path, or a `*{uuid}` placeholder for stream/buffer input.
    path: String,
    source: Box<dyn DecodedImage>,
    format: DeclaredFormat,
    interpolate: bool,
    association: Option<RegistryLink>,
    disposed: bool,
}

impl PdfImage {
    fn new(path: String, source: Box<dyn DecodedImage>, config: &ImageConfig) -> Self {
        let format = DeclaredFormat::from_transparency(source.has_transparency());
        Self {
            id: ImageId::new(),
            path,
            source,
            format,
            interpolate: config.interpolate,
            association: None,
            disposed: false,
        }
    }

    // -- Construction through the default provider ---------------------------

    /// Load a file with the default loader. See [`ImageLoader::from_file`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<LoadedImage> {
        ImageLoader::default().from_file(path)
    }

    pub fn from_stream<S: StreamSource>(source: S) -> Result<Self> {
        ImageLoader::default().from_stream(source)
    }

    pub fn from_buffer<B: BufferSource>(source: B) -> Result<Self> {
        ImageLoader::default().from_buffer(source)
    }

    pub fn from_decoded(handle: Box<dyn DecodedImage>) -> Result<Self> {
        ImageLoader::default().from_decoded(handle)
    }

    /// Whether `path` is a PDF that [`PdfImage::from_file`] would load as a
    /// page form. Unreadable paths report `false`.
    pub fn exists_file(path: impl AsRef<Path>) -> bool {
        matches!(pdf_signature_version(path.as_ref()), Ok(Some(_)))
    }

    // -- Accessors ------------------------------------------------------------

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn pixel_width(&self) -> u32 {
        self.source.width()
    }

    pub fn pixel_height(&self) -> u32 {
        self.source.height()
    }

    pub fn point_width(&self) -> f64 {
        pixels_to_points(self.source.width())
    }

    pub fn point_height(&self) -> f64 {
        pixels_to_points(self.source.height())
    }

    /// Always 96; resolution metadata in the source is ignored.
    pub fn horizontal_resolution(&self) -> f64 {
        SOURCE_DPI
    }

    /// Always 96; resolution metadata in the source is ignored.
    pub fn vertical_resolution(&self) -> f64 {
        SOURCE_DPI
    }

    pub fn size(&self) -> PointSize {
        PointSize::new(self.point_width(), self.point_height())
    }

    /// Format tag chosen at load time from the transparency flag.
    pub fn format(&self) -> DeclaredFormat {
        self.format
    }

    pub fn has_transparency(&self) -> bool {
        self.source.has_transparency()
    }

    /// Hint for drawing contexts: smooth the image when it is scaled.
    pub fn interpolate_on_scale(&self) -> bool {
        self.interpolate
    }

    pub fn set_interpolate_on_scale(&mut self, interpolate: bool) {
        self.interpolate = interpolate;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // -- Re-encoding ----------------------------------------------------------

    /// Encode as JPEG into a fresh in-memory stream positioned at the start.
    pub fn as_jpeg(&self) -> Result<Cursor<Vec<u8>>> {
        let mut buffer = Vec::new();
        self.source.encode_jpeg(&mut buffer)?;
        debug!(path = %self.path, bytes = buffer.len(), "Re-encoded as JPEG");
        Ok(Cursor::new(buffer))
    }

    /// Encode as 32-bit BMP into a fresh in-memory stream positioned at the start.
    pub fn as_bitmap(&self) -> Result<Cursor<Vec<u8>>> {
        let mut buffer = Vec::new();
        self.source.encode_bitmap(&mut buffer)?;
        debug!(path = %self.path, bytes = buffer.len(), "Re-encoded as BMP");
        Ok(Cursor::new(buffer))
    }

    // -- Association ----------------------------------------------------------

    /// The context this image is associated with, if that context still
    /// exists and still lists this image.
    pub fn associated_context(&self) -> Option<ContextId> {
        self.association
            .as_ref()
            .filter(|link| link.is_live(self.id))
            .map(|link| link.context)
    }

    pub fn is_associated(&self) -> bool {
        self.associated_context().is_some()
    }

    /// Associate with the context owning `registry`. Fails if already
    /// associated with any context, including this one.
    pub fn associate(&mut self, registry: &ImageRegistry) -> Result<()> {
        if self.disposed {
            return Err(BildwerkError::InvariantViolation(format!(
                "image {} is disposed",
                self.path
            )));
        }
        self.prune_dead_association();
        if let Some(link) = &self.association {
            return Err(BildwerkError::InvariantViolation(format!(
                "image {} is already associated with context {}",
                self.path, link.context
            )));
        }
        registry.attach(self.id)?;
        self.association = Some(registry.link());
        debug!(path = %self.path, context = %registry.context_id(), "Image associated");
        Ok(())
    }

    /// End the current association and make the context forget this image.
    pub fn disassociate(&mut self) -> Result<()> {
        self.prune_dead_association();
        let link = self.association.take().ok_or_else(|| {
            BildwerkError::InvariantViolation(format!(
                "image {} is not associated with a context",
                self.path
            ))
        })?;
        link.detach(self.id);
        debug!(path = %self.path, context = %link.context, "Image disassociated");
        Ok(())
    }

    /// Like [`disassociate`](Self::disassociate) but also fails when the
    /// image is associated with a context other than `registry`'s.
    pub fn disassociate_from(&mut self, registry: &ImageRegistry) -> Result<()> {
        self.prune_dead_association();
        match &self.association {
            Some(link) if link.context == registry.context_id() => {}
            Some(link) => {
                return Err(BildwerkError::InvariantViolation(format!(
                    "image {} is associated with context {}, not {}",
                    self.path,
                    link.context,
                    registry.context_id()
                )));
            }
            None => {
                return Err(BildwerkError::InvariantViolation(format!(
                    "image {} is not associated with context {}",
                    self.path,
                    registry.context_id()
                )));
            }
        }
        self.association = None;
        registry.notify_image_detached(self.id);
        debug!(path = %self.path, context = %registry.context_id(), "Image disassociated");
        Ok(())
    }

    /// A link whose registry is gone, or which the context has detached,
    /// counts as no association.
    fn prune_dead_association(&mut self) {
        let id = self.id;
        if self.association.as_ref().is_some_and(|link| !link.is_live(id)) {
            self.association = None;
        }
    }

    // -- Disposal -------------------------------------------------------------

    /// Release the decoded pixels. Disassociates first if needed. Idempotent;
    /// geometry stays readable, re-encoding fails afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(link) = self.association.take() {
            warn!(path = %self.path, context = %link.context, "Disposing an associated image");
            link.detach(self.id);
        }
        self.source.release();
        self.disposed = true;
        debug!(path = %self.path, "Image disposed");
    }
}

impl Drop for PdfImage {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for PdfImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfImage")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("pixels", &(self.pixel_width(), self.pixel_height()))
            .field("format", &self.format)
            .field("associated_context", &self.associated_context())
            .field("disposed", &self.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bildwerk_core::ErrorKind;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io;

    fn png(image: DynamicImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn opaque_png(width: u32, height: u32) -> Vec<u8> {
        png(DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 120, 200]))))
    }

    fn alpha_png(width: u32, height: u32) -> Vec<u8> {
        png(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 0, 0, 64]),
        )))
    }

    fn loader() -> ImageLoader {
        ImageLoader::new(Arc::new(RasterProvider::new()), ImageConfig::default()).unwrap()
    }

    fn image_from(bytes: Vec<u8>) -> PdfImage {
        loader()
            .from_buffer(move || -> io::Result<Vec<u8>> { Ok(bytes.clone()) })
            .unwrap()
    }

    #[test]
    fn geometry_from_200x100_opaque() {
        let image = image_from(opaque_png(200, 100));
        assert_eq!(image.pixel_width(), 200);
        assert_eq!(image.pixel_height(), 100);
        assert_eq!(image.point_width(), 150.0);
        assert_eq!(image.point_height(), 75.0);
        assert_eq!(image.size(), PointSize::new(150.0, 75.0));
        assert_eq!(image.format(), DeclaredFormat::Jpeg);
        assert_eq!(image.horizontal_resolution(), 96.0);
        assert_eq!(image.vertical_resolution(), 96.0);
    }

    #[test]
    fn alpha_input_declares_png() {
        let image = image_from(alpha_png(96, 96));
        assert_eq!(image.format(), DeclaredFormat::Png);
        assert!(image.has_transparency());
        assert_eq!(image.point_width(), 72.0);
    }

    #[test]
    fn buffer_images_get_synthetic_unique_paths() {
        let a = image_from(opaque_png(2, 2));
        let b = image_from(opaque_png(2, 2));
        assert!(a.path().starts_with("*{"));
        assert_ne!(a.path(), b.path());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn stream_factory_is_called_once() {
        let bytes = opaque_png(8, 8);
        let mut calls = 0;
        let image = loader()
            .from_stream(|| -> io::Result<Cursor<Vec<u8>>> {
                calls += 1;
                Ok(Cursor::new(bytes.clone()))
            })
            .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(image.pixel_width(), 8);
    }

    #[test]
    fn jpeg_streams_are_rewound_and_repeatable() {
        let image = image_from(opaque_png(40, 30));
        for _ in 0..2 {
            let stream = image.as_jpeg().unwrap();
            assert_eq!(stream.position(), 0);
            let decoded = image::load_from_memory(stream.get_ref()).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (40, 30));
        }
    }

    #[test]
    fn bitmap_stream_is_rewound() {
        let image = image_from(alpha_png(96, 96));
        let stream = image.as_bitmap().unwrap();
        assert_eq!(stream.position(), 0);
        assert_eq!(&stream.get_ref()[..2], b"BM");
    }

    #[test]
    fn encode_after_dispose_fails() {
        let mut image = image_from(opaque_png(4, 4));
        image.dispose();
        image.dispose();
        assert!(image.is_disposed());
        assert_eq!(image.pixel_width(), 4);
        assert_eq!(image.as_jpeg().unwrap_err().kind(), ErrorKind::EncodeFailure);
        assert_eq!(image.as_bitmap().unwrap_err().kind(), ErrorKind::EncodeFailure);
    }

    #[test]
    fn double_associate_fails_even_with_same_context() {
        let registry = ImageRegistry::new();
        let mut image = image_from(opaque_png(2, 2));
        image.associate(&registry).unwrap();
        let err = image.associate(&registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert_eq!(image.associated_context(), Some(registry.context_id()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn disassociate_fresh_image_fails() {
        let mut image = image_from(opaque_png(2, 2));
        let err = image.disassociate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert!(image.disassociate_from(&ImageRegistry::new()).is_err());
    }

    #[test]
    fn disassociate_from_wrong_context_leaves_state() {
        let first = ImageRegistry::new();
        let second = ImageRegistry::new();
        let mut image = image_from(opaque_png(2, 2));
        image.associate(&first).unwrap();

        let err = image.disassociate_from(&second).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert_eq!(image.associated_context(), Some(first.context_id()));
        assert!(first.contains(image.id()));
    }

    #[test]
    fn associate_then_disassociate_updates_both_sides() {
        let registry = ImageRegistry::new();
        let mut image = image_from(opaque_png(2, 2));

        image.associate(&registry).unwrap();
        assert!(registry.contains(image.id()));
        image.disassociate_from(&registry).unwrap();
        assert!(!image.is_associated());
        assert!(registry.is_empty());

        image.associate(&registry).unwrap();
        image.disassociate().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn dispose_detaches_from_context() {
        let registry = ImageRegistry::new();
        let mut image = image_from(opaque_png(2, 2));
        image.associate(&registry).unwrap();
        image.dispose();
        assert!(registry.is_empty());
        assert!(!image.is_associated());
        assert!(image.associate(&registry).is_err());
    }

    #[test]
    fn dropped_context_counts_as_unassociated() {
        let mut image = image_from(opaque_png(2, 2));
        {
            let registry = ImageRegistry::new();
            image.associate(&registry).unwrap();
        }
        assert_eq!(image.associated_context(), None);
        assert!(image.disassociate().is_err());
        image.associate(&ImageRegistry::new()).unwrap();
    }

    #[test]
    fn from_decoded_uses_handle_name() {
        let handle = RasterProvider::from_dynamic(
            DynamicImage::ImageRgba8(RgbaImage::new(3, 3)),
            None,
        )
        .unwrap();
        let name = handle.name().to_string();
        let image = loader().from_decoded(Box::new(handle)).unwrap();
        assert_eq!(image.path(), name);
        assert_eq!(image.format(), DeclaredFormat::Png);
    }

    #[test]
    fn from_decoded_rejects_released_handle() {
        let mut handle =
            RasterProvider::from_dynamic(DynamicImage::ImageRgb8(RgbImage::new(3, 3)), None)
                .unwrap();
        handle.release();
        let err = loader().from_decoded(Box::new(handle)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn interpolation_hint_follows_config() {
        let config = ImageConfig {
            interpolate: false,
            ..ImageConfig::default()
        };
        let bytes = opaque_png(2, 2);
        let mut image = ImageLoader::from_config(config)
            .unwrap()
            .from_buffer(move || -> io::Result<Vec<u8>> { Ok(bytes.clone()) })
            .unwrap();
        assert!(!image.interpolate_on_scale());
        image.set_interpolate_on_scale(true);
        assert!(image.interpolate_on_scale());
    }

    #[test]
    fn context_detach_ends_association_on_image_side() {
        let registry = ImageRegistry::new();
        let mut image = image_from(opaque_png(2, 2));
        image.associate(&registry).unwrap();

        assert!(registry.notify_image_detached(image.id()));
        assert!(!image.is_associated());
        assert_eq!(image.disassociate().unwrap_err().kind(), ErrorKind::InvariantViolation);

        image.associate(&registry).unwrap();
        assert!(registry.contains(image.id()));
        assert_eq!(image.associated_context(), Some(registry.context_id()));
    }

    #[test]
    fn context_detach_frees_image_for_another_context() {
        let first = ImageRegistry::new();
        let second = ImageRegistry::new();
        let mut image = image_from(opaque_png(2, 2));
        image.associate(&first).unwrap();
        first.notify_image_detached(image.id());

        image.associate(&second).unwrap();
        assert!(first.is_empty());
        assert!(second.contains(image.id()));
        assert!(image.disassociate_from(&first).is_err());
        image.disassociate_from(&second).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn from_decoded_keeps_handle_quality_and_config_interpolation() {
        let handle = RasterProvider::from_dynamic(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([90, 90, 90]))),
            Some(20),
        )
        .unwrap();
        let mut reference = Vec::new();
        handle.encode_jpeg(&mut reference).unwrap();

        let config = ImageConfig {
            jpeg_quality: 95,
            interpolate: false,
            ..ImageConfig::default()
        };
        let image = ImageLoader::from_config(config)
            .unwrap()
            .from_decoded(Box::new(handle))
            .unwrap();
        assert!(!image.interpolate_on_scale());
        assert_eq!(image.as_jpeg().unwrap().into_inner(), reference);
    }

    #[test]
    fn empty_path_is_invalid_argument() {
        let err = loader().from_file("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn missing_file_is_decode_failure() {
        let err = loader().from_file("/nonexistent/seal.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn raster_file_loads_with_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seal.png");
        std::fs::write(&path, opaque_png(16, 8)).unwrap();

        let loaded = loader().from_file(&path).unwrap();
        assert_eq!(loaded.path(), path.display().to_string());
        assert_eq!(loaded.point_size(), PointSize::new(12.0, 6.0));
        let image = loaded.into_raster().unwrap();
        assert!(!image.path().starts_with('*'));
    }
}
