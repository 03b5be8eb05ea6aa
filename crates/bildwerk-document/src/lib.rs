// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-document — Image ingestion for PDF embedding.
//
// Accepts images from a path, a stream factory, a buffer factory or an
// already-decoded handle, exposes their geometry in PDF points, re-encodes
// them as JPEG or 32-bit BMP, and places them on PDF pages.

pub mod image;
pub mod pdf;

// Re-export the primary types so callers can use `bildwerk_document::PdfImage` etc.
pub use self::image::{DecodedImage, ImageLoader, ImageRegistry, ImageSourceProvider, LoadedImage, PdfImage};
pub use self::pdf::{DrawingContext, PageCanvas, PdfForm};
