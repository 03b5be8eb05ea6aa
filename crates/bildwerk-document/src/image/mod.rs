// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — decoded handles, source capabilities, the pluggable provider,
// the `image`-crate backend and the `PdfImage` facade.

pub mod backend;
pub mod facade;
pub mod handle;
pub mod provider;
pub mod registry;
pub mod source;

pub use backend::{RasterHandle, RasterProvider};
pub use facade::{ImageLoader, LoadedImage, PdfImage};
pub use handle::DecodedImage;
pub use provider::{ImageSourceProvider, default_provider, install_provider, resolve_quality};
pub use registry::ImageRegistry;
pub use source::{BufferSource, StreamSource};
