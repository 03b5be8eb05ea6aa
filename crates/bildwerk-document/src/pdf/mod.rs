// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — page-document detection and the page canvas drawing context.

pub mod canvas;
pub mod form;

pub use canvas::{A4, DrawingContext, PageCanvas};
pub use form::{PdfForm, pdf_signature_version};
