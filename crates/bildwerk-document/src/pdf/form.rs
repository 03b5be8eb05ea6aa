// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page forms — detect PDF files by signature and expose their pages as
// placeable images, using the `lopdf` crate.

use std::io::Read;
use std::path::Path;

use bildwerk_core::PointSize;
use bildwerk_core::error::{BildwerkError, Result};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info, instrument};

/// How far into a file the `%PDF-` header may appear.
const SIGNATURE_WINDOW: u64 = 1024;

/// Inspect the start of `path` for a PDF header.
///
/// Returns the version as `major * 10 + minor` (so `%PDF-1.7` gives 17), or
/// `None` for anything that is not a PDF. The file extension is ignored.
pub fn pdf_signature_version(path: &Path) -> Result<Option<u16>> {
    let file = std::fs::File::open(path)?;
    let mut head = Vec::with_capacity(SIGNATURE_WINDOW as usize);
    file.take(SIGNATURE_WINDOW).read_to_end(&mut head)?;
    Ok(parse_signature(&head))
}

fn parse_signature(head: &[u8]) -> Option<u16> {
    const MAGIC: &[u8] = b"%PDF-";
    let start = head.windows(MAGIC.len()).position(|w| w == MAGIC)? + MAGIC.len();
    match head.get(start..start + 3)? {
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Some(u16::from(major - b'0') * 10 + u16::from(minor - b'0'))
        }
        _ => None,
    }
}

/// A PDF whose pages can be placed like images.
pub struct PdfForm {
    document: Document,
    path: String,
}

impl PdfForm {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| {
            BildwerkError::Pdf(format!("failed to open {}: {}", path_ref.display(), err))
        })?;
        info!(pages = document.get_pages().len(), "PDF form loaded");
        Ok(Self {
            document,
            path: path_ref.display().to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// MediaBox size of a page (1-indexed), inherited through the page tree.
    pub fn page_size(&self, page_number: u32) -> Result<PointSize> {
        let pages = self.document.get_pages();
        let page_id = *pages.get(&page_number).ok_or_else(|| {
            BildwerkError::Pdf(format!(
                "page {} out of range (document has {} pages)",
                page_number,
                pages.len()
            ))
        })?;
        let [x0, y0, x1, y1] = media_box(&self.document, page_id)?;
        debug!(page_number, x0, y0, x1, y1, "MediaBox resolved");
        Ok(PointSize::new(
            f64::from((x1 - x0).abs()),
            f64::from((y1 - y0).abs()),
        ))
    }

    /// Size of the first page, or zero for an empty document.
    pub fn point_size(&self) -> PointSize {
        self.page_size(1).unwrap_or(PointSize::new(0.0, 0.0))
    }
}

impl std::fmt::Debug for PdfForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfForm")
            .field("path", &self.path)
            .field("pages", &self.page_count())
            .finish()
    }
}

/// Walk from the page up through /Parent until a /MediaBox is found.
fn media_box(document: &Document, page_id: ObjectId) -> Result<[f32; 4]> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = document.get_dictionary(id).map_err(|err| {
            BildwerkError::Pdf(format!("cannot read page tree node {:?}: {}", id, err))
        })?;

        let entry = match dict.get(b"MediaBox") {
            Ok(Object::Reference(target)) => document.get_object(*target).ok(),
            Ok(object) => Some(object),
            Err(_) => None,
        };
        if let Some(Object::Array(values)) = entry {
            let coords: Vec<f32> = values.iter().filter_map(|v| v.as_float().ok()).collect();
            if let [x0, y0, x1, y1] = coords[..] {
                return Ok([x0, y0, x1, y1]);
            }
            return Err(BildwerkError::Pdf(format!(
                "malformed MediaBox on {:?}",
                id
            )));
        }

        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Err(BildwerkError::Pdf(format!("page {:?} has no MediaBox", page_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Minimal one-page PDF with the MediaBox on the page tree root.
    fn write_pdf(path: &Path) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn parse_signature_versions() {
        assert_eq!(parse_signature(b"%PDF-1.7\n%\xE2\xE3"), Some(17));
        assert_eq!(parse_signature(b"\x00\x00junk%PDF-2.0\n"), Some(20));
        assert_eq!(parse_signature(b"%PDF-x.y"), None);
        assert_eq!(parse_signature(b"\x89PNG\r\n\x1a\n"), None);
        assert_eq!(parse_signature(b"%PDF-1"), None);
    }

    #[test]
    fn signature_ignores_extension() {
        let dir = tempfile::tempdir().unwrap();
        let disguised = dir.path().join("scan.png");
        write_pdf(&disguised);
        assert_eq!(pdf_signature_version(&disguised).unwrap(), Some(15));

        let text = dir.path().join("notes.pdf");
        std::fs::write(&text, "plain text").unwrap();
        assert_eq!(pdf_signature_version(&text).unwrap(), None);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(pdf_signature_version(Path::new("/nonexistent/form.pdf")).is_err());
    }

    #[test]
    fn form_reads_inherited_media_box() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.pdf");
        write_pdf(&path);

        let form = PdfForm::open(&path).unwrap();
        assert_eq!(form.page_count(), 1);
        assert_eq!(form.point_size(), PointSize::new(595.0, 842.0));
        assert!(form.page_size(2).is_err());
    }
}
