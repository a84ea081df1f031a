use std::fs;
use std::path::{Path, PathBuf};

use doc_model::{AnnotationIndex, Document, Page};

use crate::codec::{PageCodec, RawDocument, RawPage};
use crate::compose::flush_document;
use crate::PdfEngineError;

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// A page with no annotations backed by its decoded source.
pub fn load_page(raw: RawPage) -> Result<Page, PdfEngineError> {
    Page::new(raw.size, raw.rotation, Some(raw.source))
        .map_err(|err| PdfEngineError::decode(err.to_string()))
}

/// Builds a clean document from decoded pages, re-attaching the stored
/// annotation index when the file carried one.
pub fn load_document(raw: RawDocument) -> Result<Document, PdfEngineError> {
    let pages = raw.pages.into_iter().map(load_page).collect::<Result<Vec<_>, _>>()?;
    let mut document = Document::from_pages(pages);

    if let Some(bytes) = raw.annotation_index {
        let index = AnnotationIndex::from_json(&bytes)
            .map_err(|err| PdfEngineError::decode(format!("annotation index: {err}")))?;
        let count = index.annotation_count();
        index
            .attach_to(&mut document)
            .map_err(|err| PdfEngineError::decode(format!("annotation index: {err}")))?;
        tracing::debug!(annotations = count, "restored annotations from index");
    }

    document.mark_clean();
    Ok(document)
}

pub fn open_document(
    codec: &dyn PageCodec,
    source: impl Into<OpenSource>,
) -> Result<Document, PdfEngineError> {
    let bytes = match source.into() {
        OpenSource::Path(path) => fs::read(path)?,
        OpenSource::Bytes(bytes) => bytes,
    };
    let document = load_document(codec.decode(&bytes)?)?;
    tracing::info!(pages = document.page_count(), "opened document");
    Ok(document)
}

/// Flushes every page and encodes the result. The index is only embedded
/// when at least one annotation exists.
pub fn save_document(
    codec: &dyn PageCodec,
    document: &Document,
) -> Result<Vec<u8>, PdfEngineError> {
    let pages = flush_document(document)?;
    let index = AnnotationIndex::from_document(document);
    let index_bytes = if index.is_empty() { None } else { Some(index.to_json()?) };

    let bytes = codec.encode(&pages, index_bytes.as_deref())?;
    tracing::info!(
        pages = pages.len(),
        annotations = index.annotation_count(),
        bytes = bytes.len(),
        "saved document"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use doc_model::{ModelError, PageSource};
    use viewer_core::{Rotation, Size};

    use super::*;

    fn raw_pages(count: usize) -> Vec<RawPage> {
        (0..count)
            .map(|_| RawPage {
                size: Size::LETTER,
                rotation: Rotation::Deg0,
                source: PageSource::new(b"%PDF-1.5".to_vec()),
            })
            .collect()
    }

    #[test]
    fn load_without_index_is_clean_and_empty() {
        let document = load_document(RawDocument { pages: raw_pages(2), annotation_index: None })
            .expect("load should succeed");

        assert_eq!(document.page_count(), 2);
        assert!(!document.is_dirty());
        assert!(document.pages().iter().all(|page| page.annotations().is_empty()));
    }

    #[test]
    fn load_page_keeps_geometry_and_source() {
        let raw = RawPage {
            size: Size::A4,
            rotation: Rotation::Deg180,
            source: PageSource::new(b"%PDF-1.5".to_vec()),
        };
        let page = load_page(raw.clone()).expect("page should load");

        assert_eq!(page.size(), Size::A4);
        assert_eq!(page.rotation(), Rotation::Deg180);
        assert_eq!(page.source(), Some(&raw.source));
        assert!(page.annotations().is_empty());

        let degenerate = RawPage { size: Size::new(0.0, 10.0), ..raw };
        let err = load_page(degenerate).expect_err("zero width should fail");
        assert!(matches!(err, PdfEngineError::DecodeFailed(_)));
    }

    #[test]
    fn unsupported_index_version_fails_decode() {
        let err = load_document(RawDocument {
            pages: raw_pages(1),
            annotation_index: Some(br#"{"version":9,"pages":[]}"#.to_vec()),
        })
        .expect_err("unknown version should fail");

        assert!(matches!(err, PdfEngineError::DecodeFailed(_)));
    }

    #[test]
    fn index_for_missing_page_fails_decode() {
        let err = load_document(RawDocument {
            pages: raw_pages(1),
            annotation_index: Some(br#"{"version":1,"pages":[{"page":4,"annotations":[]}]}"#.to_vec()),
        })
        .expect_err("missing page should fail");

        assert!(matches!(err, PdfEngineError::DecodeFailed(_)));
    }

    #[test]
    fn open_reports_missing_file() {
        let err = open_document(&crate::LopdfCodec::new(), Path::new("/nonexistent/file.pdf"))
            .expect_err("missing file should fail");

        assert!(matches!(err, PdfEngineError::Io(_)));
    }

    #[test]
    fn model_errors_convert() {
        let err: PdfEngineError = ModelError::InvalidParameter("x".into()).into();
        assert!(matches!(err, PdfEngineError::Model(_)));
    }
}
