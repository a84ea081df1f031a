use doc_model::{AnnotationId, ModelError};

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("composition failed on page {page_index}{}: {reason}", annotation_suffix(.annotation_id))]
    CompositionFailed {
        page_index: usize,
        annotation_id: Option<AnnotationId>,
        reason: String,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}

fn annotation_suffix(annotation_id: &Option<AnnotationId>) -> String {
    annotation_id.map(|id| format!(" (annotation {id})")).unwrap_or_default()
}

impl PdfEngineError {
    pub(crate) fn composition(
        page_index: usize,
        annotation_id: Option<AnnotationId>,
        reason: impl Into<String>,
    ) -> Self {
        PdfEngineError::CompositionFailed { page_index, annotation_id, reason: reason.into() }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        PdfEngineError::DecodeFailed(reason.into())
    }
}
