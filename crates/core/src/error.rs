use doc_model::ModelError;
use pdf_engine::PdfEngineError;
use viewer_core::GeometryError;

/// Coarse classification callers can branch on without matching every
/// underlying error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParameter,
    IndexOutOfBounds,
    InvalidAttribute,
    EmptyHistory,
    CompositionFailed,
    DecodeFailed,
    NotFound,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("nothing to {0}")]
    EmptyHistory(&'static str),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
}

pub type EditorResult<T> = Result<T, EditorError>;

impl EditorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EditorError::EmptyHistory(_) => ErrorKind::EmptyHistory,
            EditorError::Geometry(_) => ErrorKind::InvalidParameter,
            EditorError::Model(err) => model_kind(err),
            EditorError::Engine(err) => match err {
                PdfEngineError::Io(_) => ErrorKind::Io,
                PdfEngineError::Parse(_)
                | PdfEngineError::EncryptedUnsupported
                | PdfEngineError::DecodeFailed(_) => ErrorKind::DecodeFailed,
                PdfEngineError::CompositionFailed { .. } => ErrorKind::CompositionFailed,
                PdfEngineError::Model(err) => model_kind(err),
            },
        }
    }
}

fn model_kind(err: &ModelError) -> ErrorKind {
    match err {
        ModelError::InvalidParameter(_)
        | ModelError::DuplicateAnnotation(_)
        | ModelError::Geometry(_) => ErrorKind::InvalidParameter,
        ModelError::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
        ModelError::InvalidAttribute { .. } => ErrorKind::InvalidAttribute,
        ModelError::AnnotationNotFound(_) => ErrorKind::NotFound,
        ModelError::UnsupportedIndexVersion(_) | ModelError::Serialization(_) => {
            ErrorKind::DecodeFailed
        }
    }
}
