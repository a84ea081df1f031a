use viewer_core::GeometryError;

use crate::AnnotationId;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("page index {index} is out of bounds for a document with {len} pages")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("invalid attribute `{key}`: {reason}")]
    InvalidAttribute { key: String, reason: String },
    #[error("annotation {0} not found")]
    AnnotationNotFound(AnnotationId),
    #[error("annotation {0} already exists on this page")]
    DuplicateAnnotation(AnnotationId),
    #[error("unsupported annotation index version {0}")]
    UnsupportedIndexVersion(u32),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn attribute(key: &str, reason: impl Into<String>) -> Self {
        ModelError::InvalidAttribute { key: key.to_string(), reason: reason.into() }
    }
}
