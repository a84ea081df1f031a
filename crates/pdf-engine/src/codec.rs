use doc_model::PageSource;
use viewer_core::{Rotation, Size};

use crate::compose::ComposedPage;
use crate::PdfEngineError;

/// A page as handed over by the codec: geometry plus opaque source content.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub size: Size,
    pub rotation: Rotation,
    pub source: PageSource,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDocument {
    pub pages: Vec<RawPage>,
    /// Serialized annotation index found in the file, if any.
    pub annotation_index: Option<Vec<u8>>,
}

/// Reads and writes the persistent page-description format.
pub trait PageCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RawDocument, PdfEngineError>;

    fn encode(
        &self,
        pages: &[ComposedPage],
        annotation_index: Option<&[u8]>,
    ) -> Result<Vec<u8>, PdfEngineError>;
}
