use serde::{Deserialize, Serialize};

use crate::{Annotation, Document, ModelError};

pub const ANNOTATION_INDEX_VERSION: u32 = 1;

/// Persisted list of engine-managed annotations, keyed by page.
///
/// Stored inside the saved document (and optionally as a sidecar file) so a
/// reload can rebuild editable annotations instead of flattened marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationIndex {
    pub version: u32,
    pub pages: Vec<PageAnnotations>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnnotations {
    pub page: usize,
    pub annotations: Vec<Annotation>,
}

#[derive(Deserialize)]
struct IndexHeader {
    version: u32,
}

impl Default for AnnotationIndex {
    fn default() -> Self {
        Self { version: ANNOTATION_INDEX_VERSION, pages: Vec::new() }
    }
}

impl AnnotationIndex {
    pub fn from_document(document: &Document) -> Self {
        let pages = document
            .pages()
            .iter()
            .enumerate()
            .filter(|(_, page)| !page.annotations().is_empty())
            .map(|(page, contents)| PageAnnotations {
                page,
                annotations: contents.annotations().to_vec(),
            })
            .collect();

        Self { version: ANNOTATION_INDEX_VERSION, pages }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|entry| entry.annotations.is_empty())
    }

    pub fn annotation_count(&self) -> usize {
        self.pages.iter().map(|entry| entry.annotations.len()).sum()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ModelError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses an index, checking the schema version before the body.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelError> {
        let header: IndexHeader = serde_json::from_slice(bytes)?;
        if header.version != ANNOTATION_INDEX_VERSION {
            return Err(ModelError::UnsupportedIndexVersion(header.version));
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Appends every indexed annotation to its page. Either all annotations
    /// are attached or the document is left unchanged.
    pub fn attach_to(self, document: &mut Document) -> Result<(), ModelError> {
        let mut staged = document.clone();
        for entry in self.pages {
            let page = staged.page_mut(entry.page)?;
            for annotation in entry.annotations {
                page.push_annotation(annotation)?;
            }
        }

        *document = staged;
        Ok(())
    }
}
