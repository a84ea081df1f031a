mod annotation;
mod document;
mod error;
mod index;
mod page;
mod settings;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationMetadata, AttributeValue, Color,
    FontFamily, LineEnding, StampImage, MAX_FONT_SIZE, MIN_FONT_SIZE, NOTE_ICON_SIZE,
};
pub use document::{parse_page_ranges, Document};
pub use error::ModelError;
pub use index::{AnnotationIndex, PageAnnotations, ANNOTATION_INDEX_VERSION};
pub use page::{Page, PageSource, ZOrder};
pub use settings::EngineSettings;
