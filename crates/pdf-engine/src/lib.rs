//! PDF side of the editor: flushing annotations into page overlays and the
//! lopdf codec that reads and writes the file format.

mod bridge;
mod codec;
mod compose;
mod error;
mod lopdf_codec;

pub use bridge::{load_document, load_page, open_document, save_document, OpenSource};
pub use codec::{PageCodec, RawDocument, RawPage};
pub use compose::{
    flush_document, flush_page, BlendMode, ComposedPage, GraphicsState, OverlayImage,
    PageOverlay, RESOURCE_PREFIX,
};
pub use error::PdfEngineError;
pub use lopdf_codec::LopdfCodec;

pub fn default_codec() -> LopdfCodec {
    LopdfCodec::new()
}
