//! View geometry for the page editor.
//!
//! Pure math only: page-native and view coordinates, quarter-turn rotations,
//! and zoom fitting. Nothing here holds document state.

mod geometry;
mod transform;
mod viewport;

pub use geometry::{Point, Rect, Size};
pub use transform::{to_document, to_view, Rotation, ViewTransform};
pub use viewport::{fit_page_zoom, fit_width_zoom, ViewState, ZoomLimits};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
