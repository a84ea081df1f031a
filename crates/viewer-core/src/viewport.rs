use crate::geometry::{Point, Size};
use crate::transform::{Rotation, ViewTransform};
use crate::GeometryError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self { min: 0.1, max: 16.0, step: 1.25 }
    }
}

impl ZoomLimits {
    pub fn clamp(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min, self.max)
    }
}

/// Per-page display parameters supplied by the shell. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub zoom: f64,
    /// Rotation applied by the viewer on top of the page's own rotation.
    pub rotation: Rotation,
    pub origin: Point,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { zoom: 1.0, rotation: Rotation::Deg0, origin: Point::default() }
    }
}

impl ViewState {
    pub fn new(zoom: f64, rotation: Rotation) -> Self {
        Self { zoom, rotation, origin: Point::default() }
    }

    /// Transform for a page whose stored rotation is `page_rotation`.
    pub fn transform_for(
        &self,
        page_size: Size,
        page_rotation: Rotation,
    ) -> Result<ViewTransform, GeometryError> {
        Ok(ViewTransform::new(self.zoom, page_rotation.compose(self.rotation), page_size)?
            .with_origin(self.origin))
    }

    pub fn zoom_in(&mut self, limits: &ZoomLimits) {
        self.zoom = limits.clamp(self.zoom * limits.step);
    }

    pub fn zoom_out(&mut self, limits: &ZoomLimits) {
        self.zoom = limits.clamp(self.zoom / limits.step);
    }
}

pub fn fit_width_zoom(
    viewport_width: f64,
    page_size: Size,
    rotation: Rotation,
    limits: &ZoomLimits,
) -> f64 {
    let displayed = rotation.rotated_size(page_size);
    if viewport_width <= 0.0 || displayed.width <= 0.0 {
        return 1.0;
    }

    limits.clamp(viewport_width / displayed.width)
}

pub fn fit_page_zoom(
    viewport: Size,
    page_size: Size,
    rotation: Rotation,
    limits: &ZoomLimits,
) -> f64 {
    let displayed = rotation.rotated_size(page_size);
    if viewport.width <= 0.0
        || viewport.height <= 0.0
        || displayed.width <= 0.0
        || displayed.height <= 0.0
    {
        return 1.0;
    }

    let width = viewport.width / displayed.width;
    let height = viewport.height / displayed.height;

    limits.clamp(width.min(height))
}
