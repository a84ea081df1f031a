//! Page-native ⇄ view coordinate conversion.
//!
//! The forward mapping is fixed: rotate about the page center, scale by the
//! zoom factor, then translate so the rotated page's top-left corner lands on
//! the view origin. `to_document` applies the exact inverse.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Size};
use crate::GeometryError;

/// Clockwise quarter-turn rotation, as stored in a page's `/Rotate` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] =
        [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270];

    /// Accepts any multiple of 90, including negative values, and normalizes it.
    pub fn from_degrees(degrees: i32) -> Result<Self, GeometryError> {
        if degrees % 90 != 0 {
            return Err(GeometryError::InvalidParameter(format!(
                "rotation must be a multiple of 90 degrees, got {degrees}"
            )));
        }

        Ok(match degrees.rem_euclid(360) {
            0 => Rotation::Deg0,
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            _ => Rotation::Deg270,
        })
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn quarter_turns(self) -> usize {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    pub fn compose(self, other: Rotation) -> Rotation {
        Rotation::ALL[(self.quarter_turns() + other.quarter_turns()) % 4]
    }

    pub fn inverse(self) -> Rotation {
        match self {
            Rotation::Deg0 => Rotation::Deg0,
            Rotation::Deg90 => Rotation::Deg270,
            Rotation::Deg180 => Rotation::Deg180,
            Rotation::Deg270 => Rotation::Deg90,
        }
    }

    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Size of the bounding box of a `size` page after this rotation.
    pub fn rotated_size(self, size: Size) -> Size {
        if self.swaps_axes() {
            Size::new(size.height, size.width)
        } else {
            size
        }
    }

    // Clockwise on screen, with y pointing down.
    fn rotate_vector(self, dx: f64, dy: f64) -> (f64, f64) {
        match self {
            Rotation::Deg0 => (dx, dy),
            Rotation::Deg90 => (-dy, dx),
            Rotation::Deg180 => (-dx, -dy),
            Rotation::Deg270 => (dy, -dx),
        }
    }
}

impl TryFrom<i32> for Rotation {
    type Error = GeometryError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for i32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Validated zoom/rotation/page-size triple plus an optional view offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    zoom: f64,
    rotation: Rotation,
    page_size: Size,
    origin: Point,
}

impl ViewTransform {
    pub fn new(zoom: f64, rotation: Rotation, page_size: Size) -> Result<Self, GeometryError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(GeometryError::InvalidParameter(format!(
                "zoom must be positive and finite, got {zoom}"
            )));
        }

        let page_size = page_size.validate()?;
        Ok(Self { zoom, rotation, page_size, origin: Point::default() })
    }

    /// Where the rotated page's top-left corner sits in view space.
    pub fn with_origin(mut self, origin: Point) -> Self {
        self.origin = origin;
        self
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Size of the page as displayed.
    pub fn view_size(&self) -> Size {
        let rotated = self.rotation.rotated_size(self.page_size);
        Size::new(rotated.width * self.zoom, rotated.height * self.zoom)
    }

    pub fn to_view(&self, point: Point) -> Point {
        let center = self.page_size.center();
        let rotated_center = self.rotation.rotated_size(self.page_size).center();
        let (rx, ry) = self.rotation.rotate_vector(point.x - center.x, point.y - center.y);

        Point::new(
            (rx + rotated_center.x) * self.zoom + self.origin.x,
            (ry + rotated_center.y) * self.zoom + self.origin.y,
        )
    }

    pub fn to_document(&self, point: Point) -> Point {
        let center = self.page_size.center();
        let rotated_center = self.rotation.rotated_size(self.page_size).center();
        let vx = (point.x - self.origin.x) / self.zoom - rotated_center.x;
        let vy = (point.y - self.origin.y) / self.zoom - rotated_center.y;
        let (dx, dy) = self.rotation.inverse().rotate_vector(vx, vy);

        Point::new(dx + center.x, dy + center.y)
    }

    pub fn rect_to_view(&self, rect: &Rect) -> Rect {
        Rect::from_points(self.to_view(rect.top_left()), self.to_view(rect.bottom_right()))
    }

    pub fn rect_to_document(&self, rect: &Rect) -> Rect {
        Rect::from_points(self.to_document(rect.top_left()), self.to_document(rect.bottom_right()))
    }

    /// Converts a length measured in view units (e.g. a pointer tolerance in
    /// pixels) into page units.
    pub fn length_to_document(&self, length: f64) -> f64 {
        length / self.zoom
    }
}

pub fn to_view(
    point: Point,
    zoom: f64,
    rotation: Rotation,
    page_size: Size,
) -> Result<Point, GeometryError> {
    Ok(ViewTransform::new(zoom, rotation, page_size)?.to_view(point))
}

pub fn to_document(
    point: Point,
    zoom: f64,
    rotation: Rotation,
    page_size: Size,
) -> Result<Point, GeometryError> {
    Ok(ViewTransform::new(zoom, rotation, page_size)?.to_document(point))
}
