use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// A point in either page-native or view space, depending on the caller.
///
/// Page-native space has its origin at the top-left corner of the unrotated
/// page, x grows to the right and y grows downward, units are points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Shortest distance from this point to the segment `a..b`.
    pub fn distance_to_segment(self, a: Point, b: Point) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let length_sq = dx * dx + dy * dy;

        if length_sq <= f64::EPSILON {
            return self.distance_to(a);
        }

        let t = (((self.x - a.x) * dx + (self.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
        self.distance_to(Point::new(a.x + t * dx, a.y + t * dy))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const A4: Size = Size { width: 595.0, height: 842.0 };
    pub const LETTER: Size = Size { width: 612.0, height: 792.0 };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn validate(self) -> Result<Self, GeometryError> {
        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(GeometryError::InvalidParameter(format!(
                "page size must be positive and finite, got {}x{}",
                self.width, self.height
            )));
        }

        Ok(self)
    }

    pub fn center(self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn max_dimension(self) -> f64 {
        self.width.max(self.height)
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::A4
    }
}

/// Axis-aligned rectangle, always kept normalized (`x0 <= x1`, `y0 <= y1`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawRect", into = "RawRect")]
pub struct Rect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

#[derive(Serialize, Deserialize)]
struct RawRect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl From<RawRect> for Rect {
    fn from(raw: RawRect) -> Self {
        Rect::new(raw.x0, raw.y0, raw.x1, raw.y1)
    }
}

impl From<Rect> for RawRect {
    fn from(rect: Rect) -> Self {
        RawRect { x0: rect.x0, y0: rect.y0, x1: rect.x1, y1: rect.y1 }
    }
}

impl Rect {
    /// Orders the corners so `x0 <= x1` and `y0 <= y1`. NaN coordinates are
    /// kept as given so `is_finite` can reject them later.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let (x0, x1) = ordered(x0, x1);
        let (y0, y1) = ordered(y0, y1);
        Self { x0, y0, x1, y1 }
    }

    pub fn from_points(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, origin.x + size.width, origin.y + size.height)
    }

    /// Smallest rectangle containing every point, `None` for an empty slice.
    pub fn bounding(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for point in rest {
            rect = rect.include(*point);
        }
        Some(rect)
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    pub fn y0(&self) -> f64 {
        self.y0
    }

    pub fn x1(&self) -> f64 {
        self.x1
    }

    pub fn y1(&self) -> f64 {
        self.y1
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x0 && point.x <= self.x1 && point.y >= self.y0 && point.y <= self.y1
    }

    pub fn inflate(&self, amount: f64) -> Self {
        Self::new(self.x0 - amount, self.y0 - amount, self.x1 + amount, self.y1 + amount)
    }

    pub fn include(&self, point: Point) -> Self {
        Self::new(
            self.x0.min(point.x),
            self.y0.min(point.y),
            self.x1.max(point.x),
            self.y1.max(point.y),
        )
    }

    pub fn union(&self, other: &Rect) -> Self {
        self.include(other.top_left()).include(other.bottom_right())
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self { x0: self.x0 + dx, y0: self.y0 + dy, x1: self.x1 + dx, y1: self.y1 + dy }
    }

    /// Distance from `point` to the nearest edge, zero on the boundary.
    pub fn distance_to_boundary(&self, point: Point) -> f64 {
        let corners = [
            self.top_left(),
            Point::new(self.x1, self.y0),
            self.bottom_right(),
            Point::new(self.x0, self.y1),
        ];

        (0..4)
            .map(|i| point.distance_to_segment(corners[i], corners[(i + 1) % 4]))
            .fold(f64::INFINITY, f64::min)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if b < a {
        (b, a)
    } else {
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_is_normalized_on_construction() {
        let rect = Rect::new(50.0, 40.0, 10.0, 20.0);
        assert_eq!(rect.top_left(), Point::new(10.0, 20.0));
        assert_eq!(rect.bottom_right(), Point::new(50.0, 40.0));
        assert_eq!(rect.width(), 40.0);
        assert_eq!(rect.height(), 20.0);
    }

    #[test]
    fn nan_coordinates_survive_construction() {
        let rect = Rect::new(f64::NAN, 0.0, 10.0, 10.0);
        assert!(rect.x0().is_nan());
        assert!(!rect.is_finite());
        assert!(!Rect::new(0.0, 10.0, 10.0, f64::NAN).is_finite());
    }

    #[test]
    fn bounding_rect_covers_all_points() {
        let rect = Rect::bounding(&[
            Point::new(3.0, 9.0),
            Point::new(-1.0, 4.0),
            Point::new(7.0, 2.0),
        ])
        .expect("points should produce a rect");

        assert_eq!(rect, Rect::new(-1.0, 2.0, 7.0, 9.0));
        assert!(Rect::bounding(&[]).is_none());
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);

        assert!((Point::new(5.0, 3.0).distance_to_segment(a, b) - 3.0).abs() < 1e-9);
        assert!((Point::new(13.0, 4.0).distance_to_segment(a, b) - 5.0).abs() < 1e-9);
        assert!((Point::new(2.0, 2.0).distance_to_segment(a, a) - 8.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn boundary_distance_is_zero_on_edges() {
        let rect = Rect::new(10.0, 10.0, 50.0, 50.0);
        assert_eq!(rect.distance_to_boundary(Point::new(10.0, 30.0)), 0.0);
        assert!((rect.distance_to_boundary(Point::new(20.0, 30.0)) - 10.0).abs() < 1e-9);
        assert!((rect.distance_to_boundary(Point::new(60.0, 30.0)) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        assert!(Size::new(0.0, 10.0).validate().is_err());
        assert!(Size::new(10.0, f64::NAN).validate().is_err());
        assert!(Size::A4.validate().is_ok());
    }

    #[test]
    fn deserialized_rect_is_normalized() {
        let rect = Rect::from(RawRect { x0: 5.0, y0: 8.0, x1: 1.0, y1: 2.0 });
        assert_eq!(rect, Rect::new(1.0, 2.0, 5.0, 8.0));
    }
}
