//! Annotation objects.
//!
//! An annotation is a tagged variant (`AnnotationKind`) plus a stable id and
//! authoring metadata. Geometry is always stored in page-native coordinates:
//! unrotated, unscaled, origin at the top-left corner, y growing downward.

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use viewer_core::{Point, Rect, Size};

use crate::ModelError;

/// Unique identifier for an annotation.
///
/// Stable across undo/redo and persisted in the annotation index.
pub type AnnotationId = uuid::Uuid;

/// Side length of the square icon a note is drawn as.
pub const NOTE_ICON_SIZE: f64 = 20.0;

pub const MIN_FONT_SIZE: f64 = 1.0;
pub const MAX_FONT_SIZE: f64 = 144.0;

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };
    pub const YELLOW: Color = Color { r: 255, g: 255, b: 0, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Channels scaled to `0.0..=1.0`.
    pub fn to_normalized(&self) -> (f64, f64, f64, f64) {
        (
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
            f64::from(self.a) / 255.0,
        )
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }
}

/// The standard PDF base fonts offered for text annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    #[serde(rename = "helv")]
    Helvetica,
    #[serde(rename = "tiro")]
    TimesRoman,
    #[serde(rename = "cour")]
    Courier,
    #[serde(rename = "symb")]
    Symbol,
    #[serde(rename = "zadb")]
    ZapfDingbats,
}

impl FontFamily {
    pub const ALL: [FontFamily; 5] = [
        FontFamily::Helvetica,
        FontFamily::TimesRoman,
        FontFamily::Courier,
        FontFamily::Symbol,
        FontFamily::ZapfDingbats,
    ];

    pub fn code(self) -> &'static str {
        match self {
            FontFamily::Helvetica => "helv",
            FontFamily::TimesRoman => "tiro",
            FontFamily::Courier => "cour",
            FontFamily::Symbol => "symb",
            FontFamily::ZapfDingbats => "zadb",
        }
    }

    /// `/BaseFont` name of the Type1 standard font.
    pub fn base_font(self) -> &'static str {
        match self {
            FontFamily::Helvetica => "Helvetica",
            FontFamily::TimesRoman => "Times-Roman",
            FontFamily::Courier => "Courier",
            FontFamily::Symbol => "Symbol",
            FontFamily::ZapfDingbats => "ZapfDingbats",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        FontFamily::ALL.into_iter().find(|font| font.code() == code)
    }
}

/// Decoration drawn at the end point of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    #[default]
    None,
    OpenArrow,
    ClosedArrow,
}

/// Encoded raster bytes (PNG or JPEG) of a stamp. Serialized as base64.
#[derive(Clone, PartialEq, Eq)]
pub struct StampImage(Arc<[u8]>);

impl StampImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for StampImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StampImage({} bytes)", self.0.len())
    }
}

impl Serialize for StampImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for StampImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        Ok(StampImage::new(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AnnotationMetadata {
    pub fn new(author: Option<String>) -> Self {
        Self { author, created_at: Utc::now() }
    }
}

impl Default for AnnotationMetadata {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Variant-specific geometry and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    Text {
        rect: Rect,
        content: String,
        font_family: FontFamily,
        font_size: f64,
        font_color: Color,
    },
    Line {
        start: Point,
        end: Point,
        stroke_color: Color,
        line_width: f64,
        line_ending: LineEnding,
    },
    Rectangle {
        rect: Rect,
        stroke_color: Color,
        line_width: f64,
        fill_color: Option<Color>,
    },
    /// Ellipse inscribed in `rect`; a circle when the rect is square.
    Ellipse {
        rect: Rect,
        stroke_color: Color,
        line_width: f64,
        fill_color: Option<Color>,
    },
    Highlight {
        rect: Rect,
        color: Color,
        opacity: f64,
    },
    Freehand {
        points: Vec<Point>,
        stroke_color: Color,
        line_width: f64,
    },
    Stamp {
        rect: Rect,
        image: StampImage,
        opacity: f64,
    },
    /// Sticky note pinned at `anchor` (top-left of its icon).
    Note {
        anchor: Point,
        content: String,
        color: Color,
    },
}

impl AnnotationKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::Text { .. } => "text",
            AnnotationKind::Line { .. } => "line",
            AnnotationKind::Rectangle { .. } => "rectangle",
            AnnotationKind::Ellipse { .. } => "ellipse",
            AnnotationKind::Highlight { .. } => "highlight",
            AnnotationKind::Freehand { .. } => "freehand",
            AnnotationKind::Stamp { .. } => "stamp",
            AnnotationKind::Note { .. } => "note",
        }
    }

    /// Keys accepted by `Annotation::attribute` and `Annotation::with_attribute`.
    pub fn attribute_keys(&self) -> &'static [&'static str] {
        match self {
            AnnotationKind::Text { .. } => {
                &["rect", "content", "font_family", "font_size", "font_color"]
            }
            AnnotationKind::Line { .. } => {
                &["start", "end", "stroke_color", "line_width", "line_ending"]
            }
            AnnotationKind::Rectangle { .. } | AnnotationKind::Ellipse { .. } => {
                &["rect", "stroke_color", "line_width", "fill_color"]
            }
            AnnotationKind::Highlight { .. } => &["rect", "color", "opacity"],
            AnnotationKind::Freehand { .. } => &["points", "stroke_color", "line_width"],
            AnnotationKind::Stamp { .. } => &["rect", "image", "opacity"],
            AnnotationKind::Note { .. } => &["anchor", "content", "author", "color"],
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        match self {
            AnnotationKind::Text { rect, font_size, .. } => {
                check_rect(rect)?;
                if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(font_size) {
                    return Err(ModelError::attribute(
                        "font_size",
                        format!("must lie in {MIN_FONT_SIZE}..={MAX_FONT_SIZE}, got {font_size}"),
                    ));
                }
                Ok(())
            }
            AnnotationKind::Line { start, end, line_width, .. } => {
                check_point("start", start)?;
                check_point("end", end)?;
                check_line_width(*line_width)
            }
            AnnotationKind::Rectangle { rect, line_width, .. }
            | AnnotationKind::Ellipse { rect, line_width, .. } => {
                check_rect(rect)?;
                check_line_width(*line_width)
            }
            AnnotationKind::Highlight { rect, opacity, .. } => {
                check_rect(rect)?;
                check_opacity(*opacity)
            }
            AnnotationKind::Freehand { points, line_width, .. } => {
                if points.is_empty() {
                    return Err(ModelError::attribute("points", "needs at least one point"));
                }
                for point in points {
                    check_point("points", point)?;
                }
                check_line_width(*line_width)
            }
            AnnotationKind::Stamp { rect, image, opacity } => {
                check_rect(rect)?;
                if image.is_empty() {
                    return Err(ModelError::attribute("image", "image data is empty"));
                }
                check_opacity(*opacity)
            }
            AnnotationKind::Note { anchor, .. } => check_point("anchor", anchor),
        }
    }
}

fn check_rect(rect: &Rect) -> Result<(), ModelError> {
    if rect.is_finite() {
        Ok(())
    } else {
        Err(ModelError::attribute("rect", "coordinates must be finite"))
    }
}

fn check_point(key: &str, point: &Point) -> Result<(), ModelError> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(ModelError::attribute(key, "coordinates must be finite"))
    }
}

fn check_line_width(width: f64) -> Result<(), ModelError> {
    if width.is_finite() && width >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::attribute("line_width", format!("must be finite and >= 0, got {width}")))
    }
}

fn check_opacity(opacity: f64) -> Result<(), ModelError> {
    if (0.0..=1.0).contains(&opacity) {
        Ok(())
    } else {
        Err(ModelError::attribute("opacity", format!("must lie in 0..=1, got {opacity}")))
    }
}

/// A dynamically typed attribute value, as exchanged with property editors.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Rect(Rect),
    Point(Point),
    Points(Vec<Point>),
    Color(Color),
    Number(f64),
    Text(String),
    Font(FontFamily),
    LineEnding(LineEnding),
    Image(StampImage),
    /// Unset optional attribute (`fill_color`, note `author`).
    None,
}

impl AttributeValue {
    fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Rect(_) => "rect",
            AttributeValue::Point(_) => "point",
            AttributeValue::Points(_) => "points",
            AttributeValue::Color(_) => "color",
            AttributeValue::Number(_) => "number",
            AttributeValue::Text(_) => "text",
            AttributeValue::Font(_) => "font",
            AttributeValue::LineEnding(_) => "line ending",
            AttributeValue::Image(_) => "image",
            AttributeValue::None => "none",
        }
    }

    fn mismatch(&self, key: &str, expected: &str) -> ModelError {
        ModelError::attribute(key, format!("expected {expected}, got {}", self.type_name()))
    }

    fn into_rect(self, key: &str) -> Result<Rect, ModelError> {
        match self {
            AttributeValue::Rect(rect) => Ok(rect),
            other => Err(other.mismatch(key, "rect")),
        }
    }

    fn into_point(self, key: &str) -> Result<Point, ModelError> {
        match self {
            AttributeValue::Point(point) => Ok(point),
            other => Err(other.mismatch(key, "point")),
        }
    }

    fn into_points(self, key: &str) -> Result<Vec<Point>, ModelError> {
        match self {
            AttributeValue::Points(points) => Ok(points),
            other => Err(other.mismatch(key, "points")),
        }
    }

    fn into_color(self, key: &str) -> Result<Color, ModelError> {
        match self {
            AttributeValue::Color(color) => Ok(color),
            other => Err(other.mismatch(key, "color")),
        }
    }

    fn into_optional_color(self, key: &str) -> Result<Option<Color>, ModelError> {
        match self {
            AttributeValue::Color(color) => Ok(Some(color)),
            AttributeValue::None => Ok(None),
            other => Err(other.mismatch(key, "color or none")),
        }
    }

    fn into_number(self, key: &str) -> Result<f64, ModelError> {
        match self {
            AttributeValue::Number(value) if value.is_finite() => Ok(value),
            AttributeValue::Number(value) => {
                Err(ModelError::attribute(key, format!("must be finite, got {value}")))
            }
            other => Err(other.mismatch(key, "number")),
        }
    }

    fn into_text(self, key: &str) -> Result<String, ModelError> {
        match self {
            AttributeValue::Text(text) => Ok(text),
            other => Err(other.mismatch(key, "text")),
        }
    }

    fn into_optional_text(self, key: &str) -> Result<Option<String>, ModelError> {
        match self {
            AttributeValue::Text(text) => Ok(Some(text)),
            AttributeValue::None => Ok(None),
            other => Err(other.mismatch(key, "text or none")),
        }
    }

    fn into_font(self, key: &str) -> Result<FontFamily, ModelError> {
        match self {
            AttributeValue::Font(font) => Ok(font),
            AttributeValue::Text(code) => FontFamily::from_code(&code)
                .ok_or_else(|| ModelError::attribute(key, format!("unknown font `{code}`"))),
            other => Err(other.mismatch(key, "font")),
        }
    }

    fn into_line_ending(self, key: &str) -> Result<LineEnding, ModelError> {
        match self {
            AttributeValue::LineEnding(ending) => Ok(ending),
            other => Err(other.mismatch(key, "line ending")),
        }
    }

    fn into_image(self, key: &str) -> Result<StampImage, ModelError> {
        match self {
            AttributeValue::Image(image) => Ok(image),
            other => Err(other.mismatch(key, "image")),
        }
    }
}

/// A single annotation object owned by a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnnotationRecord", into = "AnnotationRecord")]
pub struct Annotation {
    id: AnnotationId,
    kind: AnnotationKind,
    metadata: AnnotationMetadata,
}

#[derive(Serialize, Deserialize)]
struct AnnotationRecord {
    id: AnnotationId,
    kind: AnnotationKind,
    metadata: AnnotationMetadata,
}

impl TryFrom<AnnotationRecord> for Annotation {
    type Error = ModelError;

    fn try_from(record: AnnotationRecord) -> Result<Self, Self::Error> {
        Annotation::with_id(record.id, record.kind, record.metadata)
    }
}

impl From<Annotation> for AnnotationRecord {
    fn from(annotation: Annotation) -> Self {
        AnnotationRecord {
            id: annotation.id,
            kind: annotation.kind,
            metadata: annotation.metadata,
        }
    }
}

impl Annotation {
    /// Creates an annotation with a freshly generated id.
    pub fn new(kind: AnnotationKind, metadata: AnnotationMetadata) -> Result<Self, ModelError> {
        Self::with_id(AnnotationId::new_v4(), kind, metadata)
    }

    /// Creates an annotation with a known id, e.g. when loading an index.
    pub fn with_id(
        id: AnnotationId,
        kind: AnnotationKind,
        metadata: AnnotationMetadata,
    ) -> Result<Self, ModelError> {
        kind.validate()?;
        Ok(Self { id, kind, metadata })
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    pub fn metadata(&self) -> &AnnotationMetadata {
        &self.metadata
    }

    /// Copy with a fresh id and identical attributes and metadata.
    pub fn duplicate(&self) -> Self {
        Self { id: AnnotationId::new_v4(), kind: self.kind.clone(), metadata: self.metadata.clone() }
    }

    /// Copy moved by `(dx, dy)` page units, keeping the id.
    pub fn translated(&self, dx: f64, dy: f64) -> Result<Self, ModelError> {
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "translation must be finite, got ({dx}, {dy})"
            )));
        }

        let mut moved = self.clone();
        match &mut moved.kind {
            AnnotationKind::Text { rect, .. }
            | AnnotationKind::Rectangle { rect, .. }
            | AnnotationKind::Ellipse { rect, .. }
            | AnnotationKind::Highlight { rect, .. }
            | AnnotationKind::Stamp { rect, .. } => *rect = rect.translate(dx, dy),
            AnnotationKind::Line { start, end, .. } => {
                *start = start.offset(dx, dy);
                *end = end.offset(dx, dy);
            }
            AnnotationKind::Freehand { points, .. } => {
                for point in points.iter_mut() {
                    *point = point.offset(dx, dy);
                }
            }
            AnnotationKind::Note { anchor, .. } => *anchor = anchor.offset(dx, dy),
        }
        moved.kind.validate()?;
        Ok(moved)
    }

    pub fn attribute(&self, key: &str) -> Result<AttributeValue, ModelError> {
        use AnnotationKind as K;

        let kind_name = self.kind.name();
        let value = match (&self.kind, key) {
            (
                K::Text { rect, .. }
                | K::Rectangle { rect, .. }
                | K::Ellipse { rect, .. }
                | K::Highlight { rect, .. }
                | K::Stamp { rect, .. },
                "rect",
            ) => AttributeValue::Rect(*rect),
            (K::Text { content, .. } | K::Note { content, .. }, "content") => {
                AttributeValue::Text(content.clone())
            }
            (K::Text { font_family, .. }, "font_family") => AttributeValue::Font(*font_family),
            (K::Text { font_size, .. }, "font_size") => AttributeValue::Number(*font_size),
            (K::Text { font_color, .. }, "font_color") => AttributeValue::Color(*font_color),
            (K::Line { start, .. }, "start") => AttributeValue::Point(*start),
            (K::Line { end, .. }, "end") => AttributeValue::Point(*end),
            (
                K::Line { stroke_color, .. }
                | K::Rectangle { stroke_color, .. }
                | K::Ellipse { stroke_color, .. }
                | K::Freehand { stroke_color, .. },
                "stroke_color",
            ) => AttributeValue::Color(*stroke_color),
            (
                K::Line { line_width, .. }
                | K::Rectangle { line_width, .. }
                | K::Ellipse { line_width, .. }
                | K::Freehand { line_width, .. },
                "line_width",
            ) => AttributeValue::Number(*line_width),
            (K::Line { line_ending, .. }, "line_ending") => {
                AttributeValue::LineEnding(*line_ending)
            }
            (K::Rectangle { fill_color, .. } | K::Ellipse { fill_color, .. }, "fill_color") => {
                fill_color.map_or(AttributeValue::None, AttributeValue::Color)
            }
            (K::Highlight { color, .. } | K::Note { color, .. }, "color") => {
                AttributeValue::Color(*color)
            }
            (K::Highlight { opacity, .. } | K::Stamp { opacity, .. }, "opacity") => {
                AttributeValue::Number(*opacity)
            }
            (K::Freehand { points, .. }, "points") => AttributeValue::Points(points.clone()),
            (K::Stamp { image, .. }, "image") => AttributeValue::Image(image.clone()),
            (K::Note { anchor, .. }, "anchor") => AttributeValue::Point(*anchor),
            (K::Note { .. }, "author") => {
                self.metadata.author.clone().map_or(AttributeValue::None, AttributeValue::Text)
            }
            _ => return Err(unknown_attribute(kind_name, key)),
        };
        Ok(value)
    }

    /// Immutable update: returns a copy with `key` set to `value`.
    ///
    /// The result is validated as a whole, so an out-of-range value is
    /// rejected with `InvalidAttribute` and `self` is never touched.
    pub fn with_attribute(&self, key: &str, value: AttributeValue) -> Result<Self, ModelError> {
        let mut updated = self.clone();
        updated.set_attribute(key, value)?;
        updated.kind.validate()?;
        Ok(updated)
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) -> Result<(), ModelError> {
        use AnnotationKind as K;

        let kind_name = self.kind.name();
        match (&mut self.kind, key) {
            (
                K::Text { rect, .. }
                | K::Rectangle { rect, .. }
                | K::Ellipse { rect, .. }
                | K::Highlight { rect, .. }
                | K::Stamp { rect, .. },
                "rect",
            ) => *rect = value.into_rect(key)?,
            (K::Text { content, .. } | K::Note { content, .. }, "content") => {
                *content = value.into_text(key)?
            }
            (K::Text { font_family, .. }, "font_family") => *font_family = value.into_font(key)?,
            (K::Text { font_size, .. }, "font_size") => *font_size = value.into_number(key)?,
            (K::Text { font_color, .. }, "font_color") => *font_color = value.into_color(key)?,
            (K::Line { start, .. }, "start") => *start = value.into_point(key)?,
            (K::Line { end, .. }, "end") => *end = value.into_point(key)?,
            (
                K::Line { stroke_color, .. }
                | K::Rectangle { stroke_color, .. }
                | K::Ellipse { stroke_color, .. }
                | K::Freehand { stroke_color, .. },
                "stroke_color",
            ) => *stroke_color = value.into_color(key)?,
            (
                K::Line { line_width, .. }
                | K::Rectangle { line_width, .. }
                | K::Ellipse { line_width, .. }
                | K::Freehand { line_width, .. },
                "line_width",
            ) => *line_width = value.into_number(key)?,
            (K::Line { line_ending, .. }, "line_ending") => {
                *line_ending = value.into_line_ending(key)?
            }
            (K::Rectangle { fill_color, .. } | K::Ellipse { fill_color, .. }, "fill_color") => {
                *fill_color = value.into_optional_color(key)?
            }
            (K::Highlight { color, .. } | K::Note { color, .. }, "color") => {
                *color = value.into_color(key)?
            }
            (K::Highlight { opacity, .. } | K::Stamp { opacity, .. }, "opacity") => {
                *opacity = value.into_number(key)?
            }
            (K::Freehand { points, .. }, "points") => *points = value.into_points(key)?,
            (K::Stamp { image, .. }, "image") => *image = value.into_image(key)?,
            (K::Note { anchor, .. }, "anchor") => *anchor = value.into_point(key)?,
            (K::Note { .. }, "author") => self.metadata.author = value.into_optional_text(key)?,
            _ => return Err(unknown_attribute(kind_name, key)),
        }
        Ok(())
    }

    /// Axis-aligned bounds in page-native coordinates, including stroke width.
    pub fn bounding_box(&self) -> Rect {
        match &self.kind {
            AnnotationKind::Text { rect, .. }
            | AnnotationKind::Highlight { rect, .. }
            | AnnotationKind::Stamp { rect, .. } => *rect,
            AnnotationKind::Rectangle { rect, line_width, .. }
            | AnnotationKind::Ellipse { rect, line_width, .. } => rect.inflate(line_width / 2.0),
            AnnotationKind::Line { start, end, line_width, .. } => {
                Rect::from_points(*start, *end).inflate(line_width / 2.0)
            }
            AnnotationKind::Freehand { points, line_width, .. } => Rect::bounding(points)
                .map(|rect| rect.inflate(line_width / 2.0))
                .unwrap_or_default(),
            AnnotationKind::Note { anchor, .. } => {
                Rect::from_origin_size(*anchor, Size::new(NOTE_ICON_SIZE, NOTE_ICON_SIZE))
            }
        }
    }

    /// Whether `point` (page-native) selects this annotation.
    ///
    /// Strokes use point-to-polyline distance, closed shapes accept any point
    /// inside or near the outline, and box-like kinds use their bounds.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> Result<bool, ModelError> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "hit tolerance must be finite and >= 0, got {tolerance}"
            )));
        }
        if !point.is_finite() {
            return Err(ModelError::InvalidParameter(format!(
                "hit point must be finite, got {point:?}"
            )));
        }

        let hit = match &self.kind {
            AnnotationKind::Text { .. }
            | AnnotationKind::Highlight { .. }
            | AnnotationKind::Stamp { .. }
            | AnnotationKind::Note { .. } => self.bounding_box().inflate(tolerance).contains(point),
            AnnotationKind::Rectangle { rect, line_width, .. } => {
                rect.contains(point) || rect.distance_to_boundary(point) <= tolerance + line_width / 2.0
            }
            AnnotationKind::Ellipse { rect, line_width, .. } => {
                ellipse_hit(rect, point, tolerance + line_width / 2.0)
            }
            AnnotationKind::Line { start, end, line_width, .. } => {
                point.distance_to_segment(*start, *end) <= tolerance + line_width / 2.0
            }
            AnnotationKind::Freehand { points, line_width, .. } => {
                polyline_distance(points, point) <= tolerance + line_width / 2.0
            }
        };
        Ok(hit)
    }
}

fn unknown_attribute(kind_name: &str, key: &str) -> ModelError {
    ModelError::attribute(key, format!("not an attribute of {kind_name} annotations"))
}

fn ellipse_hit(rect: &Rect, point: Point, tolerance: f64) -> bool {
    let center = rect.center();
    let rx = rect.width() / 2.0;
    let ry = rect.height() / 2.0;

    // Collapsed ellipses are drawn as a segment.
    if rx <= f64::EPSILON || ry <= f64::EPSILON {
        return point.distance_to_segment(rect.top_left(), rect.bottom_right()) <= tolerance;
    }

    let dx = (point.x - center.x) / rx;
    let dy = (point.y - center.y) / ry;
    let normalized = (dx * dx + dy * dy).sqrt();

    normalized <= 1.0 || (normalized - 1.0) * rx.min(ry) <= tolerance
}

fn polyline_distance(points: &[Point], point: Point) -> f64 {
    match points {
        [] => f64::INFINITY,
        [single] => point.distance_to(*single),
        _ => points
            .windows(2)
            .map(|pair| point.distance_to_segment(pair[0], pair[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Annotation {
        Annotation::new(
            AnnotationKind::Rectangle {
                rect: Rect::new(x0, y0, x1, y1),
                stroke_color: Color::RED,
                line_width: 2.0,
                fill_color: None,
            },
            AnnotationMetadata::default(),
        )
        .expect("rectangle should be valid")
    }

    fn text() -> Annotation {
        Annotation::new(
            AnnotationKind::Text {
                rect: Rect::new(100.0, 100.0, 200.0, 130.0),
                content: "Hello".to_string(),
                font_family: FontFamily::Helvetica,
                font_size: 12.0,
                font_color: Color::BLACK,
            },
            AnnotationMetadata::new(Some("Reviewer".to_string())),
        )
        .expect("text should be valid")
    }

    fn freehand() -> Annotation {
        Annotation::new(
            AnnotationKind::Freehand {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
                stroke_color: Color::BLUE,
                line_width: 1.0,
            },
            AnnotationMetadata::default(),
        )
        .expect("freehand should be valid")
    }

    #[test]
    fn rectangle_hit_covers_interior_and_outline() {
        let annotation = rectangle(10.0, 10.0, 50.0, 50.0);

        assert!(annotation.hit_test(Point::new(20.0, 20.0), 0.0).expect("hit test"));
        assert!(annotation.hit_test(Point::new(53.0, 30.0), 2.5).expect("hit test"));
        assert!(!annotation.hit_test(Point::new(100.0, 100.0), 4.0).expect("hit test"));
    }

    #[test]
    fn ellipse_hit_excludes_corners_of_its_box() {
        let annotation = Annotation::new(
            AnnotationKind::Ellipse {
                rect: Rect::new(0.0, 0.0, 100.0, 50.0),
                stroke_color: Color::RED,
                line_width: 0.0,
                fill_color: Some(Color::YELLOW),
            },
            AnnotationMetadata::default(),
        )
        .expect("ellipse should be valid");

        assert!(annotation.hit_test(Point::new(50.0, 25.0), 0.0).expect("hit test"));
        assert!(annotation.hit_test(Point::new(101.0, 25.0), 2.0).expect("hit test"));
        assert!(!annotation.hit_test(Point::new(2.0, 2.0), 1.0).expect("hit test"));
    }

    #[test]
    fn freehand_hit_uses_polyline_distance() {
        let annotation = freehand();

        assert!(annotation.hit_test(Point::new(5.0, 1.0), 1.0).expect("hit test"));
        assert!(annotation.hit_test(Point::new(11.0, 5.0), 1.0).expect("hit test"));
        assert!(!annotation.hit_test(Point::new(3.0, 8.0), 1.0).expect("hit test"));
    }

    #[test]
    fn line_bounding_box_includes_stroke() {
        let annotation = Annotation::new(
            AnnotationKind::Line {
                start: Point::new(10.0, 20.0),
                end: Point::new(30.0, 5.0),
                stroke_color: Color::RED,
                line_width: 4.0,
                line_ending: LineEnding::ClosedArrow,
            },
            AnnotationMetadata::default(),
        )
        .expect("line should be valid");

        assert_eq!(annotation.bounding_box(), Rect::new(8.0, 3.0, 32.0, 22.0));
    }

    #[test]
    fn note_occupies_fixed_icon() {
        let annotation = Annotation::new(
            AnnotationKind::Note {
                anchor: Point::new(40.0, 60.0),
                content: "check this".to_string(),
                color: Color::YELLOW,
            },
            AnnotationMetadata::default(),
        )
        .expect("note should be valid");

        assert_eq!(annotation.bounding_box(), Rect::new(40.0, 60.0, 60.0, 80.0));
        assert!(annotation.hit_test(Point::new(59.0, 79.0), 0.0).expect("hit test"));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let err = rectangle(0.0, 0.0, 1.0, 1.0)
            .hit_test(Point::new(0.0, 0.0), -1.0)
            .expect_err("negative tolerance should fail");
        assert!(matches!(err, ModelError::InvalidParameter(_)));
    }

    #[test]
    fn with_attribute_returns_updated_copy() {
        let original = text();
        let updated = original
            .with_attribute("font_size", AttributeValue::Number(18.0))
            .expect("font size should update");

        assert_eq!(updated.id(), original.id());
        assert_eq!(updated.attribute("font_size").expect("read"), AttributeValue::Number(18.0));
        assert_eq!(original.attribute("font_size").expect("read"), AttributeValue::Number(12.0));
    }

    #[test]
    fn font_family_accepts_codes() {
        let updated = text()
            .with_attribute("font_family", AttributeValue::Text("cour".to_string()))
            .expect("font code should be accepted");
        assert_eq!(
            updated.attribute("font_family").expect("read"),
            AttributeValue::Font(FontFamily::Courier)
        );
    }

    #[test]
    fn invalid_attributes_are_rejected() {
        let annotation = text();

        let unknown = annotation
            .with_attribute("stroke_color", AttributeValue::Color(Color::RED))
            .expect_err("text has no stroke color");
        assert!(matches!(unknown, ModelError::InvalidAttribute { .. }));

        let ill_typed = annotation
            .with_attribute("content", AttributeValue::Number(1.0))
            .expect_err("content must be text");
        assert!(matches!(ill_typed, ModelError::InvalidAttribute { .. }));

        let out_of_range = annotation
            .with_attribute("font_size", AttributeValue::Number(500.0))
            .expect_err("font size is capped");
        assert!(matches!(out_of_range, ModelError::InvalidAttribute { ref key, .. } if key == "font_size"));
    }

    #[test]
    fn every_listed_key_is_readable() {
        for annotation in [text(), freehand(), rectangle(0.0, 0.0, 5.0, 5.0)] {
            for key in annotation.kind().attribute_keys() {
                annotation.attribute(key).expect("listed key should be readable");
            }
        }
    }

    #[test]
    fn fill_color_can_be_cleared() {
        let filled = rectangle(0.0, 0.0, 5.0, 5.0)
            .with_attribute("fill_color", AttributeValue::Color(Color::YELLOW))
            .expect("fill should be set");
        let cleared = filled
            .with_attribute("fill_color", AttributeValue::None)
            .expect("fill should be cleared");

        assert_eq!(cleared.attribute("fill_color").expect("read"), AttributeValue::None);
    }

    #[test]
    fn duplicate_gets_fresh_id() {
        let original = text();
        let copy = original.duplicate();

        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.kind(), original.kind());
        assert_eq!(copy.metadata(), original.metadata());
    }

    #[test]
    fn translated_moves_geometry_and_keeps_id() {
        let moved = freehand().translated(5.0, -5.0).expect("translation should succeed");
        match moved.kind() {
            AnnotationKind::Freehand { points, .. } => {
                assert_eq!(points[0], Point::new(5.0, -5.0));
                assert_eq!(points[2], Point::new(15.0, 5.0));
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert!(freehand().translated(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn translation_overflowing_to_infinity_is_rejected() {
        let far = rectangle(0.0, 0.0, 10.0, 10.0)
            .translated(f64::MAX, 0.0)
            .expect("first move stays finite");
        let err = far.translated(f64::MAX, 0.0).expect_err("second move overflows");
        assert!(matches!(err, ModelError::InvalidAttribute { ref key, .. } if key == "rect"));
    }

    #[test]
    fn nan_rect_attribute_is_rejected() {
        let err = rectangle(0.0, 0.0, 10.0, 10.0)
            .with_attribute("rect", AttributeValue::Rect(Rect::new(f64::NAN, 0.0, 10.0, 10.0)))
            .expect_err("NaN corner should fail");
        assert!(matches!(err, ModelError::InvalidAttribute { ref key, .. } if key == "rect"));
    }

    #[test]
    fn box_kinds_hit_their_bounds() {
        let highlight = Annotation::new(
            AnnotationKind::Highlight {
                rect: Rect::new(10.0, 10.0, 110.0, 22.0),
                color: Color::YELLOW,
                opacity: 0.4,
            },
            AnnotationMetadata::default(),
        )
        .expect("highlight should be valid");
        let stamp = Annotation::new(
            AnnotationKind::Stamp {
                rect: Rect::new(200.0, 200.0, 264.0, 232.0),
                image: StampImage::new(vec![1, 2, 3]),
                opacity: 1.0,
            },
            AnnotationMetadata::default(),
        )
        .expect("stamp should be valid");

        assert!(text().hit_test(Point::new(150.0, 115.0), 0.0).expect("hit test"));
        assert!(text().hit_test(Point::new(202.0, 130.0), 2.0).expect("hit test"));
        assert!(!text().hit_test(Point::new(205.0, 115.0), 2.0).expect("hit test"));

        assert!(highlight.hit_test(Point::new(60.0, 16.0), 0.0).expect("hit test"));
        assert!(!highlight.hit_test(Point::new(60.0, 30.0), 3.0).expect("hit test"));

        assert!(stamp.hit_test(Point::new(264.0, 232.0), 0.0).expect("hit test"));
        assert!(!stamp.hit_test(Point::new(199.0, 210.0), 0.5).expect("hit test"));
    }

    #[test]
    fn line_hit_uses_segment_distance() {
        let annotation = Annotation::new(
            AnnotationKind::Line {
                start: Point::new(0.0, 0.0),
                end: Point::new(100.0, 0.0),
                stroke_color: Color::RED,
                line_width: 2.0,
                line_ending: LineEnding::None,
            },
            AnnotationMetadata::default(),
        )
        .expect("line should be valid");

        assert!(annotation.hit_test(Point::new(50.0, 3.0), 2.0).expect("hit test"));
        assert!(!annotation.hit_test(Point::new(50.0, 3.5), 2.0).expect("hit test"));
        assert!(annotation.hit_test(Point::new(102.0, 0.0), 1.0).expect("hit test"));
        assert!(!annotation.hit_test(Point::new(105.0, 0.0), 1.0).expect("hit test"));
    }

    #[test]
    fn json_round_trip_keeps_stamp_bytes() {
        let stamp = Annotation::new(
            AnnotationKind::Stamp {
                rect: Rect::new(0.0, 0.0, 64.0, 32.0),
                image: StampImage::new(vec![0x89, b'P', b'N', b'G', 0, 1, 2]),
                opacity: 0.8,
            },
            AnnotationMetadata::new(Some("Ops".to_string())),
        )
        .expect("stamp should be valid");

        let json = serde_json::to_string(&stamp).expect("stamp should serialize");
        assert!(json.contains("\"type\":\"stamp\""));
        let restored: Annotation = serde_json::from_str(&json).expect("stamp should deserialize");
        assert_eq!(restored, stamp);
    }

    #[test]
    fn deserializing_invalid_annotation_fails() {
        let mut value = serde_json::to_value(text()).expect("text should serialize");
        value["kind"]["font_size"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<Annotation>(value).is_err());
    }
}
