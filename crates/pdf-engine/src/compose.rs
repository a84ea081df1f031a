//! Flushing: turns a page's annotation list into overlay content.
//!
//! Output is deterministic. Numbers are written with at most three decimals,
//! resources are keyed in `BTreeMap`s and named in first-use order, so two
//! flushes of an unchanged page produce identical overlays.

use std::collections::BTreeMap;

use doc_model::{
    Annotation, AnnotationKind, Color, Document, FontFamily, LineEnding, Page, PageSource,
    NOTE_ICON_SIZE,
};
use viewer_core::{Point, Rect, Rotation, Size};

use crate::PdfEngineError;

/// Prefix of every resource name the overlay introduces on a page.
pub const RESOURCE_PREFIX: &str = "EdAnn";

const KAPPA: f64 = 0.552_284_8;
const ARROW_ANGLE: f64 = std::f64::consts::PI / 6.0;
const LINE_SPACING: f64 = 1.2;
const TEXT_PADDING: f64 = 2.0;
/// Tabs are drawn as this many spaces.
const TAB_EXPANSION: &[u8] = b"    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Multiply,
}

impl BlendMode {
    pub fn pdf_name(self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
        }
    }
}

/// Transparency settings emitted as an `/ExtGState` resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphicsState {
    pub stroke_alpha: f64,
    pub fill_alpha: f64,
    pub blend_mode: BlendMode,
}

impl GraphicsState {
    fn new(stroke_alpha: f64, fill_alpha: f64, blend_mode: BlendMode) -> Self {
        Self {
            stroke_alpha: quantize(stroke_alpha.clamp(0.0, 1.0)),
            fill_alpha: quantize(fill_alpha.clamp(0.0, 1.0)),
            blend_mode,
        }
    }

    fn is_default(&self) -> bool {
        self.stroke_alpha == 1.0 && self.fill_alpha == 1.0 && self.blend_mode == BlendMode::Normal
    }
}

/// Decoded stamp raster, 8-bit RGB plus optional 8-bit alpha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

/// Content stream bytes drawn on top of the page, in PDF user space with the
/// origin at the media box's lower-left corner, plus the resources it uses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageOverlay {
    pub content: Vec<u8>,
    pub fonts: BTreeMap<String, FontFamily>,
    pub graphics_states: BTreeMap<String, GraphicsState>,
    pub images: BTreeMap<String, OverlayImage>,
}

impl PageOverlay {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    fn font_name(&mut self, font: FontFamily) -> String {
        let name = format!("{RESOURCE_PREFIX}F{}", font.code());
        self.fonts.insert(name.clone(), font);
        name
    }

    fn graphics_state_name(&mut self, state: GraphicsState) -> String {
        if let Some((name, _)) = self.graphics_states.iter().find(|(_, known)| **known == state) {
            return name.clone();
        }
        let name = format!("{RESOURCE_PREFIX}GS{}", self.graphics_states.len());
        self.graphics_states.insert(name.clone(), state);
        name
    }

    fn image_name(&mut self, image: OverlayImage) -> String {
        let name = format!("{RESOURCE_PREFIX}Im{}", self.images.len());
        self.images.insert(name.clone(), image);
        name
    }
}

/// Everything the codec needs to write one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPage {
    pub size: Size,
    pub rotation: Rotation,
    pub source: Option<PageSource>,
    pub overlay: PageOverlay,
}

fn quantize(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub(crate) fn format_number(value: f64) -> String {
    let rounded = quantize(value);
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{rounded}")
    }
}

struct ContentWriter<'a> {
    bytes: Vec<u8>,
    height: f64,
    resources: &'a mut PageOverlay,
}

impl ContentWriter<'_> {
    fn op(&mut self, operands: &[f64], operator: &str) {
        for value in operands {
            self.bytes.extend_from_slice(format_number(*value).as_bytes());
            self.bytes.push(b' ');
        }
        self.bytes.extend_from_slice(operator.as_bytes());
        self.bytes.push(b'\n');
    }

    fn named(&mut self, name: &str, operator: &str) {
        self.bytes.push(b'/');
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.push(b' ');
        self.bytes.extend_from_slice(operator.as_bytes());
        self.bytes.push(b'\n');
    }

    fn pdf(&self, point: Point) -> (f64, f64) {
        (point.x, self.height - point.y)
    }

    fn move_to(&mut self, point: Point) {
        let (x, y) = self.pdf(point);
        self.op(&[x, y], "m");
    }

    fn line_to(&mut self, point: Point) {
        let (x, y) = self.pdf(point);
        self.op(&[x, y], "l");
    }

    fn rect(&mut self, rect: &Rect) {
        let (x, y) = self.pdf(Point::new(rect.x0(), rect.y1()));
        self.op(&[x, y, rect.width(), rect.height()], "re");
    }

    fn stroke_color(&mut self, color: Color) {
        let (r, g, b, _) = color.to_normalized();
        self.op(&[r, g, b], "RG");
    }

    fn fill_color(&mut self, color: Color) {
        let (r, g, b, _) = color.to_normalized();
        self.op(&[r, g, b], "rg");
    }

    fn alpha(&mut self, state: GraphicsState) {
        if !state.is_default() {
            let name = self.resources.graphics_state_name(state);
            self.named(&name, "gs");
        }
    }

    fn ellipse(&mut self, rect: &Rect) {
        let center = rect.center();
        let (cx, cy) = self.pdf(center);
        let rx = rect.width() / 2.0;
        let ry = rect.height() / 2.0;
        let kx = rx * KAPPA;
        let ky = ry * KAPPA;

        self.op(&[cx + rx, cy], "m");
        self.op(&[cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry], "c");
        self.op(&[cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy], "c");
        self.op(&[cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry], "c");
        self.op(&[cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy], "c");
    }

    fn literal(&mut self, text: &str) -> Result<(), String> {
        self.bytes.push(b'(');
        for ch in text.chars() {
            if ch == '\t' {
                self.bytes.extend_from_slice(TAB_EXPANSION);
                continue;
            }
            let code = u32::from(ch);
            if code > 0xFF || code < 0x20 || (0x7F..0xA0).contains(&code) {
                return Err(format!("character {ch:?} cannot be encoded with WinAnsiEncoding"));
            }
            let byte = code as u8;
            if matches!(byte, b'(' | b')' | b'\\') {
                self.bytes.push(b'\\');
            }
            self.bytes.push(byte);
        }
        self.bytes.extend_from_slice(b") Tj\n");
        Ok(())
    }
}

fn draw(writer: &mut ContentWriter<'_>, annotation: &Annotation) -> Result<(), String> {
    match annotation.kind() {
        AnnotationKind::Rectangle { rect, stroke_color, line_width, fill_color }
        | AnnotationKind::Ellipse { rect, stroke_color, line_width, fill_color } => {
            let stroke = *line_width > 0.0;
            // Closing variants for the ellipse path; `re` is already closed.
            let (closed, open) = match (stroke, fill_color.is_some()) {
                (true, true) => ("b", "B"),
                (true, false) => ("s", "S"),
                (false, true) => ("f", "f"),
                (false, false) => return Ok(()),
            };

            writer.op(&[], "q");
            let fill_alpha = fill_color.map_or(1.0, |fill| fill.to_normalized().3);
            writer.alpha(GraphicsState::new(
                stroke_color.to_normalized().3,
                fill_alpha,
                BlendMode::Normal,
            ));
            if stroke {
                writer.stroke_color(*stroke_color);
                writer.op(&[*line_width], "w");
            }
            if let Some(fill) = fill_color {
                writer.fill_color(*fill);
            }
            if matches!(annotation.kind(), AnnotationKind::Rectangle { .. }) {
                writer.rect(rect);
                writer.op(&[], open);
            } else {
                writer.ellipse(rect);
                writer.op(&[], closed);
            }
            writer.op(&[], "Q");
        }
        AnnotationKind::Line { start, end, stroke_color, line_width, line_ending } => {
            writer.op(&[], "q");
            let alpha = stroke_color.to_normalized().3;
            writer.alpha(GraphicsState::new(alpha, alpha, BlendMode::Normal));
            writer.stroke_color(*stroke_color);
            writer.op(&[*line_width], "w");
            writer.move_to(*start);
            writer.line_to(*end);
            writer.op(&[], "S");

            if *line_ending != LineEnding::None {
                let (x1, y1) = writer.pdf(*start);
                let (x2, y2) = writer.pdf(*end);
                let angle = (y2 - y1).atan2(x2 - x1);
                let length = (line_width * 10.0).max(6.0);
                let left = (
                    x2 - length * (angle - ARROW_ANGLE).cos(),
                    y2 - length * (angle - ARROW_ANGLE).sin(),
                );
                let right = (
                    x2 - length * (angle + ARROW_ANGLE).cos(),
                    y2 - length * (angle + ARROW_ANGLE).sin(),
                );

                if *line_ending == LineEnding::ClosedArrow {
                    writer.fill_color(*stroke_color);
                    writer.op(&[left.0, left.1], "m");
                    writer.op(&[x2, y2], "l");
                    writer.op(&[right.0, right.1], "l");
                    writer.op(&[], "b");
                } else {
                    writer.op(&[left.0, left.1], "m");
                    writer.op(&[x2, y2], "l");
                    writer.op(&[right.0, right.1], "l");
                    writer.op(&[], "S");
                }
            }
            writer.op(&[], "Q");
        }
        AnnotationKind::Highlight { rect, color, opacity } => {
            writer.op(&[], "q");
            let alpha = opacity * color.to_normalized().3;
            writer.alpha(GraphicsState::new(alpha, alpha, BlendMode::Multiply));
            writer.fill_color(*color);
            writer.rect(rect);
            writer.op(&[], "f");
            writer.op(&[], "Q");
        }
        AnnotationKind::Freehand { points, stroke_color, line_width } => {
            let Some((first, rest)) = points.split_first() else {
                return Ok(());
            };

            writer.op(&[], "q");
            let alpha = stroke_color.to_normalized().3;
            writer.alpha(GraphicsState::new(alpha, alpha, BlendMode::Normal));
            writer.stroke_color(*stroke_color);
            writer.op(&[*line_width], "w");
            writer.op(&[1.0], "J");
            writer.op(&[1.0], "j");
            writer.move_to(*first);
            if rest.is_empty() {
                writer.line_to(*first);
            }
            for point in rest {
                writer.line_to(*point);
            }
            writer.op(&[], "S");
            writer.op(&[], "Q");
        }
        AnnotationKind::Text { rect, content, font_family, font_size, font_color } => {
            if content.is_empty() {
                return Ok(());
            }

            writer.op(&[], "q");
            writer.rect(rect);
            writer.op(&[], "W n");
            let alpha = font_color.to_normalized().3;
            writer.alpha(GraphicsState::new(alpha, alpha, BlendMode::Normal));
            writer.fill_color(*font_color);
            writer.op(&[], "BT");
            let font = writer.resources.font_name(*font_family);
            writer.bytes.push(b'/');
            writer.bytes.extend_from_slice(font.as_bytes());
            writer.bytes.push(b' ');
            writer.op(&[*font_size], "Tf");

            for (line_number, line) in content.split('\n').enumerate() {
                let baseline = rect.y0() + font_size * (1.0 + line_number as f64 * LINE_SPACING);
                let (x, y) = writer.pdf(Point::new(rect.x0() + TEXT_PADDING, baseline));
                writer.op(&[1.0, 0.0, 0.0, 1.0, x, y], "Tm");
                writer.literal(line.trim_end_matches('\r'))?;
            }
            writer.op(&[], "ET");
            writer.op(&[], "Q");
        }
        AnnotationKind::Stamp { rect, image, opacity } => {
            let decoded = image::load_from_memory(image.bytes())
                .map_err(|err| format!("stamp image could not be decoded: {err}"))?
                .to_rgba8();
            let (width, height) = decoded.dimensions();
            let pixels = width as usize * height as usize;
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            for pixel in decoded.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel.0[3]);
            }
            let alpha = if alpha.iter().all(|value| *value == 255) { None } else { Some(alpha) };
            let name = writer.resources.image_name(OverlayImage { width, height, rgb, alpha });

            writer.op(&[], "q");
            writer.alpha(GraphicsState::new(*opacity, *opacity, BlendMode::Normal));
            let (x, y) = writer.pdf(Point::new(rect.x0(), rect.y1()));
            writer.op(&[rect.width(), 0.0, 0.0, rect.height(), x, y], "cm");
            writer.named(&name, "Do");
            writer.op(&[], "Q");
        }
        AnnotationKind::Note { anchor, color, .. } => {
            let icon = Rect::from_origin_size(*anchor, Size::new(NOTE_ICON_SIZE, NOTE_ICON_SIZE));

            writer.op(&[], "q");
            let alpha = color.to_normalized().3;
            writer.alpha(GraphicsState::new(1.0, alpha, BlendMode::Normal));
            writer.fill_color(*color);
            writer.stroke_color(Color::BLACK);
            writer.op(&[0.75], "w");
            writer.rect(&icon);
            writer.op(&[], "B");
            for offset in [6.0, 10.0, 14.0] {
                writer.move_to(anchor.offset(4.0, offset));
                writer.line_to(anchor.offset(NOTE_ICON_SIZE - 4.0, offset));
            }
            writer.op(&[], "S");
            writer.op(&[], "Q");
        }
    }
    Ok(())
}

/// Renders the page's annotations, in z-order, into an overlay.
///
/// Fails with `CompositionFailed` naming the first annotation that cannot be
/// expressed (text outside WinAnsi, undecodable stamp image).
pub fn flush_page(page: &Page, page_index: usize) -> Result<ComposedPage, PdfEngineError> {
    let mut overlay = PageOverlay::default();
    let mut writer =
        ContentWriter { bytes: Vec::new(), height: page.size().height, resources: &mut overlay };

    for annotation in page.annotations() {
        draw(&mut writer, annotation).map_err(|reason| {
            PdfEngineError::composition(page_index, Some(annotation.id()), reason)
        })?;
    }

    let content = writer.bytes;
    overlay.content = content;
    tracing::debug!(
        page_index,
        annotations = page.annotations().len(),
        bytes = overlay.content.len(),
        "flushed page"
    );

    Ok(ComposedPage {
        size: page.size(),
        rotation: page.rotation(),
        source: page.source().cloned(),
        overlay,
    })
}

pub fn flush_document(document: &Document) -> Result<Vec<ComposedPage>, PdfEngineError> {
    document
        .pages()
        .iter()
        .enumerate()
        .map(|(index, page)| flush_page(page, index))
        .collect()
}
