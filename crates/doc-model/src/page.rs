use std::fmt;
use std::sync::Arc;

use viewer_core::{Point, Rotation, Size};

use crate::{Annotation, AnnotationId, ModelError};

/// Codec-owned bytes describing a page's pre-existing content.
///
/// The model never looks inside; it only moves the bytes along with the page
/// so structural edits keep the original content attached.
#[derive(Clone, PartialEq, Eq)]
pub struct PageSource(Arc<[u8]>);

impl PageSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageSource({} bytes)", self.0.len())
    }
}

/// Where `Page::restack` moves an annotation in the draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZOrder {
    BringToFront,
    SendToBack,
    BringForward,
    SendBackward,
}

/// One page: native size, stored rotation, and annotations in draw order
/// (later entries are drawn on top).
#[derive(Debug, Clone)]
pub struct Page {
    size: Size,
    rotation: Rotation,
    annotations: Vec<Annotation>,
    source: Option<PageSource>,
    dirty: bool,
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.rotation == other.rotation
            && self.annotations == other.annotations
            && self.source == other.source
    }
}

impl Page {
    pub fn new(
        size: Size,
        rotation: Rotation,
        source: Option<PageSource>,
    ) -> Result<Self, ModelError> {
        Ok(Self { size: size.validate()?, rotation, annotations: Vec::new(), source, dirty: false })
    }

    pub fn blank(size: Size) -> Result<Self, ModelError> {
        Self::new(size, Rotation::Deg0, None)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        if self.rotation != rotation {
            self.rotation = rotation;
            self.dirty = true;
        }
    }

    pub fn source(&self) -> Option<&PageSource> {
        self.source.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id() == id)
    }

    pub fn position_of(&self, id: AnnotationId) -> Option<usize> {
        self.annotations.iter().position(|annotation| annotation.id() == id)
    }

    fn require_position(&self, id: AnnotationId) -> Result<usize, ModelError> {
        self.position_of(id).ok_or(ModelError::AnnotationNotFound(id))
    }

    /// Inserts at `index` in the draw order (`index == len` appends on top).
    pub fn insert_annotation(
        &mut self,
        index: usize,
        annotation: Annotation,
    ) -> Result<(), ModelError> {
        if index > self.annotations.len() {
            return Err(ModelError::InvalidParameter(format!(
                "annotation position {index} exceeds stack of {}",
                self.annotations.len()
            )));
        }
        if self.position_of(annotation.id()).is_some() {
            return Err(ModelError::DuplicateAnnotation(annotation.id()));
        }

        self.annotations.insert(index, annotation);
        self.dirty = true;
        Ok(())
    }

    pub fn push_annotation(&mut self, annotation: Annotation) -> Result<(), ModelError> {
        self.insert_annotation(self.annotations.len(), annotation)
    }

    /// Removes the annotation and reports where it sat in the draw order.
    pub fn remove_annotation(
        &mut self,
        id: AnnotationId,
    ) -> Result<(usize, Annotation), ModelError> {
        let index = self.require_position(id)?;
        self.dirty = true;
        Ok((index, self.annotations.remove(index)))
    }

    /// Swaps in a new value for the annotation with the same id, returning the old one.
    pub fn replace_annotation(&mut self, annotation: Annotation) -> Result<Annotation, ModelError> {
        let index = self.require_position(annotation.id())?;
        self.dirty = true;
        Ok(std::mem::replace(&mut self.annotations[index], annotation))
    }

    /// Moves an annotation to an absolute draw-order position, returning its
    /// previous position.
    pub fn move_annotation_to(
        &mut self,
        id: AnnotationId,
        position: usize,
    ) -> Result<usize, ModelError> {
        let from = self.require_position(id)?;
        let last = self.annotations.len() - 1;
        if position > last {
            return Err(ModelError::InvalidParameter(format!(
                "annotation position {position} exceeds stack of {}",
                self.annotations.len()
            )));
        }

        if from != position {
            let annotation = self.annotations.remove(from);
            self.annotations.insert(position, annotation);
            self.dirty = true;
        }
        Ok(from)
    }

    /// Applies a relative z-order change, returning the previous position.
    pub fn restack(&mut self, id: AnnotationId, placement: ZOrder) -> Result<usize, ModelError> {
        let from = self.require_position(id)?;
        let last = self.annotations.len() - 1;
        let to = match placement {
            ZOrder::BringToFront => last,
            ZOrder::SendToBack => 0,
            ZOrder::BringForward => (from + 1).min(last),
            ZOrder::SendBackward => from.saturating_sub(1),
        };
        self.move_annotation_to(id, to)
    }

    /// Topmost annotation under `point`, in page-native coordinates.
    pub fn topmost_hit(
        &self,
        point: Point,
        tolerance: f64,
    ) -> Result<Option<AnnotationId>, ModelError> {
        for annotation in self.annotations.iter().rev() {
            if annotation.hit_test(point, tolerance)? {
                return Ok(Some(annotation.id()));
            }
        }
        Ok(None)
    }

    /// Same page with every annotation re-issued under a fresh id.
    pub fn with_fresh_ids(&self) -> Page {
        Page {
            size: self.size,
            rotation: self.rotation,
            annotations: self.annotations.iter().map(Annotation::duplicate).collect(),
            source: self.source.clone(),
            dirty: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use viewer_core::Rect;

    use super::*;
    use crate::{AnnotationKind, AnnotationMetadata, Color};

    fn square(offset: f64) -> Annotation {
        Annotation::new(
            AnnotationKind::Rectangle {
                rect: Rect::new(offset, offset, offset + 10.0, offset + 10.0),
                stroke_color: Color::RED,
                line_width: 1.0,
                fill_color: None,
            },
            AnnotationMetadata::default(),
        )
        .expect("square should be valid")
    }

    fn page_with(count: usize) -> (Page, Vec<AnnotationId>) {
        let mut page = Page::blank(Size::A4).expect("A4 should be valid");
        let mut ids = Vec::new();
        for i in 0..count {
            let annotation = square(i as f64 * 100.0);
            ids.push(annotation.id());
            page.push_annotation(annotation).expect("push should succeed");
        }
        (page, ids)
    }

    fn order(page: &Page) -> Vec<AnnotationId> {
        page.annotations().iter().map(Annotation::id).collect()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let (mut page, _) = page_with(0);
        let annotation = square(0.0);
        page.push_annotation(annotation.clone()).expect("first push should succeed");

        let err = page.push_annotation(annotation).expect_err("second push should fail");
        assert!(matches!(err, ModelError::DuplicateAnnotation(_)));
    }

    #[test]
    fn restack_moves_within_bounds() {
        let (mut page, ids) = page_with(3);

        assert_eq!(page.restack(ids[0], ZOrder::BringToFront).expect("restack"), 0);
        assert_eq!(order(&page), vec![ids[1], ids[2], ids[0]]);

        assert_eq!(page.restack(ids[1], ZOrder::SendBackward).expect("restack"), 0);
        assert_eq!(order(&page), vec![ids[1], ids[2], ids[0]]);

        assert_eq!(page.restack(ids[1], ZOrder::BringForward).expect("restack"), 0);
        assert_eq!(order(&page), vec![ids[2], ids[1], ids[0]]);

        page.restack(ids[0], ZOrder::SendToBack).expect("restack");
        assert_eq!(order(&page), vec![ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn topmost_hit_prefers_later_annotations() {
        let mut page = Page::blank(Size::A4).expect("A4 should be valid");
        let below = square(0.0);
        let above = square(5.0);
        page.push_annotation(below.clone()).expect("push");
        page.push_annotation(above.clone()).expect("push");

        let hit = page.topmost_hit(Point::new(7.0, 7.0), 0.0).expect("hit test");
        assert_eq!(hit, Some(above.id()));
        let hit = page.topmost_hit(Point::new(1.0, 1.0), 0.0).expect("hit test");
        assert_eq!(hit, Some(below.id()));
        assert_eq!(page.topmost_hit(Point::new(400.0, 400.0), 0.0).expect("hit test"), None);
    }

    #[test]
    fn equality_ignores_dirty_flag() {
        let (page, _) = page_with(2);
        let mut clean = page.clone();
        clean.mark_clean();

        assert!(page.is_dirty());
        assert_eq!(page, clean);
    }

    #[test]
    fn remove_reports_position() {
        let (mut page, ids) = page_with(3);
        let (index, removed) = page.remove_annotation(ids[1]).expect("remove should succeed");

        assert_eq!(index, 1);
        assert_eq!(removed.id(), ids[1]);
        assert!(matches!(
            page.remove_annotation(ids[1]),
            Err(ModelError::AnnotationNotFound(_))
        ));
    }

    #[test]
    fn fresh_ids_keep_attributes() {
        let (page, ids) = page_with(2);
        let copy = page.with_fresh_ids();

        assert!(copy.annotations().iter().all(|a| !ids.contains(&a.id())));
        for (a, b) in page.annotations().iter().zip(copy.annotations()) {
            assert_eq!(a.kind(), b.kind());
        }
    }
}
