//! Reversible document mutations.
//!
//! A [`Command`] describes what the caller wants. Applying it produces an
//! [`AppliedCommand`] holding value snapshots of everything it touched, so
//! undo and redo replay recorded state instead of recomputing it.

use doc_model::{Annotation, AnnotationId, AttributeValue, Document, Page, ZOrder};
use viewer_core::Rotation;

use crate::error::EditorResult;
use crate::observer::ChangeScope;

#[derive(Debug, Clone)]
pub enum Command {
    /// Adds an annotation at `position` in the page's draw order, on top when `None`.
    AddAnnotation { page: usize, annotation: Annotation, position: Option<usize> },
    RemoveAnnotation { page: usize, id: AnnotationId },
    UpdateAnnotationAttribute { page: usize, id: AnnotationId, key: String, value: AttributeValue },
    MoveAnnotation { page: usize, id: AnnotationId, dx: f64, dy: f64 },
    ReorderAnnotation { page: usize, id: AnnotationId, placement: ZOrder },
    InsertPage { index: usize, page: Page },
    DeletePage { index: usize },
    /// Clockwise quarter turns in degrees; negative turns counter-clockwise.
    RotatePage { index: usize, delta_degrees: i32 },
    ReorderPage { from: usize, to: usize },
    /// Inserts copies of `document`'s pages at `at`, with fresh annotation ids.
    MergeDocument { document: Document, at: usize },
    /// Keeps the pages before the first split point; the other parts are
    /// handed to the caller.
    SplitDocument { indices: Vec<usize> },
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::AddAnnotation { .. } => "Add Annotation",
            Command::RemoveAnnotation { .. } => "Remove Annotation",
            Command::UpdateAnnotationAttribute { .. } => "Edit Annotation",
            Command::MoveAnnotation { .. } => "Move Annotation",
            Command::ReorderAnnotation { .. } => "Reorder Annotation",
            Command::InsertPage { .. } => "Insert Page",
            Command::DeletePage { .. } => "Delete Page",
            Command::RotatePage { .. } => "Rotate Page",
            Command::ReorderPage { .. } => "Move Page",
            Command::MergeDocument { .. } => "Merge Document",
            Command::SplitDocument { .. } => "Split Document",
        }
    }

    /// Applies the command. On error the document is unchanged.
    pub(crate) fn apply(self, document: &mut Document) -> EditorResult<AppliedCommand> {
        let label = self.label();
        let change = match self {
            Command::AddAnnotation { page, annotation, position } => {
                let target = document.page_mut(page)?;
                let position = position.unwrap_or(target.annotations().len());
                target.insert_annotation(position, annotation.clone())?;
                Change::AddAnnotation { page, position, annotation }
            }
            Command::RemoveAnnotation { page, id } => {
                let (position, annotation) = document.page_mut(page)?.remove_annotation(id)?;
                Change::RemoveAnnotation { page, position, annotation }
            }
            Command::UpdateAnnotationAttribute { page, id, key, value } => {
                let target = document.page_mut(page)?;
                let before = current(target, id)?;
                let after = before.with_attribute(&key, value)?;
                target.replace_annotation(after.clone())?;
                Change::ReplaceAnnotation { page, before, after }
            }
            Command::MoveAnnotation { page, id, dx, dy } => {
                let target = document.page_mut(page)?;
                let before = current(target, id)?;
                let after = before.translated(dx, dy)?;
                target.replace_annotation(after.clone())?;
                Change::ReplaceAnnotation { page, before, after }
            }
            Command::ReorderAnnotation { page, id, placement } => {
                let target = document.page_mut(page)?;
                let from = target.restack(id, placement)?;
                let to = target.position_of(id).unwrap_or(from);
                Change::ReorderAnnotation { page, id, from, to }
            }
            Command::InsertPage { index, page } => {
                document.insert_page(index, page.clone())?;
                Change::InsertPage { index, page }
            }
            Command::DeletePage { index } => {
                let page = document.delete_page(index)?;
                Change::DeletePage { index, page }
            }
            Command::RotatePage { index, delta_degrees } => {
                let before = document.rotate_page(index, delta_degrees)?;
                let after = document.page(index)?.rotation();
                Change::RotatePage { index, before, after }
            }
            Command::ReorderPage { from, to } => {
                document.move_page(from, to)?;
                Change::ReorderPage { from, to }
            }
            Command::MergeDocument { document: other, at } => {
                let range = document.merge_with(&other, at)?;
                let pages = document.pages()[range].to_vec();
                Change::MergeDocument { at, pages }
            }
            Command::SplitDocument { indices } => {
                let points = document.split_points(&indices)?;
                let at = points[0];
                let part_lengths = points
                    .iter()
                    .zip(points.iter().skip(1).chain(std::iter::once(&document.page_count())))
                    .map(|(start, end)| end - start)
                    .collect();
                let removed = document.remove_pages(at..document.page_count())?;
                Change::SplitDocument { at, removed, part_lengths }
            }
        };
        Ok(AppliedCommand { label, change })
    }
}

fn current(page: &Page, id: AnnotationId) -> EditorResult<Annotation> {
    page.annotation(id)
        .cloned()
        .ok_or_else(|| doc_model::ModelError::AnnotationNotFound(id).into())
}

#[derive(Debug, Clone)]
enum Change {
    AddAnnotation { page: usize, position: usize, annotation: Annotation },
    RemoveAnnotation { page: usize, position: usize, annotation: Annotation },
    ReplaceAnnotation { page: usize, before: Annotation, after: Annotation },
    ReorderAnnotation { page: usize, id: AnnotationId, from: usize, to: usize },
    InsertPage { index: usize, page: Page },
    DeletePage { index: usize, page: Page },
    RotatePage { index: usize, before: Rotation, after: Rotation },
    ReorderPage { from: usize, to: usize },
    MergeDocument { at: usize, pages: Vec<Page> },
    SplitDocument { at: usize, removed: Vec<Page>, part_lengths: Vec<usize> },
}

/// A command that has been applied, with the state needed to revert and
/// re-apply it exactly.
#[derive(Debug, Clone)]
pub struct AppliedCommand {
    label: &'static str,
    change: Change,
}

impl AppliedCommand {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn scope(&self) -> ChangeScope {
        match &self.change {
            Change::AddAnnotation { page, .. }
            | Change::RemoveAnnotation { page, .. }
            | Change::ReplaceAnnotation { page, .. }
            | Change::ReorderAnnotation { page, .. } => ChangeScope::Page(*page),
            Change::RotatePage { index, .. } => ChangeScope::Page(*index),
            Change::InsertPage { .. }
            | Change::DeletePage { .. }
            | Change::ReorderPage { .. }
            | Change::MergeDocument { .. }
            | Change::SplitDocument { .. } => ChangeScope::Structure,
        }
    }

    /// Documents split off by a `SplitDocument`, rebuilt from the recorded pages.
    pub fn split_parts(&self) -> Option<Vec<Document>> {
        let Change::SplitDocument { removed, part_lengths, .. } = &self.change else {
            return None;
        };

        let mut start = 0;
        let parts = part_lengths
            .iter()
            .map(|len| {
                let part = Document::from_pages(removed[start..start + len].to_vec());
                start += len;
                part
            })
            .collect();
        Some(parts)
    }

    pub(crate) fn revert(&self, document: &mut Document) -> EditorResult<()> {
        match &self.change {
            Change::AddAnnotation { page, annotation, .. } => {
                document.page_mut(*page)?.remove_annotation(annotation.id())?;
            }
            Change::RemoveAnnotation { page, position, annotation } => {
                document.page_mut(*page)?.insert_annotation(*position, annotation.clone())?;
            }
            Change::ReplaceAnnotation { page, before, .. } => {
                document.page_mut(*page)?.replace_annotation(before.clone())?;
            }
            Change::ReorderAnnotation { page, id, from, .. } => {
                document.page_mut(*page)?.move_annotation_to(*id, *from)?;
            }
            Change::InsertPage { index, .. } => {
                document.delete_page(*index)?;
            }
            Change::DeletePage { index, page } => {
                document.insert_page(*index, page.clone())?;
            }
            Change::RotatePage { index, before, .. } => {
                document.set_page_rotation(*index, *before)?;
            }
            Change::ReorderPage { from, to } => {
                document.move_page(*to, *from)?;
            }
            Change::MergeDocument { at, pages } => {
                document.remove_pages(*at..*at + pages.len())?;
            }
            Change::SplitDocument { at, removed, .. } => {
                document.insert_pages(*at, removed.clone())?;
            }
        }
        Ok(())
    }

    pub(crate) fn reapply(&self, document: &mut Document) -> EditorResult<()> {
        match &self.change {
            Change::AddAnnotation { page, position, annotation } => {
                document.page_mut(*page)?.insert_annotation(*position, annotation.clone())?;
            }
            Change::RemoveAnnotation { page, annotation, .. } => {
                document.page_mut(*page)?.remove_annotation(annotation.id())?;
            }
            Change::ReplaceAnnotation { page, after, .. } => {
                document.page_mut(*page)?.replace_annotation(after.clone())?;
            }
            Change::ReorderAnnotation { page, id, to, .. } => {
                document.page_mut(*page)?.move_annotation_to(*id, *to)?;
            }
            Change::InsertPage { index, page } => {
                document.insert_page(*index, page.clone())?;
            }
            Change::DeletePage { index, .. } => {
                document.delete_page(*index)?;
            }
            Change::RotatePage { index, after, .. } => {
                document.set_page_rotation(*index, *after)?;
            }
            Change::ReorderPage { from, to } => {
                document.move_page(*from, *to)?;
            }
            Change::MergeDocument { at, pages } => {
                document.insert_pages(*at, pages.clone())?;
            }
            Change::SplitDocument { at, removed, .. } => {
                document.remove_pages(*at..*at + removed.len())?;
            }
        }
        Ok(())
    }
}
