use std::ops::{Range, RangeInclusive};

use viewer_core::Rotation;

use crate::{Annotation, AnnotationId, ModelError, Page};

/// Ordered page collection. Page indices are always `0..page_count()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pages(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Result<&Page, ModelError> {
        let len = self.pages.len();
        self.pages.get(index).ok_or(ModelError::IndexOutOfBounds { index, len })
    }

    pub fn page_mut(&mut self, index: usize) -> Result<&mut Page, ModelError> {
        let len = self.pages.len();
        self.pages.get_mut(index).ok_or(ModelError::IndexOutOfBounds { index, len })
    }

    pub fn is_dirty(&self) -> bool {
        self.pages.iter().any(Page::is_dirty)
    }

    pub fn mark_clean(&mut self) {
        self.pages.iter_mut().for_each(Page::mark_clean);
    }

    /// Page index and annotation for `id`, searching every page.
    pub fn find_annotation(&self, id: AnnotationId) -> Option<(usize, &Annotation)> {
        self.pages
            .iter()
            .enumerate()
            .find_map(|(index, page)| page.annotation(id).map(|annotation| (index, annotation)))
    }

    fn check_insert_position(&self, index: usize) -> Result<(), ModelError> {
        if index > self.pages.len() {
            return Err(ModelError::IndexOutOfBounds { index, len: self.pages.len() });
        }
        Ok(())
    }

    pub fn insert_page(&mut self, index: usize, page: Page) -> Result<(), ModelError> {
        self.check_insert_position(index)?;
        self.pages.insert(index, page);
        Ok(())
    }

    pub fn delete_page(&mut self, index: usize) -> Result<Page, ModelError> {
        self.page(index)?;
        Ok(self.pages.remove(index))
    }

    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), ModelError> {
        self.page(from)?;
        self.page(to)?;

        let page = self.pages.remove(from);
        self.pages.insert(to, page);
        Ok(())
    }

    /// Rotates a page clockwise by `delta_degrees` (a non-zero quarter turn,
    /// negative for counter-clockwise). Only the rotation field changes.
    /// Returns the previous rotation.
    pub fn rotate_page(&mut self, index: usize, delta_degrees: i32) -> Result<Rotation, ModelError> {
        let delta = Rotation::from_degrees(delta_degrees)?;
        if delta == Rotation::Deg0 {
            return Err(ModelError::InvalidParameter(format!(
                "rotation delta {delta_degrees} does not turn the page"
            )));
        }

        let page = self.page_mut(index)?;
        let previous = page.rotation();
        page.set_rotation(previous.compose(delta));
        Ok(previous)
    }

    /// Sets an absolute rotation, returning the previous one.
    pub fn set_page_rotation(
        &mut self,
        index: usize,
        rotation: Rotation,
    ) -> Result<Rotation, ModelError> {
        let page = self.page_mut(index)?;
        let previous = page.rotation();
        page.set_rotation(rotation);
        Ok(previous)
    }

    /// Inserts `pages` starting at `at`, returning the index range they occupy.
    pub fn insert_pages(&mut self, at: usize, pages: Vec<Page>) -> Result<Range<usize>, ModelError> {
        self.check_insert_position(at)?;
        let range = at..at + pages.len();
        self.pages.splice(at..at, pages);
        Ok(range)
    }

    pub fn remove_pages(&mut self, range: Range<usize>) -> Result<Vec<Page>, ModelError> {
        if range.start > range.end || range.end > self.pages.len() {
            return Err(ModelError::IndexOutOfBounds { index: range.end, len: self.pages.len() });
        }
        Ok(self.pages.drain(range).collect())
    }

    /// Appends a deep copy of `other`'s pages at `at`. Every copied annotation
    /// gets a fresh id so merged pages never collide with existing ones.
    pub fn merge_with(&mut self, other: &Document, at: usize) -> Result<Range<usize>, ModelError> {
        self.check_insert_position(at)?;
        let copies = other.pages.iter().map(Page::with_fresh_ids).collect();
        self.insert_pages(at, copies)
    }

    /// Sorted, de-duplicated split points, each strictly inside `1..page_count()`.
    pub fn split_points(&self, indices: &[usize]) -> Result<Vec<usize>, ModelError> {
        if indices.is_empty() {
            return Err(ModelError::InvalidParameter("split needs at least one index".into()));
        }

        let mut points = indices.to_vec();
        points.sort_unstable();
        points.dedup();

        let len = self.pages.len();
        if let Some(&bad) = points.iter().find(|&&index| index == 0 || index >= len) {
            return Err(ModelError::IndexOutOfBounds { index: bad, len });
        }
        Ok(points)
    }

    /// Partitions the pages into contiguous documents starting at each split
    /// point. Pages move into the parts; nothing is shared.
    pub fn split_at(self, indices: &[usize]) -> Result<Vec<Document>, ModelError> {
        let points = self.split_points(indices)?;
        let mut pages = self.pages;
        let mut parts = Vec::with_capacity(points.len() + 1);

        for &point in points.iter().rev() {
            parts.push(Document::from_pages(pages.split_off(point)));
        }
        parts.push(Document::from_pages(pages));
        parts.reverse();
        Ok(parts)
    }

    /// Copies each range of pages into a new document. Annotation ids are kept.
    pub fn extract_pages(
        &self,
        ranges: &[RangeInclusive<usize>],
    ) -> Result<Vec<Document>, ModelError> {
        let len = self.pages.len();
        ranges
            .iter()
            .map(|range| {
                let (start, end) = (*range.start(), *range.end());
                if start > end {
                    return Err(ModelError::InvalidParameter(format!(
                        "page range {start}-{end} is reversed"
                    )));
                }
                if end >= len {
                    return Err(ModelError::IndexOutOfBounds { index: end, len });
                }
                Ok(Document::from_pages(self.pages[start..=end].to_vec()))
            })
            .collect()
    }

    pub fn append(&mut self, other: Document) {
        self.pages.extend(other.pages);
    }
}

/// Parses 1-based page ranges such as `"1-3,5,7-10"` into 0-based inclusive
/// ranges. Page numbers are clamped to `1..=page_count`.
pub fn parse_page_ranges(
    input: &str,
    page_count: usize,
) -> Result<Vec<RangeInclusive<usize>>, ModelError> {
    if page_count == 0 {
        return Err(ModelError::InvalidParameter("document has no pages".into()));
    }

    let parse = |text: &str| -> Result<usize, ModelError> {
        text.trim().parse::<usize>().map_err(|_| {
            ModelError::InvalidParameter(format!("`{}` is not a page number", text.trim()))
        })
    };
    let clamp = |page: usize| page.clamp(1, page_count) - 1;

    let mut ranges = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(ModelError::InvalidParameter(format!("empty entry in `{input}`")));
        }

        let range = match part.split_once('-') {
            Some((start, end)) => clamp(parse(start)?)..=clamp(parse(end)?),
            None => {
                let page = clamp(parse(part)?);
                page..=page
            }
        };
        if range.start() > range.end() {
            return Err(ModelError::InvalidParameter(format!("page range `{part}` is reversed")));
        }
        ranges.push(range);
    }
    Ok(ranges)
}
