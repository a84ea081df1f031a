/// What caused a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Executed,
    Undone,
    Redone,
    Loaded,
    Saved,
}

/// Which part of the document needs refreshing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// Only this page's content or rotation changed.
    Page(usize),
    /// Pages were added, removed or reordered.
    Structure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentChange {
    pub origin: ChangeOrigin,
    pub label: &'static str,
    pub scope: ChangeScope,
}

pub trait DocumentObserver {
    fn document_changed(&mut self, change: &DocumentChange);
}

impl<F> DocumentObserver for F
where
    F: FnMut(&DocumentChange),
{
    fn document_changed(&mut self, change: &DocumentChange) {
        self(change)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}
