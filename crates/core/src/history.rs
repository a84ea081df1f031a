use std::collections::VecDeque;

use crate::command::AppliedCommand;

/// An applied command plus the document revisions on either side of it.
#[derive(Debug, Clone)]
pub(crate) struct HistoryEntry {
    pub(crate) command: AppliedCommand,
    pub(crate) before: u64,
    pub(crate) after: u64,
}

/// Undo and redo stacks. When `capacity` is non-zero the oldest undo
/// entries are dropped once it is exceeded.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: usize,
}

impl CommandHistory {
    pub fn new(capacity: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn undo_label(&self) -> Option<&'static str> {
        self.undo.back().map(|entry| entry.command.label())
    }

    pub fn redo_label(&self) -> Option<&'static str> {
        self.redo.last().map(|entry| entry.command.label())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Records a freshly executed command, discarding anything redoable.
    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.push_undo(entry);
    }

    pub(crate) fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
        if self.capacity > 0 {
            while self.undo.len() > self.capacity {
                if let Some(evicted) = self.undo.pop_front() {
                    tracing::debug!(label = evicted.command.label(), "evicted oldest undo entry");
                }
            }
        }
    }

    pub(crate) fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop_back()
    }

    pub(crate) fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }
}
