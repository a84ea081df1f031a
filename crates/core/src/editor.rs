//! The `Editor` facade the shell talks to.
//!
//! It owns the document, the command history, change observers and the
//! engine settings. All mutation goes through [`Editor::execute`], so every
//! change is undoable and observers hear about it exactly once.

use doc_model::{AnnotationId, AnnotationMetadata, Document, EngineSettings, Page};
use pdf_engine::{ComposedPage, PageCodec};
use viewer_core::{Point, ViewState};

use crate::command::Command;
use crate::error::{EditorError, EditorResult};
use crate::history::{CommandHistory, HistoryEntry};
use crate::observer::{ChangeOrigin, ChangeScope, DocumentChange, DocumentObserver, ObserverId};

pub struct Editor {
    document: Document,
    history: CommandHistory,
    settings: EngineSettings,
    observers: Vec<(ObserverId, Box<dyn DocumentObserver>)>,
    next_observer: u64,
    split_parts: Vec<Document>,
    revision: u64,
    next_revision: u64,
    saved_revision: u64,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("pages", &self.document.page_count())
            .field("history", &self.history)
            .field("observers", &self.observers.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl Editor {
    pub fn new(settings: EngineSettings) -> EditorResult<Self> {
        Self::with_document(Document::new(), settings)
    }

    pub fn with_document(document: Document, settings: EngineSettings) -> EditorResult<Self> {
        settings.validate()?;
        Ok(Self {
            document,
            history: CommandHistory::new(settings.history_capacity),
            settings,
            observers: Vec::new(),
            next_observer: 0,
            split_parts: Vec::new(),
            revision: 0,
            next_revision: 1,
            saved_revision: 0,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&'static str> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&'static str> {
        self.history.redo_label()
    }

    /// True when the document differs from what was last opened or saved.
    pub fn is_modified(&self) -> bool {
        self.revision != self.saved_revision
    }

    pub fn subscribe(&mut self, observer: impl DocumentObserver + 'static) -> ObserverId {
        self.next_observer += 1;
        let id = ObserverId::new(self.next_observer);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(known, _)| *known != id);
        self.observers.len() != before
    }

    /// A blank page in the configured default size.
    pub fn blank_page(&self) -> EditorResult<Page> {
        Ok(Page::blank(self.settings.default_page_size)?)
    }

    /// Metadata for a new annotation, stamped with the configured author.
    pub fn new_metadata(&self) -> AnnotationMetadata {
        AnnotationMetadata::new(self.settings.default_author.clone())
    }

    pub fn execute(&mut self, command: Command) -> EditorResult<()> {
        let label = command.label();
        let applied = command.apply(&mut self.document).inspect_err(|err| {
            tracing::warn!(command = label, error = %err, "command rejected");
        })?;

        if let Some(parts) = applied.split_parts() {
            self.split_parts = parts;
        }

        let scope = applied.scope();
        let before = self.revision;
        self.revision = self.next_revision;
        self.next_revision += 1;
        self.history.record(HistoryEntry { command: applied, before, after: self.revision });

        tracing::info!(command = label, undo_depth = self.history.undo_len(), "executed command");
        self.notify(DocumentChange { origin: ChangeOrigin::Executed, label, scope });
        Ok(())
    }

    pub fn undo(&mut self) -> EditorResult<()> {
        let entry = self.history.pop_undo().ok_or(EditorError::EmptyHistory("undo"))?;
        if let Err(err) = entry.command.revert(&mut self.document) {
            self.history.push_undo(entry);
            return Err(err);
        }

        let change = DocumentChange {
            origin: ChangeOrigin::Undone,
            label: entry.command.label(),
            scope: entry.command.scope(),
        };
        if entry.command.split_parts().is_some() {
            self.split_parts.clear();
        }
        self.revision = entry.before;
        self.history.push_redo(entry);

        tracing::info!(command = change.label, "undid command");
        self.notify(change);
        Ok(())
    }

    pub fn redo(&mut self) -> EditorResult<()> {
        let entry = self.history.pop_redo().ok_or(EditorError::EmptyHistory("redo"))?;
        if let Err(err) = entry.command.reapply(&mut self.document) {
            self.history.push_redo(entry);
            return Err(err);
        }

        let change = DocumentChange {
            origin: ChangeOrigin::Redone,
            label: entry.command.label(),
            scope: entry.command.scope(),
        };
        if let Some(parts) = entry.command.split_parts() {
            self.split_parts = parts;
        }
        self.revision = entry.after;
        self.history.push_undo(entry);

        tracing::info!(command = change.label, "redid command");
        self.notify(change);
        Ok(())
    }

    /// Documents split off by the most recent split, leaving none behind.
    pub fn take_split_parts(&mut self) -> Vec<Document> {
        std::mem::take(&mut self.split_parts)
    }

    /// Replaces the document with one decoded from `bytes`. History is
    /// cleared. On failure the current document is kept.
    pub fn open(&mut self, codec: &dyn PageCodec, bytes: &[u8]) -> EditorResult<()> {
        let document = pdf_engine::open_document(codec, bytes.to_vec())?;

        self.document = document;
        self.history.clear();
        self.split_parts.clear();
        self.revision = self.next_revision;
        self.next_revision += 1;
        self.saved_revision = self.revision;

        self.notify(DocumentChange {
            origin: ChangeOrigin::Loaded,
            label: "Open",
            scope: ChangeScope::Structure,
        });
        Ok(())
    }

    /// Encodes the document. A failed save leaves the editor untouched.
    pub fn save(&mut self, codec: &dyn PageCodec) -> EditorResult<Vec<u8>> {
        let bytes = pdf_engine::save_document(codec, &self.document).inspect_err(|err| {
            tracing::warn!(error = %err, "save failed");
        })?;

        self.document.mark_clean();
        self.saved_revision = self.revision;
        self.notify(DocumentChange {
            origin: ChangeOrigin::Saved,
            label: "Save",
            scope: ChangeScope::Structure,
        });
        Ok(bytes)
    }

    pub fn flush_page(&self, index: usize) -> EditorResult<ComposedPage> {
        let page = self.document.page(index)?;
        Ok(pdf_engine::flush_page(page, index)?)
    }

    /// Topmost annotation under a pointer position given in view coordinates.
    pub fn hit_test_view(
        &self,
        page_index: usize,
        view_point: Point,
        view: &ViewState,
    ) -> EditorResult<Option<AnnotationId>> {
        let page = self.document.page(page_index)?;
        let transform = view.transform_for(page.size(), page.rotation())?;
        let point = transform.to_document(view_point);
        Ok(page.topmost_hit(point, self.settings.hit_tolerance)?)
    }

    fn notify(&mut self, change: DocumentChange) {
        for (_, observer) in &mut self.observers {
            observer.document_changed(&change);
        }
    }
}
