//! Editor core: reversible commands over the document model, undo/redo
//! history, change notification, and the `Editor` facade used by the shell.

mod command;
mod editor;
mod error;
mod history;
mod observer;

pub use command::{AppliedCommand, Command};
pub use editor::Editor;
pub use error::{EditorError, EditorResult, ErrorKind};
pub use history::CommandHistory;
pub use observer::{ChangeOrigin, ChangeScope, DocumentChange, DocumentObserver, ObserverId};
