mod editor;
mod tree;

pub use editor::{EditorController, RichTextWidget, SubmitOutcome, EMPTY_DOCUMENT};
pub use tree::{MenuAction, PendingDelete, TreeController, VisibleNode};
