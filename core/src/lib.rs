//! Branch tree state and editor logic for a five-level documentation tree.
//!
//! [`TreeState`] holds the per-level branch collections, [`EditorUiState`]
//! tracks the editor mode and the open context menu, and the controllers
//! drive both against a [`storage::BranchStore`].

pub mod controller;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod tree;
pub mod ui_state;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use state::AppState;
pub use tree::TreeState;
pub use ui_state::{EditorMode, EditorUiState, MenuTarget, WidgetEffect};
