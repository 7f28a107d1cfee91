use crate::models::Level;
use crate::storage::BranchRepository;
use crate::tree::TreeState;
use crate::ui_state::EditorUiState;

/// Everything the controllers read and mutate, passed to them explicitly
#[derive(Debug, Default)]
pub struct AppState {
    pub tree: TreeState,
    pub ui: EditorUiState,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload every level, closing a menu whose branch disappeared
    pub fn fetch_all(&mut self, repo: BranchRepository<'_>) {
        self.tree.fetch_all(repo);
        self.ui.sync_menu(&mut self.tree);
    }

    /// Reload one level, closing a menu whose branch disappeared
    pub fn fetch_level(&mut self, repo: BranchRepository<'_>, level: Level) -> bool {
        let loaded = self.tree.fetch_level(repo, level);
        self.ui.sync_menu(&mut self.tree);
        loaded
    }
}
