use crate::models::{Branch, BranchId, Level};
use crate::tree::TreeState;
use tracing::debug;

/// What a submit from the editor would do
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditorMode {
    #[default]
    Closed,
    /// Create a new level-1 branch
    AddRoot,
    /// Create a branch at `level` under `parent_id`
    AddChild { parent_id: BranchId, level: Level },
    /// Update an existing branch
    Editing { branch: Branch, level: Level },
}

/// What the rich-text widget has to do after a mode transition
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEffect {
    /// Blank the widget back to the empty document template
    Reset,
    /// Show an existing branch
    Load { title: String, content: String },
    /// The transition was rejected; leave the widget alone
    Unchanged,
}

/// The branch whose context menu is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuTarget {
    pub branch_id: BranchId,
    pub level: Level,
}

/// Editor mode plus the single open context menu.
#[derive(Debug, Default)]
pub struct EditorUiState {
    mode: EditorMode,
    active_menu: Option<MenuTarget>,
}

impl EditorUiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    /// Whether the editor pane is shown
    pub fn is_open(&self) -> bool {
        self.mode != EditorMode::Closed
    }

    /// Whether a submit would update rather than create
    pub fn is_update(&self) -> bool {
        matches!(self.mode, EditorMode::Editing { .. })
    }

    /// Level a submit in the current mode writes to
    pub fn target_level(&self) -> Option<Level> {
        match &self.mode {
            EditorMode::Closed => None,
            EditorMode::AddRoot => Some(Level::ROOT),
            EditorMode::AddChild { level, .. } | EditorMode::Editing { level, .. } => Some(*level),
        }
    }

    /// Open the editor; it always lands on "add a root branch"
    pub fn open_editor(&mut self) -> WidgetEffect {
        self.transition(EditorMode::AddRoot)
    }

    pub fn close_editor(&mut self) -> WidgetEffect {
        self.transition(EditorMode::Closed)
    }

    pub fn reset_to_add_root(&mut self) -> WidgetEffect {
        self.transition(EditorMode::AddRoot)
    }

    /// Prepare to add a child under `parent`. Leaf parents are rejected.
    pub fn start_add_child(&mut self, parent: &Branch) -> WidgetEffect {
        match parent.level.child() {
            Some(level) => self.transition(EditorMode::AddChild {
                parent_id: parent.id,
                level,
            }),
            None => {
                debug!(id = %parent.id, "cannot add a child below the leaf level");
                WidgetEffect::Unchanged
            }
        }
    }

    /// Edit `branch` at its own level
    pub fn start_edit(&mut self, branch: Branch) -> WidgetEffect {
        let level = branch.level;
        self.transition(EditorMode::Editing { branch, level })
    }

    fn transition(&mut self, mode: EditorMode) -> WidgetEffect {
        debug!(?mode, "editor mode change");
        let effect = match &mode {
            EditorMode::Editing { branch, .. } => WidgetEffect::Load {
                title: branch.title.clone(),
                content: branch.content.clone(),
            },
            _ => WidgetEffect::Reset,
        };
        self.mode = mode;
        effect
    }

    pub fn active_menu(&self) -> Option<MenuTarget> {
        self.active_menu
    }

    pub fn is_menu_visible(&self, branch_id: BranchId, level: Level) -> bool {
        self.active_menu == Some(MenuTarget { branch_id, level })
    }

    /// Open the menu of one branch, closing any other
    pub fn show_menu(&mut self, tree: &mut TreeState, branch_id: BranchId, level: Level) {
        tree.reset_all_menu_pending();
        tree.set_menu_pending(level, branch_id);
        self.active_menu = Some(MenuTarget { branch_id, level });
    }

    pub fn hide_menu(&mut self, tree: &mut TreeState) {
        tree.reset_all_menu_pending();
        self.active_menu = None;
    }

    /// Close the menu if its branch is no longer in the tree
    pub fn sync_menu(&mut self, tree: &mut TreeState) {
        if let Some(target) = self.active_menu {
            if tree.find(target.level, target.branch_id).is_none() {
                debug!(id = %target.branch_id, level = %target.level, "menu target vanished");
                self.hide_menu(tree);
            }
        }
    }
}
