use crate::models::{Branch, BranchId, Level};
use crate::state::AppState;
use crate::storage::BranchRepository;
use crate::ui_state::{EditorMode, WidgetEffect};
use tracing::debug;

/// One row of the rendered tree
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleNode {
    pub id: BranchId,
    pub level: Level,
    /// Zero for roots
    pub depth: usize,
    pub title: String,
    /// Whether an expand/collapse affordance is shown
    pub expandable: bool,
    pub expanded: bool,
    pub child_count: usize,
    pub menu_open: bool,
    /// The branch currently loaded in the editor
    pub editing: bool,
}

/// Entries offered by a branch's context menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    AddChild,
    Delete,
}

impl MenuAction {
    pub fn label(self) -> &'static str {
        match self {
            MenuAction::AddChild => "Add new Branch",
            MenuAction::Delete => "Delete Branch",
        }
    }
}

/// A delete that still needs the user's confirmation
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub branch_id: BranchId,
    pub level: Level,
    pub title: String,
}

/// Tree walking and the interactions on tree rows
pub struct TreeController;

impl TreeController {
    /// Walk the tree from the roots, descending only into expanded branches
    pub fn render(state: &AppState) -> Vec<VisibleNode> {
        let mut rows = Vec::new();
        for root in state.tree.roots() {
            Self::render_node(state, root, 0, &mut rows);
        }
        rows
    }

    fn render_node(state: &AppState, branch: &Branch, depth: usize, rows: &mut Vec<VisibleNode>) {
        let children = match branch.level.child() {
            Some(child_level) => state.tree.children_of(child_level, branch.id),
            None => Vec::new(),
        };
        let editing = match state.ui.mode() {
            EditorMode::Editing { branch: edited, level } => {
                edited.id == branch.id && *level == branch.level
            }
            _ => false,
        };

        rows.push(VisibleNode {
            id: branch.id,
            level: branch.level,
            depth,
            title: branch.title.clone(),
            expandable: branch.can_have_children(),
            expanded: branch.is_expanded && branch.can_have_children(),
            child_count: children.len(),
            menu_open: state.ui.is_menu_visible(branch.id, branch.level),
            editing,
        });

        if branch.is_expanded {
            for child in children {
                Self::render_node(state, child, depth + 1, rows);
            }
        }
    }

    /// Expand or collapse a branch. Leaves have no affordance to toggle.
    pub fn toggle(state: &mut AppState, level: Level, id: BranchId) -> Option<bool> {
        if level.is_leaf() {
            return None;
        }
        state.tree.toggle_expanded(level, id)
    }

    /// Right-click on a branch
    pub fn context_menu(state: &mut AppState, level: Level, id: BranchId) {
        if state.tree.find(level, id).is_none() {
            return;
        }
        state.ui.show_menu(&mut state.tree, id, level);
    }

    /// Any click outside an open menu
    pub fn dismiss_menu(state: &mut AppState) {
        if state.ui.active_menu().is_some() {
            state.ui.hide_menu(&mut state.tree);
        }
    }

    /// Left-click on a title: load the full record and edit it
    pub fn open_for_edit(
        state: &mut AppState,
        repo: BranchRepository<'_>,
        level: Level,
        id: BranchId,
    ) -> Option<WidgetEffect> {
        Self::dismiss_menu(state);
        let branch = state.tree.fetch_branch(repo, level, id)?;
        debug!(%level, %id, "editing branch");
        Some(state.ui.start_edit(branch))
    }

    /// The "Add New Main Branch" affordance
    pub fn add_main_branch(state: &mut AppState) -> WidgetEffect {
        Self::dismiss_menu(state);
        state.ui.reset_to_add_root()
    }

    /// Menu entries for a branch at `level`
    pub fn menu_actions(level: Level) -> Vec<MenuAction> {
        if level.is_leaf() {
            vec![MenuAction::Delete]
        } else {
            vec![MenuAction::AddChild, MenuAction::Delete]
        }
    }

    /// "Add child" on the open menu. The menu is hidden afterwards.
    pub fn menu_add_child(state: &mut AppState) -> WidgetEffect {
        let Some(target) = state.ui.active_menu() else {
            return WidgetEffect::Unchanged;
        };
        let parent = state.tree.find(target.level, target.branch_id).cloned();
        state.ui.hide_menu(&mut state.tree);

        match parent {
            Some(parent) => state.ui.start_add_child(&parent),
            None => WidgetEffect::Unchanged,
        }
    }

    /// "Delete" on the open menu. The menu is hidden and the returned
    /// request must be confirmed before anything is removed.
    pub fn request_delete(state: &mut AppState) -> Option<PendingDelete> {
        let target = state.ui.active_menu()?;
        state.ui.hide_menu(&mut state.tree);
        let branch = state.tree.find(target.level, target.branch_id)?;
        Some(PendingDelete {
            branch_id: branch.id,
            level: branch.level,
            title: branch.title.clone(),
        })
    }

    /// Carry out a confirmed delete and refresh the level
    pub fn confirm_delete(state: &mut AppState, repo: BranchRepository<'_>, pending: PendingDelete) -> bool {
        if !state.tree.remove(repo, pending.level, pending.branch_id) {
            return false;
        }
        state.fetch_level(repo, pending.level);
        true
    }
}
