use crate::config::{Bindings, Config};
use crate::editor::TextArea;
use anyhow::Result;
use branchdoc_core::{
    controller::{EditorController, MenuAction, PendingDelete, SubmitOutcome, TreeController, VisibleNode},
    models::{BranchDraft, BranchId, Level},
    storage::{BranchRepository, BranchStore, Database, SqliteBranchStore},
    AppState,
};
use ratatui::layout::{Position, Rect};
use std::time::{Duration, Instant};
use tracing::info;

/// How long a status message stays in the status bar
const STATUS_TTL: Duration = Duration::from_secs(5);

/// Sample tree seeded for a user with no branches: one chain through all
/// five levels plus a second root.
const SAMPLE_CHAIN: [(&str, &str); 5] = [
    ("Getting Started", "Everything needed to write the first pages of a manual."),
    ("Installation", "How to get the editor running."),
    ("Linux", "Distribution specific notes."),
    ("Packages", "Prebuilt packages and where to find them."),
    ("Debian", "Install the .deb and run it."),
];
const SAMPLE_SECOND_ROOT: (&str, &str) = ("Reference", "Right-click a branch to add children or delete it.");

/// Which pane receives typed keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Tree,
    Title,
    Content,
}

/// Screen regions recorded during render, used for mouse hit testing
#[derive(Debug, Clone, Copy, Default)]
pub struct HitAreas {
    /// Rows of the tree, below the add-main-branch line
    pub tree: Rect,
    pub add_main: Rect,
    pub menu: Option<Rect>,
    pub title: Rect,
    pub content: Rect,
}

/// Application state
pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub store: Box<dyn BranchStore>,
    pub editor: EditorController<TextArea>,
    pub config: Config,
    pub bindings: Bindings,
    pub cursor_position: usize,
    pub scroll_offset: usize,
    pub focus: Focus,
    pub menu_selection: usize,
    pub pending_delete: Option<PendingDelete>,
    pub status_message: Option<(String, Instant)>,
    pub last_input_time: Option<Instant>,
    pub hit_areas: HitAreas,
}

impl App {
    /// Open the configured database scoped to the configured user
    pub fn new(config: Config) -> Result<Self> {
        let db = Database::new(&config.storage.database);
        let store = SqliteBranchStore::open(&db, &config.storage.user)?;
        info!(db = %db.path().display(), owner = store.owner(), "opened branch store");
        Self::with_store(Box::new(store), config)
    }

    pub fn with_store(store: Box<dyn BranchStore>, config: Config) -> Result<Self> {
        let bindings = Bindings::from_keymap(&config.keymap)?;
        let mut editor = EditorController::new();
        editor.mount(TextArea::new());

        Ok(Self {
            should_quit: false,
            state: AppState::new(),
            store,
            editor,
            config,
            bindings,
            cursor_position: 0,
            scroll_offset: 0,
            focus: Focus::Tree,
            menu_selection: 0,
            pending_delete: None,
            status_message: None,
            last_input_time: None,
            hit_areas: HitAreas::default(),
        })
    }

    /// Seed a small tree if the user has no main branches yet
    pub fn initialize_sample_data(&mut self) -> Result<()> {
        let repo = BranchRepository::new(self.store.as_ref());
        if !repo.list(Level::ROOT)?.is_empty() {
            return Ok(());
        }

        info!("seeding sample branches");
        let mut parent: Option<BranchId> = None;
        for (level, (title, body)) in Level::ALL.into_iter().zip(SAMPLE_CHAIN) {
            let draft = match parent {
                None => BranchDraft::root(title, sample_document(title, body)),
                Some(id) => BranchDraft::child(id, title, sample_document(title, body)),
            };
            parent = Some(repo.create(level, &draft)?.id);
        }
        let (title, body) = SAMPLE_SECOND_ROOT;
        repo.create(Level::ROOT, &BranchDraft::root(title, sample_document(title, body)))?;
        Ok(())
    }

    /// Reload every level from storage
    pub fn load(&mut self) {
        let repo = BranchRepository::new(self.store.as_ref());
        self.state.fetch_all(repo);
        self.clamp_cursor();
    }

    pub fn get_visible_nodes(&self) -> Vec<VisibleNode> {
        TreeController::render(&self.state)
    }

    pub fn selected_node(&self) -> Option<VisibleNode> {
        self.get_visible_nodes().into_iter().nth(self.cursor_position)
    }

    fn clamp_cursor(&mut self) {
        let last = self.get_visible_nodes().len().saturating_sub(1);
        self.cursor_position = self.cursor_position.min(last);
        self.scroll_offset = self.scroll_offset.min(self.cursor_position);
    }

    /// Keep the cursor row inside a viewport of `height` rows
    pub fn adjust_scroll(&mut self, height: usize) {
        if self.cursor_position < self.scroll_offset {
            self.scroll_offset = self.cursor_position;
        } else if height > 0 && self.cursor_position >= self.scroll_offset + height {
            self.scroll_offset = self.cursor_position + 1 - height;
        }
    }

    /// Move cursor up (saturating at 0)
    pub fn move_cursor_up(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            if self.cursor_position < self.scroll_offset {
                self.scroll_offset = self.cursor_position;
            }
        }
    }

    /// Move cursor down (saturating at last visible)
    pub fn move_cursor_down(&mut self) {
        let last = self.get_visible_nodes().len().saturating_sub(1);
        if self.cursor_position < last {
            self.cursor_position += 1;
        }
    }

    /// Expand, collapse or flip the selected branch
    pub fn toggle_selected_expand_collapse(&mut self, expand: Option<bool>) {
        let Some(node) = self.selected_node() else {
            return;
        };
        if !node.expandable || expand == Some(node.expanded) {
            return;
        }
        TreeController::toggle(&mut self.state, node.level, node.id);
        self.clamp_cursor();
    }

    /// Visible row under a screen position
    pub fn row_at(&self, position: Position) -> Option<usize> {
        let tree = self.hit_areas.tree;
        if !tree.contains(position) {
            return None;
        }
        let index = self.scroll_offset + (position.y - tree.y) as usize;
        (index < self.get_visible_nodes().len()).then_some(index)
    }

    /// Whether `column` falls on the expand marker of row `index`
    pub fn is_on_marker(&self, index: usize, column: u16) -> bool {
        let Some(node) = self.get_visible_nodes().into_iter().nth(index) else {
            return false;
        };
        let start = self.hit_areas.tree.x + node.depth as u16 * 2;
        node.expandable && column >= start && column < start + 2
    }

    // Context menu

    pub fn open_menu_for_selected(&mut self) {
        if let Some(node) = self.selected_node() {
            TreeController::context_menu(&mut self.state, node.level, node.id);
            self.menu_selection = 0;
        }
    }

    pub fn close_menu(&mut self) {
        TreeController::dismiss_menu(&mut self.state);
        self.hit_areas.menu = None;
    }

    pub fn menu_actions(&self) -> Vec<MenuAction> {
        self.state
            .ui
            .active_menu()
            .map(|target| TreeController::menu_actions(target.level))
            .unwrap_or_default()
    }

    pub fn menu_up(&mut self) {
        self.menu_selection = self.menu_selection.saturating_sub(1);
    }

    pub fn menu_down(&mut self) {
        let last = self.menu_actions().len().saturating_sub(1);
        if self.menu_selection < last {
            self.menu_selection += 1;
        }
    }

    pub fn menu_activate(&mut self) {
        match self.menu_actions().get(self.menu_selection) {
            Some(MenuAction::AddChild) => {
                let effect = TreeController::menu_add_child(&mut self.state);
                self.editor.apply(effect);
                self.focus = Focus::Title;
            }
            Some(MenuAction::Delete) => {
                self.pending_delete = TreeController::request_delete(&mut self.state);
            }
            None => self.close_menu(),
        }
        self.hit_areas.menu = None;
    }

    // Deletion

    pub fn confirm_delete(&mut self) {
        if let Some(pending) = self.pending_delete.take() {
            let title = pending.title.clone();
            let repo = BranchRepository::new(self.store.as_ref());
            if TreeController::confirm_delete(&mut self.state, repo, pending) {
                self.set_status(format!("Deleted \"{}\"", title));
            }
            self.clamp_cursor();
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    // Editor

    /// Load the selected branch into the editor
    pub fn edit_selected(&mut self) {
        let Some(node) = self.selected_node() else {
            return;
        };
        let repo = BranchRepository::new(self.store.as_ref());
        if let Some(effect) = TreeController::open_for_edit(&mut self.state, repo, node.level, node.id) {
            self.editor.apply(effect);
            self.focus = Focus::Title;
        }
    }

    pub fn add_main_branch(&mut self) {
        let effect = TreeController::add_main_branch(&mut self.state);
        self.editor.apply(effect);
        self.focus = Focus::Title;
    }

    /// Open the editor on a blank main branch form, even when it is already open
    pub fn open_editor(&mut self) {
        let effect = self.state.ui.open_editor();
        self.editor.apply(effect);
        self.focus = Focus::Title;
    }

    pub fn close_editor(&mut self) {
        let effect = self.state.ui.close_editor();
        self.editor.apply(effect);
        self.focus = Focus::Tree;
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        let repo = BranchRepository::new(self.store.as_ref());
        let outcome = self.editor.submit(&mut self.state, repo);
        match &outcome {
            SubmitOutcome::Created(branch) => {
                // Show the new child right away
                if let (Some(parent_id), Some(parent_level)) = (branch.parent_id, branch.level.parent()) {
                    let collapsed = self
                        .state
                        .tree
                        .find(parent_level, parent_id)
                        .is_some_and(|parent| !parent.is_expanded);
                    if collapsed {
                        TreeController::toggle(&mut self.state, parent_level, parent_id);
                    }
                }
                self.set_status(format!("Created \"{}\"", branch.title));
                self.focus = Focus::Title;
            }
            SubmitOutcome::Updated(branch) => {
                self.set_status(format!("Saved \"{}\"", branch.title));
                self.focus = Focus::Title;
            }
            SubmitOutcome::Rejected(message) | SubmitOutcome::Failed(message) => {
                self.set_status(message.clone());
            }
            SubmitOutcome::Busy | SubmitOutcome::Closed => {}
        }
        self.clamp_cursor();
        outcome
    }

    pub fn cycle_focus(&mut self) {
        self.focus = if !self.state.ui.is_open() {
            Focus::Tree
        } else {
            match self.focus {
                Focus::Tree => Focus::Title,
                Focus::Title => Focus::Content,
                Focus::Content => Focus::Tree,
            }
        };
    }

    pub fn input_char(&mut self, c: char) {
        match self.focus {
            Focus::Title => self.editor.title_mut().push(c),
            Focus::Content => {
                if let Some(area) = self.editor.widget_mut() {
                    area.insert_char(c);
                }
            }
            Focus::Tree => {}
        }
    }

    pub fn input_backspace(&mut self) {
        match self.focus {
            Focus::Title => {
                self.editor.title_mut().pop();
            }
            Focus::Content => {
                if let Some(area) = self.editor.widget_mut() {
                    area.backspace();
                }
            }
            Focus::Tree => {}
        }
    }

    /// Enter in the title moves on to the content; in the content it breaks the line
    pub fn input_enter(&mut self) {
        match self.focus {
            Focus::Title => self.focus = Focus::Content,
            Focus::Content => {
                if let Some(area) = self.editor.widget_mut() {
                    area.insert_newline();
                }
            }
            Focus::Tree => {}
        }
    }

    pub fn content_area_mut(&mut self) -> Option<&mut TextArea> {
        match self.focus {
            Focus::Content => self.editor.widget_mut(),
            _ => None,
        }
    }

    // Status

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    pub fn status(&self) -> Option<&str> {
        self.status_message.as_ref().map(|(message, _)| message.as_str())
    }

    pub fn dismiss_error(&mut self) {
        self.state.tree.clear_error();
        self.status_message = None;
    }

    /// Simple input debounce to avoid double-processing on some terminals
    pub fn should_accept_input(&mut self, min_interval_ms: u64) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_input_time {
            if now.duration_since(last).as_millis() < (min_interval_ms as u128) {
                return false;
            }
        }
        self.last_input_time = Some(now);
        true
    }

    /// Handle tick events
    pub fn tick(&mut self) {
        if self
            .status_message
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() >= STATUS_TTL)
        {
            self.status_message = None;
        }
    }

    /// Quit the application
    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn sample_document(title: &str, body: &str) -> String {
    format!(r#"<h1 class="branch-name" id="branch-name">{}</h1><p>{}</p>"#, title, body)
}
