use crate::models::{validate_title, Branch, BranchDraft, Level};
use crate::state::AppState;
use crate::storage::BranchRepository;
use crate::ui_state::{EditorMode, WidgetEffect};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Document a blank editor starts from
pub const EMPTY_DOCUMENT: &str = r#"<h1 class="branch-name" id="branch-name"></h1>"#;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// The rich-text editing surface. Its internals are never inspected.
pub trait RichTextWidget {
    fn set_content(&mut self, html: &str);
    fn content(&self) -> String;
    /// Release the widget; it is not used again afterwards
    fn destroy(&mut self);
}

/// Result of a submit
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(Branch),
    Updated(Branch),
    /// Title failed validation; storage was not called
    Rejected(String),
    /// Storage call failed; the form is kept for a retry
    Failed(String),
    /// A submit is already running or was just issued
    Busy,
    /// The editor is closed, there is nothing to submit
    Closed,
}

/// Owns the rich-text widget handle and the title field, and turns a
/// submit into tree mutations according to the editor mode.
pub struct EditorController<W: RichTextWidget> {
    widget: Option<W>,
    title: String,
    message: Option<String>,
    in_flight: bool,
    last_submit: Option<Instant>,
    debounce: Duration,
}

impl<W: RichTextWidget> Default for EditorController<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: RichTextWidget> EditorController<W> {
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    /// Minimum spacing between two accepted submits
    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            widget: None,
            title: String::new(),
            message: None,
            in_flight: false,
            last_submit: None,
            debounce,
        }
    }

    /// Attach the widget. It starts on the blank template.
    pub fn mount(&mut self, mut widget: W) {
        widget.set_content(EMPTY_DOCUMENT);
        self.widget = Some(widget);
    }

    /// Detach and destroy the widget
    pub fn unmount(&mut self) {
        if let Some(mut widget) = self.widget.take() {
            widget.destroy();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.widget.is_some()
    }

    pub fn widget(&self) -> Option<&W> {
        self.widget.as_ref()
    }

    pub fn widget_mut(&mut self) -> Option<&mut W> {
        self.widget.as_mut()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn title_mut(&mut self) -> &mut String {
        &mut self.title
    }

    /// Inline validation or failure message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight
    }

    /// Reflect a mode transition into the widget and title field
    pub fn apply(&mut self, effect: WidgetEffect) {
        match effect {
            WidgetEffect::Reset => {
                self.title.clear();
                self.message = None;
                if let Some(widget) = self.widget.as_mut() {
                    widget.set_content(EMPTY_DOCUMENT);
                }
            }
            WidgetEffect::Load { title, content } => {
                self.title = title;
                self.message = None;
                if let Some(widget) = self.widget.as_mut() {
                    widget.set_content(&content);
                }
            }
            WidgetEffect::Unchanged => {}
        }
    }

    /// Validate the form and write it according to the current mode
    pub fn submit(&mut self, state: &mut AppState, repo: BranchRepository<'_>) -> SubmitOutcome {
        if !state.ui.is_open() {
            return SubmitOutcome::Closed;
        }
        let now = Instant::now();
        let too_soon = self
            .last_submit
            .is_some_and(|last| now.duration_since(last) < self.debounce);
        if self.in_flight || too_soon {
            return SubmitOutcome::Busy;
        }

        let title = match validate_title(&self.title) {
            Ok(title) => title.to_string(),
            Err(err) => {
                warn!(error = %err, "submit rejected");
                let message = err.to_string();
                self.message = Some(message.clone());
                return SubmitOutcome::Rejected(message);
            }
        };
        let content = self.widget.as_ref().map(|w| w.content()).unwrap_or_default();

        self.in_flight = true;
        self.last_submit = Some(now);
        let outcome = self.write(state, repo, title, content);
        self.in_flight = false;
        outcome
    }

    fn write(&mut self, state: &mut AppState, repo: BranchRepository<'_>, title: String, content: String) -> SubmitOutcome {
        match state.ui.mode().clone() {
            EditorMode::Closed => SubmitOutcome::Closed,
            EditorMode::Editing { branch, level } => {
                let edited = Branch { title, content, ..branch };
                match state.tree.apply_update(repo, level, &edited) {
                    Some(saved) => {
                        info!(%level, id = %saved.id, "branch saved from editor");
                        state.fetch_level(repo, level);
                        // The editor stays open, ready for a new root branch
                        let effect = state.ui.reset_to_add_root();
                        self.apply(effect);
                        SubmitOutcome::Updated(saved)
                    }
                    None => self.failed(state),
                }
            }
            EditorMode::AddRoot => {
                let draft = BranchDraft::root(title, content);
                self.create(state, repo, Level::ROOT, &draft)
            }
            EditorMode::AddChild { parent_id, level } => {
                let draft = BranchDraft::child(parent_id, title, content);
                self.create(state, repo, level, &draft)
            }
        }
    }

    fn create(&mut self, state: &mut AppState, repo: BranchRepository<'_>, level: Level, draft: &BranchDraft) -> SubmitOutcome {
        match state.tree.add(repo, level, draft) {
            Some(created) => {
                state.fetch_level(repo, level);
                self.apply(WidgetEffect::Reset);
                SubmitOutcome::Created(created)
            }
            None => self.failed(state),
        }
    }

    fn failed(&mut self, state: &AppState) -> SubmitOutcome {
        let message = state.tree.error().unwrap_or("Saving the branch failed").to_string();
        self.message = Some(message.clone());
        SubmitOutcome::Failed(message)
    }
}

impl<W: RichTextWidget> Drop for EditorController<W> {
    fn drop(&mut self) {
        self.unmount();
    }
}
