use crate::app::{App, Focus};
use anyhow::Result;
use crossterm::event::{
    self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::Position;
use std::time::Duration;

/// Clicks closer together than this are treated as one
const CLICK_INTERVAL_MS: u64 = 40;

/// Terminal events
#[derive(Debug, Clone, Copy)]
pub enum Event {
    /// Key press event
    Key(KeyEvent),
    /// Terminal tick event
    Tick,
    /// Mouse event
    Mouse(MouseEvent),
}

/// Event handler for the terminal
pub struct EventHandler {
    /// Tick rate in milliseconds
    tick_rate: Duration,
}

impl EventHandler {
    /// Create a new event handler
    pub fn new(tick_rate_ms: u64) -> Self {
        Self {
            tick_rate: Duration::from_millis(tick_rate_ms),
        }
    }

    /// Poll for the next event
    pub fn next(&self) -> Result<Event> {
        if event::poll(self.tick_rate)? {
            match event::read()? {
                CEvent::Key(key) => return Ok(Event::Key(key)),
                CEvent::Mouse(m) => return Ok(Event::Mouse(m)),
                _ => {}
            }
        }
        Ok(Event::Tick)
    }
}

/// Handle key events for the application
pub fn handle_key_event(key: KeyEvent, app: &mut App) {
    // On Windows, crossterm reports both key press and release events.
    if key.kind != KeyEventKind::Press {
        return;
    }

    if app.pending_delete.is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.confirm_delete(),
            KeyCode::Char('n') | KeyCode::Esc => app.cancel_delete(),
            _ => {}
        }
        return;
    }

    if app.state.ui.active_menu().is_some() {
        match key.code {
            KeyCode::Up => app.menu_up(),
            KeyCode::Down => app.menu_down(),
            KeyCode::Enter => app.menu_activate(),
            _ => app.close_menu(),
        }
        return;
    }

    if app.bindings.submit.matches(&key) {
        let _ = app.submit();
        return;
    }

    match app.focus {
        Focus::Tree => handle_tree_input(key, app),
        Focus::Title | Focus::Content => handle_editing_input(key, app),
    }
}

fn handle_tree_input(key: KeyEvent, app: &mut App) {
    let bindings = app.bindings.clone();
    if bindings.quit.matches(&key) {
        app.quit();
    } else if bindings.open_menu.matches(&key) {
        app.open_menu_for_selected();
    } else if bindings.add_main_branch.matches(&key) {
        app.add_main_branch();
    } else if bindings.open_editor.matches(&key) {
        app.open_editor();
    } else if bindings.close_editor.matches(&key) {
        app.close_editor();
    } else if bindings.toggle_expand.matches(&key) {
        app.toggle_selected_expand_collapse(None);
    } else if bindings.edit.matches(&key) {
        app.edit_selected();
    } else if bindings.reload.matches(&key) {
        app.load();
    } else if bindings.focus_next.matches(&key) {
        app.cycle_focus();
    } else {
        match key.code {
            KeyCode::Up => app.move_cursor_up(),
            KeyCode::Down => app.move_cursor_down(),
            KeyCode::Left => app.toggle_selected_expand_collapse(Some(false)),
            KeyCode::Right => app.toggle_selected_expand_collapse(Some(true)),
            KeyCode::Esc => app.dismiss_error(),
            _ => {}
        }
    }
}

/// Handle key events while the title or content field has focus
fn handle_editing_input(key: KeyEvent, app: &mut App) {
    if app.bindings.focus_next.matches(&key) {
        app.cycle_focus();
        return;
    }
    match key.code {
        KeyCode::Esc => app.focus = Focus::Tree,
        KeyCode::Enter => app.input_enter(),
        KeyCode::Backspace => app.input_backspace(),
        KeyCode::Delete => {
            if let Some(area) = app.content_area_mut() {
                area.delete();
            }
        }
        KeyCode::Left => {
            if let Some(area) = app.content_area_mut() {
                area.move_left();
            }
        }
        KeyCode::Right => {
            if let Some(area) = app.content_area_mut() {
                area.move_right();
            }
        }
        KeyCode::Home => {
            if let Some(area) = app.content_area_mut() {
                area.move_home();
            }
        }
        KeyCode::End => {
            if let Some(area) = app.content_area_mut() {
                area.move_end();
            }
        }
        KeyCode::Char(c) => {
            // Allow AltGr combinations (CONTROL+ALT) for special characters
            if !key.modifiers.contains(KeyModifiers::CONTROL) || key.modifiers.contains(KeyModifiers::ALT) {
                app.input_char(c);
            }
        }
        _ => {}
    }
}

/// Handle mouse events against the regions recorded by the last render
pub fn handle_mouse_event(mouse: MouseEvent, app: &mut App) {
    let position = Position::new(mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(button) => {
            if app.pending_delete.is_some() || !app.should_accept_input(CLICK_INTERVAL_MS) {
                return;
            }

            if let Some(menu) = app.hit_areas.menu {
                if menu.contains(position) {
                    // entries start below the border
                    let entry = mouse.row.saturating_sub(menu.y + 1) as usize;
                    if button == MouseButton::Left && mouse.row > menu.y && entry < app.menu_actions().len() {
                        app.menu_selection = entry;
                        app.menu_activate();
                    }
                    return;
                }
            }
            app.close_menu();

            if button == MouseButton::Left && app.hit_areas.add_main.contains(position) {
                app.add_main_branch();
                return;
            }

            if let Some(index) = app.row_at(position) {
                app.cursor_position = index;
                match button {
                    MouseButton::Right => app.open_menu_for_selected(),
                    MouseButton::Left if app.is_on_marker(index, mouse.column) => {
                        app.toggle_selected_expand_collapse(None)
                    }
                    MouseButton::Left => app.edit_selected(),
                    MouseButton::Middle => {}
                }
                return;
            }

            if button == MouseButton::Left && app.state.ui.is_open() {
                if app.hit_areas.title.contains(position) {
                    app.focus = Focus::Title;
                } else if app.hit_areas.content.contains(position) {
                    app.focus = Focus::Content;
                }
            }
        }
        MouseEventKind::ScrollUp => app.move_cursor_up(),
        MouseEventKind::ScrollDown => app.move_cursor_down(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use branchdoc_core::EditorMode;
    use ratatui::layout::Rect;
    use tempfile::{tempdir, TempDir};

    fn app() -> (TempDir, App) {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database = dir.path().join("test.db");
        let mut app = App::new(config).unwrap();
        app.initialize_sample_data().unwrap();
        app.load();
        app.hit_areas.add_main = Rect::new(1, 4, 30, 1);
        app.hit_areas.tree = Rect::new(1, 5, 30, 10);
        (dir, app)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_key_event(KeyEvent::new(code, KeyModifiers::NONE), app);
    }

    fn click(app: &mut App, button: MouseButton, column: u16, row: u16) {
        app.last_input_time = None;
        handle_mouse_event(
            MouseEvent {
                kind: MouseEventKind::Down(button),
                column,
                row,
                modifiers: KeyModifiers::NONE,
            },
            app,
        );
    }

    #[test]
    fn test_event_handler_creation() {
        let handler = EventHandler::new(250);
        assert_eq!(handler.tick_rate, Duration::from_millis(250));
    }

    #[test]
    fn test_quit_key() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_typing_in_title_does_not_trigger_bindings() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.focus, Focus::Title);

        for c in "quick".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        assert!(!app.should_quit);
        assert_eq!(app.editor.title(), "quick");
    }

    #[test]
    fn test_ctrl_s_submits() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('a'));
        for c in "Roadmap".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        handle_key_event(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL), &mut app);

        assert_eq!(app.state.tree.roots().len(), 3);
    }

    #[test]
    fn test_menu_closes_on_other_key() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('m'));
        assert!(app.state.ui.active_menu().is_some());

        press(&mut app, KeyCode::Char('x'));
        assert!(app.state.ui.active_menu().is_none());
        assert_eq!(app.state.tree.menu_pending().count(), 0);
    }

    #[test]
    fn test_right_click_opens_menu_and_outside_click_dismisses() {
        let (_dir, mut app) = app();
        click(&mut app, MouseButton::Right, 10, 6);
        assert_eq!(app.cursor_position, 1);
        let target = app.state.ui.active_menu().unwrap();
        assert_eq!(target.branch_id, app.get_visible_nodes()[1].id);

        click(&mut app, MouseButton::Left, 60, 20);
        assert!(app.state.ui.active_menu().is_none());
    }

    #[test]
    fn test_left_click_on_title_edits() {
        let (_dir, mut app) = app();
        click(&mut app, MouseButton::Left, 10, 5);

        assert!(matches!(app.state.ui.mode(), EditorMode::Editing { .. }));
        assert_eq!(app.editor.title(), app.get_visible_nodes()[0].title);
    }

    #[test]
    fn test_left_click_on_marker_toggles() {
        let (_dir, mut app) = app();
        let before = app.get_visible_nodes().len();
        click(&mut app, MouseButton::Left, 1, 6);

        assert!(app.get_visible_nodes().len() > before);
        assert!(!app.state.ui.is_open());
    }

    #[test]
    fn test_click_add_main_branch() {
        let (_dir, mut app) = app();
        click(&mut app, MouseButton::Left, 5, 4);
        assert_eq!(app.state.ui.mode(), &EditorMode::AddRoot);
    }

    #[test]
    fn test_delete_confirmation_keys() {
        let (_dir, mut app) = app();
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert!(app.pending_delete.is_some());

        press(&mut app, KeyCode::Char('n'));
        assert!(app.pending_delete.is_none());
        assert_eq!(app.state.tree.roots().len(), 2);
    }
}
