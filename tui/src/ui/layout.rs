use crate::app::{App, HitAreas};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use super::{render_context_menu, render_delete_confirmation, render_editor, render_header, render_status_bar, render_tree};

/// Render the complete UI
pub fn render(frame: &mut Frame, app: &mut App) {
    app.hit_areas = HitAreas::default();
    let size = frame.size();

    // Create main layout: header, content, status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40), // Tree
            Constraint::Percentage(60), // Editor
        ])
        .split(chunks[1]);

    render_header(frame, app, chunks[0]);
    render_tree(frame, app, content[0]);
    render_editor(frame, app, content[1]);
    render_status_bar(frame, app, chunks[2]);

    // Overlays (drawn last)
    if app.state.ui.active_menu().is_some() {
        render_context_menu(frame, app, size);
    }
    if app.pending_delete.is_some() {
        render_delete_confirmation(frame, app, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use ratatui::{backend::TestBackend, Terminal};
    use tempfile::tempdir;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_render_records_hit_areas() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database = dir.path().join("test.db");
        let mut app = App::new(config).unwrap();
        app.initialize_sample_data().unwrap();
        app.load();

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Add New Main Branch"));
        assert!(text.contains("Getting Started"));
        assert!(app.hit_areas.tree.height > 0);
        assert!(app.hit_areas.menu.is_none());
    }

    #[test]
    fn test_render_menu_and_confirmation() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database = dir.path().join("test.db");
        let mut app = App::new(config).unwrap();
        app.initialize_sample_data().unwrap();
        app.load();
        app.open_menu_for_selected();

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        assert!(screen_text(&terminal).contains("Delete Branch"));
        assert!(app.hit_areas.menu.is_some());

        app.menu_down();
        app.menu_activate();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        assert!(screen_text(&terminal).contains("Confirm Deletion"));
    }
}
