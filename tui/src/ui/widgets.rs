use crate::app::{App, Focus};
use branchdoc_core::{controller::VisibleNode, models::Level, EditorMode};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use regex::Regex;
use std::sync::OnceLock;
use unicode_width::UnicodeWidthStr;

const ADD_MAIN_LABEL: &str = "+ Add New Main Branch";

/// Render the header with title and key hints
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(" 🌳 branchdoc · {} ", app.config.storage.user);

    let key_hints = if app.pending_delete.is_some() {
        " [y:Delete] [n/Esc:Keep] "
    } else if app.state.ui.active_menu().is_some() {
        " [↑/↓:Select] [Enter:Run] [Esc:Close] "
    } else if app.focus != Focus::Tree {
        " [Ctrl+S:Save] [Tab:Next field] [Esc:Tree] "
    } else {
        " [q:Quit] [↑/↓:Move] [←/→:Collapse/Expand] [Enter:Edit] [m:Menu] [a:Add main] [e/c:Open/Close editor] [r:Reload] "
    };

    let header_spans = vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(key_hints, Style::default().fg(Color::DarkGray)),
    ];

    let header = Paragraph::new(Line::from(header_spans))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);

    frame.render_widget(header, area);
}

/// Render the branch tree and record its clickable regions
pub fn render_tree(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = if app.state.tree.is_loading() {
        " Branches (loading…) "
    } else {
        " Branches "
    };
    let border = if app.focus == Focus::Tree { Color::Cyan } else { Color::Gray };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(border));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    let add_main = Rect { height: 1, ..inner };
    frame.render_widget(
        Paragraph::new(ADD_MAIN_LABEL).style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        add_main,
    );
    let rows = Rect {
        y: inner.y + 1,
        height: inner.height - 1,
        ..inner
    };
    app.hit_areas.add_main = add_main;
    app.hit_areas.tree = rows;

    let visible_nodes = app.get_visible_nodes();
    if visible_nodes.is_empty() {
        let empty_message = Paragraph::new("No branches yet. Press 'a' to add a main branch.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(empty_message, rows);
        return;
    }

    app.adjust_scroll(rows.height as usize);
    let lines: Vec<Line> = visible_nodes
        .iter()
        .enumerate()
        .skip(app.scroll_offset)
        .take(rows.height as usize)
        .map(|(i, node)| {
            let line = node_line(node);
            if i == app.cursor_position {
                line.style(Style::default().bg(Color::Blue).fg(Color::White))
            } else {
                line
            }
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), rows);
}

fn node_line(node: &VisibleNode) -> Line<'static> {
    let indent = "  ".repeat(node.depth);
    let marker = if !node.expandable {
        "• "
    } else if node.expanded {
        "▼ "
    } else {
        "▶ "
    };

    let title_style = if node.menu_open {
        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
    } else if node.editing {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let mut spans = vec![
        Span::raw(indent),
        Span::styled(marker, Style::default().fg(Color::Cyan)),
        Span::styled(node.title.clone(), title_style),
    ];
    if node.expandable && node.child_count > 0 {
        spans.push(Span::styled(
            format!(" ({})", node.child_count),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

/// Render the editor pane: title field, document markup and a plain-text preview
pub fn render_editor(frame: &mut Frame, app: &mut App, area: Rect) {
    let heading = match app.state.ui.mode() {
        EditorMode::Closed => {
            let hint = Paragraph::new("The editor is closed. Press 'e' to open it, or click a branch to edit it.")
                .block(Block::default().borders(Borders::ALL).title(" Editor "))
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true });
            frame.render_widget(hint, area);
            return;
        }
        EditorMode::AddRoot => " Add New Main Branch ".to_string(),
        EditorMode::AddChild { parent_id, level } => {
            let parent = level
                .parent()
                .and_then(|parent_level| app.state.tree.find(parent_level, *parent_id))
                .map(|p| p.title.clone())
                .unwrap_or_else(|| format!("#{}", parent_id));
            format!(" Add level {} branch under \"{}\" ", level, parent)
        }
        EditorMode::Editing { branch, level } => format!(" Edit \"{}\" (level {}) ", branch.title, level),
    };

    let block = Block::default().borders(Borders::ALL).title(heading);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(3),    // Content
            Constraint::Length(5), // Preview
            Constraint::Length(1), // Message
        ])
        .split(inner);
    app.hit_areas.title = chunks[0];
    app.hit_areas.content = chunks[1];

    let focused = |focus: Focus| {
        if app.focus == focus {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        }
    };

    let title = app.editor.title().to_string();
    let title_field = Paragraph::new(title.clone()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Title ")
            .border_style(focused(Focus::Title)),
    );
    frame.render_widget(title_field, chunks[0]);

    let (text, (row, col)) = app
        .editor
        .widget()
        .map(|area| (area.text().to_string(), area.cursor_position()))
        .unwrap_or_default();
    let content_height = chunks[1].height.saturating_sub(2) as usize;
    let scroll = row.saturating_sub(content_height.saturating_sub(1));
    let content_field = Paragraph::new(text.clone())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Content ")
                .border_style(focused(Focus::Content)),
        )
        .scroll((scroll as u16, 0));
    frame.render_widget(content_field, chunks[1]);

    let preview = Paragraph::new(html_to_text(&text))
        .block(Block::default().borders(Borders::ALL).title(" Preview "))
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(preview, chunks[2]);

    let message = if app.editor.is_submitting() {
        Line::from(Span::styled("Saving…", Style::default().fg(Color::Cyan)))
    } else if let Some(message) = app.editor.message() {
        Line::from(Span::styled(message.to_string(), Style::default().fg(Color::Red)))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(message), chunks[3]);

    match app.focus {
        Focus::Title => frame.set_cursor(chunks[0].x + 1 + title.width() as u16, chunks[0].y + 1),
        Focus::Content => frame.set_cursor(
            chunks[1].x + 1 + col as u16,
            chunks[1].y + 1 + (row - scroll) as u16,
        ),
        Focus::Tree => {}
    }
}

/// Render the context menu of the branch it is open on
pub fn render_context_menu(frame: &mut Frame, app: &mut App, size: Rect) {
    let actions = app.menu_actions();
    if actions.is_empty() {
        return;
    }

    let tree = app.hit_areas.tree;
    let anchor = app
        .get_visible_nodes()
        .iter()
        .position(|node| node.menu_open)
        .filter(|&i| i >= app.scroll_offset && i < app.scroll_offset + tree.height as usize)
        .map(|i| (i - app.scroll_offset) as u16);

    let width = 22u16;
    let height = actions.len() as u16 + 2;
    let x = (tree.x + 4).min(size.width.saturating_sub(width));
    let y = (tree.y + anchor.unwrap_or(0) + 1).min(size.height.saturating_sub(height));
    let popup_area = Rect::new(x, y, width.min(size.width), height.min(size.height));

    let items: Vec<ListItem> = actions.iter().map(|action| ListItem::new(action.label())).collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).style(Style::default().bg(Color::Black)))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White));
    let mut state = ListState::default();
    state.select(Some(app.menu_selection));

    frame.render_widget(Clear, popup_area);
    frame.render_stateful_widget(list, popup_area, &mut state);
    app.hit_areas.menu = Some(popup_area);
}

pub fn render_delete_confirmation(frame: &mut Frame, app: &App, area: Rect) {
    let Some(pending) = &app.pending_delete else {
        return;
    };
    let popup_width = 60.min(area.width);
    let popup_height = 6.min(area.height);

    let x = (area.width.saturating_sub(popup_width)) / 2;
    let y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(x, y, popup_width, popup_height);

    let mut lines = vec![Line::from(format!("Delete \"{}\"? (y/n)", pending.title))];
    if !pending.level.is_leaf() {
        lines.push(Line::from(Span::styled(
            "Its sub-branches are kept but no longer shown.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Confirm Deletion")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Yellow)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, popup_area); // This clears the area behind the popup
    frame.render_widget(paragraph, popup_area);
}

/// Render the status bar at the bottom
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let tree = &app.state.tree;
    let (text, style) = if let Some(error) = tree.error() {
        (
            format!(" ⚠ {} [Esc: dismiss] ", error),
            Style::default().bg(Color::Red).fg(Color::White),
        )
    } else if let Some(status) = app.status() {
        (format!(" {} ", status), Style::default().bg(Color::DarkGray).fg(Color::White))
    } else {
        let counts: Vec<String> = Level::ALL
            .iter()
            .map(|&level| match tree.level_error(level) {
                Some(_) => format!("L{}: !", level),
                None => format!("L{}: {}", level, tree.collection(level).len()),
            })
            .collect();
        (
            format!(" {} visible | {} ", app.get_visible_nodes().len(), counts.join(" ")),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        )
    };

    let status_bar = Paragraph::new(text).style(style).alignment(Alignment::Center);
    frame.render_widget(status_bar, area);
}

/// Strip the document markup down to readable text
pub fn html_to_text(html: &str) -> String {
    static BLOCK_END: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    let block_end = BLOCK_END.get_or_init(|| {
        Regex::new(r"(?i)</(h[1-6]|p|div|li)>|<br\s*/?>").expect("block end pattern is valid")
    });
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

    let text = block_end.replace_all(html, "\n");
    let text = tag.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
