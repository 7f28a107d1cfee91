use branchdoc_core::controller::RichTextWidget;
use unicode_width::UnicodeWidthStr;

/// Multi-line text buffer holding the branch document markup
#[derive(Debug, Default, Clone)]
pub struct TextArea {
    text: String,
    /// Cursor as a char index into `text`
    cursor: usize,
    destroyed: bool,
}

impl TextArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .map(|(i, _)| i)
            .nth(char_index)
            .unwrap_or(self.text.len())
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let from = self.byte_index(self.cursor - 1);
        self.text.remove(from);
        self.cursor -= 1;
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let at = self.byte_index(self.cursor);
            self.text.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.char_count() {
            self.cursor += 1;
        }
    }

    /// Start of the current line
    pub fn move_home(&mut self) {
        let before: Vec<char> = self.text.chars().take(self.cursor).collect();
        let line_start = before.iter().rposition(|&c| c == '\n').map_or(0, |i| i + 1);
        self.cursor = line_start;
    }

    /// End of the current line
    pub fn move_end(&mut self) {
        let rest = self.text.chars().skip(self.cursor).take_while(|&c| c != '\n').count();
        self.cursor += rest;
    }

    /// Row and display column of the cursor
    pub fn cursor_position(&self) -> (usize, usize) {
        let before = &self.text[..self.byte_index(self.cursor)];
        let row = before.matches('\n').count();
        let line = before.rsplit('\n').next().unwrap_or("");
        (row, line.width())
    }
}

impl RichTextWidget for TextArea {
    fn set_content(&mut self, html: &str) {
        self.text = html.to_string();
        self.cursor = self.char_count();
    }

    fn content(&self) -> String {
        self.text.clone()
    }

    fn destroy(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(text: &str) -> TextArea {
        let mut area = TextArea::new();
        area.set_content(text);
        area
    }

    #[test]
    fn test_set_content_moves_cursor_to_end() {
        let area = area("<p>hi</p>");
        assert_eq!(area.cursor(), 9);
        assert_eq!(area.content(), "<p>hi</p>");
    }

    #[test]
    fn test_insert_and_backspace_multibyte() {
        let mut area = area("añb");
        area.move_left();
        area.backspace();
        assert_eq!(area.text(), "ab");
        area.insert_char('é');
        assert_eq!(area.text(), "aéb");
        assert_eq!(area.cursor(), 2);
    }

    #[test]
    fn test_home_end_are_line_based() {
        let mut area = area("first\nsecond");
        area.move_home();
        assert_eq!(area.cursor(), 6);
        assert_eq!(area.cursor_position(), (1, 0));

        area.move_end();
        assert_eq!(area.cursor_position(), (1, 6));
    }

    #[test]
    fn test_delete_at_end_is_noop() {
        let mut area = area("abc");
        area.delete();
        assert_eq!(area.text(), "abc");
    }

    #[test]
    fn test_destroy_clears_buffer() {
        let mut area = area("<p>x</p>");
        area.destroy();
        assert!(area.is_destroyed());
        assert!(area.text().is_empty());
    }
}
