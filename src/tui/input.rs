//! Single-line text input used by the join form and the chat compose box.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// Editable line of text with a char-indexed cursor.
#[derive(Debug, Default, Clone)]
pub struct TextInput {
    value: String,
    /// Cursor position in chars, not bytes.
    cursor: usize,
}

impl TextInput {
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self { value, cursor }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let end = self.byte_index(self.cursor);
        let start = self.byte_index(self.cursor - 1);
        self.value.drain(start..end);
        self.cursor -= 1;
    }

    pub fn delete(&mut self) {
        if self.cursor >= self.value.chars().count() {
            return;
        }
        let start = self.byte_index(self.cursor);
        let end = self.byte_index(self.cursor + 1);
        self.value.drain(start..end);
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Take the text out, leaving the input empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.value)
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    /// The slice of text that fits in `width` columns with the cursor in view,
    /// and the cursor's column offset within it.
    pub fn window(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }
        let chars: Vec<char> = self.value.chars().collect();
        let col = |c: &char| c.width().unwrap_or(0);

        // Scroll so the cursor column is the last visible one at most.
        let mut start = 0;
        let mut cursor_col: usize = chars[..self.cursor].iter().map(col).sum();
        while cursor_col >= width && start < self.cursor {
            cursor_col -= col(&chars[start]);
            start += 1;
        }

        let mut visible = String::new();
        let mut used = 0;
        for c in &chars[start..] {
            let w = col(c);
            if used + w > width {
                break;
            }
            used += w;
            visible.push(*c);
        }
        (visible, cursor_col)
    }
}

/// Draw a bordered input box and place the terminal cursor when focused.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    input: &TextInput,
    title: &str,
    placeholder: &str,
    focused: bool,
) {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Yellow), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Plain)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(Span::styled(format!(" {} ", title), border_style));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width < 2 || inner.height == 0 {
        return;
    }

    let avail = inner.width as usize - 1;
    let line = if input.is_empty() {
        Line::from(Span::styled(
            format!(" {}", placeholder),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let (visible, _) = input.window(avail);
        Line::from(Span::styled(
            format!(" {}", visible),
            Style::default().fg(Color::White),
        ))
    };
    frame.render_widget(Paragraph::new(line), inner);

    if focused {
        let (_, cursor) = input.window(avail);
        frame.set_cursor_position((inner.x + 1 + cursor as u16, inner.y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editing_multibyte() {
        let mut input = TextInput::default();
        for c in "héllo".chars() {
            input.insert(c);
        }
        input.left();
        input.left();
        input.backspace();
        assert_eq!(input.value(), "hélo");
        input.home();
        input.delete();
        assert_eq!(input.value(), "élo");
        input.end();
        input.insert('!');
        assert_eq!(input.value(), "élo!");
    }

    #[test]
    fn test_take_clears() {
        let mut input = TextInput::with_value("Amen");
        assert_eq!(input.take(), "Amen");
        assert!(input.is_empty());
        input.insert('a');
        assert_eq!(input.value(), "a");
    }

    #[test]
    fn test_cursor_bounds() {
        let mut input = TextInput::default();
        input.backspace();
        input.delete();
        input.left();
        assert_eq!(input.window(10), (String::new(), 0));
        input.insert('x');
        input.right();
        input.right();
        assert_eq!(input.window(10), ("x".to_string(), 1));
    }

    #[test]
    fn test_window_scrolls_to_cursor() {
        let input = TextInput::with_value("abcdefghij");
        let (visible, cursor) = input.window(4);
        assert_eq!(cursor, 3);
        assert_eq!(visible, "hij");

        let mut input = input;
        input.home();
        assert_eq!(input.window(4), ("abcd".to_string(), 0));
    }
}
