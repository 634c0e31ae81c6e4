//! Toggleable pane showing captured log output.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::log_capture::LogBuffer;

/// History kept for scrolling, independent of the capture ring's size.
const HISTORY_LINES: usize = 1000;

/// Height of the pane when shown.
pub const LOG_PANE_HEIGHT: u16 = 8;

pub struct LogPane {
    source: LogBuffer,
    history: Vec<String>,
    pub visible: bool,
    /// Lines scrolled back from the newest; 0 follows the tail.
    back: usize,
}

impl LogPane {
    pub fn new(source: LogBuffer) -> Self {
        Self {
            source,
            history: Vec::new(),
            visible: false,
            back: 0,
        }
    }

    /// Pull new lines from the capture buffer. Call once per loop iteration.
    pub fn refresh(&mut self) {
        let fresh = self.source.drain();
        if fresh.is_empty() {
            return;
        }
        if self.back > 0 {
            self.back += fresh.len();
        }
        self.history.extend(fresh);
        if self.history.len() > HISTORY_LINES {
            let excess = self.history.len() - HISTORY_LINES;
            self.history.drain(..excess);
        }
        self.back = self.back.min(self.history.len().saturating_sub(1));
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        self.back = 0;
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.back = (self.back + n).min(self.history.len().saturating_sub(1));
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.back = self.back.saturating_sub(n);
    }

    /// The most recent line, for the status bar.
    pub fn last_line(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }
}

pub fn render(area: Rect, buf: &mut Buffer, pane: &LogPane) {
    let dropped = pane.source.overflowed();
    let mut title = if pane.back > 0 {
        format!(" Log (-{}) ", pane.back)
    } else {
        " Log ".to_string()
    };
    if dropped > 0 {
        title.push_str(&format!("[{} dropped] ", dropped));
    }
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);
    if inner.height == 0 {
        return;
    }

    let end = pane.history.len().saturating_sub(pane.back);
    let start = end.saturating_sub(inner.height as usize);
    let lines: Vec<Line> = pane.history[start..end]
        .iter()
        .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(level_color(l)))))
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

/// Colour for a fmt-layer line, keyed on its level field.
fn level_color(line: &str) -> Color {
    let level = line
        .split_whitespace()
        .find(|w| matches!(*w, "ERROR" | "WARN" | "INFO" | "DEBUG" | "TRACE"));
    match level {
        Some("ERROR") => Color::Red,
        Some("WARN") => Color::Yellow,
        Some("INFO") => Color::Green,
        Some(_) => Color::DarkGray,
        None => Color::White,
    }
}
