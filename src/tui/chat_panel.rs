//! Chat panel: message list with reaction summaries and the compose box.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::models::ChatMessage;
use crate::room::chat::{ChatLog, QUICK_REACTIONS};
use crate::room::MeetingSession;

use super::input::{self, TextInput};

const COMPOSE_HEIGHT: u16 = 3;

pub fn render(
    area: Rect,
    frame: &mut Frame,
    session: &MeetingSession,
    compose: &TextInput,
    selected: Option<usize>,
    focused: bool,
) {
    let [list_area, compose_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(COMPOSE_HEIGHT)]).areas(area);

    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let chat = session.chat();
    let title = if selected.is_some() {
        " Chat · 1-5 react ".to_string()
    } else {
        format!(" Chat ({}) ", chat.len())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style)
        .title(Span::styled(title, Style::default().fg(Color::White)));
    let inner = block.inner(list_area);
    frame.render_widget(block, list_area);

    if chat.is_empty() {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                " No messages yet. Say hello!",
                Style::default().fg(Color::DarkGray),
            ))),
            inner,
        );
    } else {
        let viewer = &session.roster().local().name;
        let width = inner.width.saturating_sub(1) as usize;
        let mut lines = Vec::new();
        let mut ranges = Vec::with_capacity(chat.len());
        for (i, msg) in chat.messages().iter().enumerate() {
            let start = lines.len();
            message_lines(&mut lines, chat, msg, viewer, width, selected == Some(i));
            ranges.push((start, lines.len()));
        }
        let scroll = scroll_for(selected, &ranges, inner.height as usize, lines.len());
        frame.render_widget(Paragraph::new(lines).scroll((scroll as u16, 0)), inner);
    }

    input::render(
        frame,
        compose_area,
        compose,
        "Message",
        "Type a message…",
        focused && selected.is_none(),
    );
}

fn message_lines(
    lines: &mut Vec<Line<'static>>,
    chat: &ChatLog,
    msg: &ChatMessage,
    viewer: &str,
    width: usize,
    is_selected: bool,
) {
    let marker = if is_selected {
        Span::styled("▌", Style::default().fg(Color::Yellow))
    } else {
        Span::raw(" ")
    };
    let author_style = if msg.author == viewer {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };

    lines.push(Line::from(vec![
        marker.clone(),
        Span::styled(msg.author.clone(), author_style),
        Span::styled(
            format!("  {}", msg.sent_at.format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    for text in wrap_text(&msg.text, width) {
        lines.push(Line::from(vec![marker.clone(), Span::raw(text)]));
    }

    let summary = chat.reaction_summary(&msg.id, viewer);
    if !summary.is_empty() {
        let mut spans = vec![marker.clone()];
        for r in summary {
            let style = if r.mine {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default().fg(Color::Yellow)
            };
            spans.push(Span::styled(format!("{} {}", r.emoji, r.count), style));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }
    if is_selected {
        let mut spans = vec![marker];
        for (i, emoji) in QUICK_REACTIONS.iter().enumerate() {
            spans.push(Span::styled(
                format!("{}{} ", i + 1, emoji),
                Style::default().fg(Color::DarkGray),
            ));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(""));
}

/// Word-wrap by display width. Newlines are kept; a word wider than the line
/// gets a line of its own.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.width() + 1 + word.width() <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    result
}

/// Scroll offset: follow the tail, or keep the selected message in view.
fn scroll_for(
    selected: Option<usize>,
    ranges: &[(usize, usize)],
    visible_height: usize,
    total_lines: usize,
) -> usize {
    let max_scroll = total_lines.saturating_sub(visible_height);
    let Some((start, end)) = selected.and_then(|i| ranges.get(i).copied()) else {
        return max_scroll;
    };
    if end - start >= visible_height {
        start
    } else {
        end.saturating_sub(visible_height).min(max_scroll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_by_width() {
        assert_eq!(wrap_text("short", 10), vec!["short"]);
        assert_eq!(
            wrap_text("praise the lord all ye nations", 12),
            vec!["praise the", "lord all ye", "nations"]
        );
        assert_eq!(wrap_text("one\ntwo", 10), vec!["one", "two"]);
        assert!(wrap_text("anything", 0).is_empty());
    }

    #[test]
    fn test_wrap_counts_wide_chars() {
        // Each emoji is two columns wide.
        let lines = wrap_text("🙏🙏 🙏🙏 🙏🙏", 9);
        assert_eq!(lines, vec!["🙏🙏 🙏🙏", "🙏🙏"]);
    }

    #[test]
    fn test_scroll_follows_tail_without_selection() {
        let ranges = [(0, 4), (4, 8), (8, 12)];
        assert_eq!(scroll_for(None, &ranges, 5, 12), 7);
        assert_eq!(scroll_for(None, &ranges, 20, 12), 0);
    }

    #[test]
    fn test_scroll_keeps_selection_visible() {
        let ranges = [(0, 4), (4, 8), (8, 12)];
        assert_eq!(scroll_for(Some(0), &ranges, 5, 12), 0);
        assert_eq!(scroll_for(Some(1), &ranges, 5, 12), 3);
        assert_eq!(scroll_for(Some(2), &ranges, 5, 12), 7);
        // Taller than the viewport: show its start.
        assert_eq!(scroll_for(Some(1), &ranges, 3, 12), 4);
    }
}
