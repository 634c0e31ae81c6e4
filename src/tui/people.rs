//! People panel: who is in the call, and the waiting room for the host.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::room::MeetingSession;

/// Render the panel. `selected` indexes the selectable rows: waiting entries
/// (host only) followed by remote participants.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    session: &MeetingSession,
    selected: usize,
    focused: bool,
) {
    let roster = session.roster();
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style)
        .title(Span::styled(
            format!(" People ({}) ", roster.len()),
            Style::default().fg(Color::White),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    let highlight = |row: usize| -> Style {
        if focused && row == selected {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        }
    };

    let mut lines = Vec::new();
    let mut row = 0;
    let mut selected_line = 0;

    if roster.local_is_host() && roster.waiting().len() > 0 {
        lines.push(Line::from(Span::styled(
            format!(" Waiting room ({})", roster.waiting().len()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        for entry in roster.waiting() {
            if row == selected {
                selected_line = lines.len();
            }
            lines.push(
                Line::from(vec![
                    Span::raw(format!(" ⏳ {}", entry.name)),
                    Span::styled(
                        format!("  {}", entry.arrived_at.format("%H:%M")),
                        Style::default().fg(Color::Gray),
                    ),
                    Span::styled("  a:admit d:deny", Style::default().fg(Color::DarkGray)),
                ])
                .style(highlight(row)),
            );
            row += 1;
        }
    }

    let local = roster.local();
    lines.push(Line::from(vec![
        Span::styled(
            format!(" {} (You)", local.name),
            Style::default().fg(Color::Cyan),
        ),
        host_badge(local.is_host),
        mute_badge(!session.mic_on()),
    ]));

    for p in roster.remote_participants() {
        if row == selected {
            selected_line = lines.len();
        }
        lines.push(
            Line::from(vec![
                Span::raw(format!(" {}", p.name)),
                host_badge(p.is_host),
                mute_badge(p.muted),
            ])
            .style(highlight(row)),
        );
        row += 1;
    }

    let scroll = (selected_line + 1).saturating_sub(inner.height as usize);
    Paragraph::new(lines)
        .scroll((scroll as u16, 0))
        .render(inner, buf);
}

fn host_badge(is_host: bool) -> Span<'static> {
    if is_host {
        Span::styled(" ★", Style::default().fg(Color::Yellow))
    } else {
        Span::raw("")
    }
}

fn mute_badge(muted: bool) -> Span<'static> {
    if muted {
        Span::styled(" 🔇", Style::default().fg(Color::Red))
    } else {
        Span::raw("")
    }
}
