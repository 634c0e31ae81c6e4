//! Stage widget: the participant grid, or the shared screen with the
//! self-view overlay while presenting.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget},
};

use crate::models::LiveParticipant;
use crate::room::layout::{grid_layout, ViewportClass};
use crate::room::{LocalMedia, LocalPreview, MeetingSession, ScreenShare};

use super::app::PX_PER_COL;

/// Corner glyph marking the PiP drag handle.
pub const PIP_HANDLE: &str = "◤";

/// Where the PiP overlay goes inside `stage`: anchored bottom-right, clipped
/// to the stage.
pub fn pip_rect(stage: Rect, (width, height): (u16, u16)) -> Rect {
    let width = width.min(stage.width);
    let height = height.min(stage.height);
    Rect::new(
        stage.x + stage.width - width,
        stage.y + stage.height - height,
        width,
        height,
    )
}

pub fn render(
    area: Rect,
    buf: &mut Buffer,
    session: &MeetingSession,
    viewport: ViewportClass,
    pip_cells: (u16, u16),
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title = format!(" {} · {} in call ", session.meeting().title, session.roster().len());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style)
        .title(Span::styled(title, Style::default().fg(Color::White)));
    let inner = block.inner(area);
    block.render(area, buf);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    match session.screen() {
        ScreenShare::Presenting(handle) => {
            render_screen(inner, buf, &handle.id().to_string(), session.roster().len());
            render_pip(pip_rect(inner, pip_cells), buf, session);
        }
        ScreenShare::Requesting | ScreenShare::Off => render_grid(inner, buf, session, viewport),
    }
}

fn render_grid(area: Rect, buf: &mut Buffer, session: &MeetingSession, viewport: ViewportClass) {
    let participants = session.roster().participants();
    let grid = grid_layout(participants.len(), viewport);

    // Cap the stage width the way the grid step function caps it in px.
    let max_cols = (grid.max_width_px / PX_PER_COL) as u16;
    let [stage] = Layout::horizontal([Constraint::Max(max_cols)])
        .flex(Flex::Center)
        .areas(area);

    let rows =
        Layout::vertical(vec![Constraint::Ratio(1, grid.rows as u32); grid.rows]).split(stage);
    for (row_index, row) in rows.iter().enumerate() {
        let cells =
            Layout::horizontal(vec![Constraint::Ratio(1, grid.columns as u32); grid.columns])
                .split(*row);
        for (col_index, cell) in cells.iter().enumerate() {
            let index = row_index * grid.columns + col_index;
            let Some(participant) = participants.get(index) else {
                break;
            };
            let local = index == 0;
            render_tile(*cell, buf, participant, local.then_some(session));
        }
    }
}

/// One participant tile. `local` carries the session for the local tile so
/// it can show the camera preview state.
fn render_tile(
    area: Rect,
    buf: &mut Buffer,
    participant: &LiveParticipant,
    local: Option<&MeetingSession>,
) {
    let mut title = vec![Span::styled(
        format!(" {}", participant.name),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )];
    if local.is_some() {
        title.push(Span::styled(" (You)", Style::default().fg(Color::Gray)));
    }
    if participant.is_host {
        title.push(Span::styled(" ★ Host", Style::default().fg(Color::Yellow)));
    }
    let muted = match local {
        Some(session) => !session.mic_on(),
        None => participant.muted,
    };
    if muted {
        title.push(Span::styled(" 🔇", Style::default().fg(Color::Red)));
    }
    title.push(Span::raw(" "));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(Line::from(title));
    let inner = block.inner(area);
    block.render(area, buf);
    if inner.height == 0 {
        return;
    }

    let body = match local {
        Some(session) => preview_lines(session),
        None => vec![initials_line(&participant.initials())],
    };
    let top = inner.height.saturating_sub(body.len() as u16) / 2;
    let body_area = Rect::new(inner.x, inner.y + top, inner.width, inner.height - top);
    Paragraph::new(body)
        .alignment(Alignment::Center)
        .render(body_area, buf);
}

fn initials_line(initials: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!(" {} ", initials),
        Style::default()
            .fg(Color::White)
            .bg(Color::Blue)
            .add_modifier(Modifier::BOLD),
    ))
}

/// Local camera preview: live feed marker, or initials with the reason.
fn preview_lines(session: &MeetingSession) -> Vec<Line<'static>> {
    match session.local_preview() {
        LocalPreview::Live { camera } => vec![Line::from(Span::styled(
            format!("● {}", camera),
            Style::default().fg(Color::Green),
        ))],
        LocalPreview::Placeholder { initials } => {
            let reason = match session.local_media() {
                LocalMedia::Pending => "starting camera…",
                LocalMedia::Unavailable(_) => "no camera",
                LocalMedia::Live(_) => "camera off",
            };
            vec![
                initials_line(&initials),
                Line::from(Span::styled(reason, Style::default().fg(Color::DarkGray))),
            ]
        }
    }
}

fn render_screen(area: Rect, buf: &mut Buffer, stream: &str, in_call: usize) {
    let lines = vec![
        Line::from(Span::styled(
            "▣ You are presenting your screen",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("stream {} · visible to {} others", stream, in_call.saturating_sub(1)),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    Paragraph::new(lines).render(area, buf);
}

fn render_pip(area: Rect, buf: &mut Buffer, session: &MeetingSession) {
    if area.width < 2 || area.height < 2 {
        return;
    }
    Clear.render(area, buf);
    let border = if session.is_resizing_pip() {
        Color::Yellow
    } else {
        Color::Cyan
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(" You ", Style::default().fg(Color::White)));
    let inner = block.inner(area);
    block.render(area, buf);

    buf.set_string(area.x, area.y, PIP_HANDLE, Style::default().fg(border));

    let body = preview_lines(session);
    let top = inner.height.saturating_sub(body.len() as u16) / 2;
    if top < inner.height {
        let body_area = Rect::new(inner.x, inner.y + top, inner.width, inner.height - top);
        Paragraph::new(body)
            .alignment(Alignment::Center)
            .render(body_area, buf);
    }
}

/// Control bar under the stage.
pub fn render_controls(area: Rect, buf: &mut Buffer, session: &MeetingSession) {
    let toggle = |key: &str, label: &str, on: bool| -> Vec<Span<'static>> {
        let color = if on { Color::Green } else { Color::Red };
        vec![
            Span::styled(format!(" [{}] ", key), Style::default().fg(Color::Yellow)),
            Span::styled(label.to_string(), Style::default().fg(color)),
        ]
    };

    let mut spans = Vec::new();
    spans.extend(toggle(
        "c",
        if session.camera_on() { "Camera on" } else { "Camera off" },
        session.camera_on(),
    ));
    spans.extend(toggle(
        "m",
        if session.mic_on() { "Mic on" } else { "Muted" },
        session.mic_on(),
    ));
    let share = match session.screen() {
        ScreenShare::Off => "Share screen",
        ScreenShare::Requesting => "Choosing screen…",
        ScreenShare::Presenting(_) => "Stop sharing",
    };
    spans.extend(toggle("s", share, !matches!(session.screen(), ScreenShare::Off)));
    spans.push(Span::styled(" [L] ", Style::default().fg(Color::Yellow)));
    spans.push(Span::styled(
        "Leave",
        Style::default().fg(Color::White).bg(Color::Red),
    ));

    Paragraph::new(Line::from(spans)).render(area, buf);
}
