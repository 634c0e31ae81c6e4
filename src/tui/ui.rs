//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};

use crate::models::Meeting;
use crate::room::layout::ViewportClass;
use crate::room::media::TrackKind;
use crate::room::{LocalMedia, RoomPhase};

use super::app::{App, Focus};
use super::chat_panel;
use super::help;
use super::input;
use super::log_pane::{self, LOG_PANE_HEIGHT};
use super::people;
use super::stage;

/// Width of the chat/people column on wide terminals.
const SIDE_PANEL_WIDTH: u16 = 38;
/// Height of the people panel inside the side column.
const PEOPLE_HEIGHT: u16 = 10;

/// Top-level screen regions.
struct FrameAreas {
    header: Rect,
    main: Rect,
    log: Option<Rect>,
    status: Rect,
}

fn frame_areas(area: Rect, app: &App) -> FrameAreas {
    let log_height = if app.log.visible { LOG_PANE_HEIGHT } else { 0 };
    let [header, main, log, status] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(log_height),
        Constraint::Length(1),
    ])
    .areas(area);
    FrameAreas {
        header,
        main,
        log: app.log.visible.then_some(log),
        status,
    }
}

/// Regions of the active room view.
pub struct RoomAreas {
    pub stage: Rect,
    pub controls: Rect,
    pub chat: Rect,
    pub people: Rect,
}

/// Split the main area for the room. Narrow terminals stack the side panels
/// under the stage.
pub fn room_areas(main: Rect, viewport: ViewportClass) -> RoomAreas {
    let (stage_col, side) = match viewport {
        ViewportClass::Wide => {
            let [stage_col, side] =
                Layout::horizontal([Constraint::Fill(1), Constraint::Length(SIDE_PANEL_WIDTH)])
                    .areas(main);
            (stage_col, side)
        }
        ViewportClass::Narrow => {
            let [stage_col, side] =
                Layout::vertical([Constraint::Percentage(55), Constraint::Percentage(45)])
                    .areas(main);
            (stage_col, side)
        }
    };
    let [stage, controls] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(stage_col);
    let [chat, people] = match viewport {
        ViewportClass::Wide => {
            Layout::vertical([Constraint::Fill(1), Constraint::Length(PEOPLE_HEIGHT)]).areas(side)
        }
        ViewportClass::Narrow => {
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(side)
        }
    };
    RoomAreas {
        stage,
        controls,
        chat,
        people,
    }
}

fn viewport(area: Rect, app: &App) -> ViewportClass {
    ViewportClass::from_width(area.width, app.narrow_cols)
}

/// Screen rect of the PiP overlay for a frame of size `area`, when shown.
///
/// Shared by rendering and mouse hit-testing so both agree on where the
/// drag handle is.
pub fn pip_rect(area: Rect, app: &App) -> Option<Rect> {
    if app.controller.phase() != RoomPhase::Active {
        return None;
    }
    let session = app.controller.session()?;
    if !session.pip_visible() {
        return None;
    }
    let main = frame_areas(area, app).main;
    let room = room_areas(main, viewport(area, app));
    Some(stage::pip_rect(
        room.stage.inner(Margin::new(1, 1)),
        App::pip_cells(session.pip()),
    ))
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let areas = frame_areas(area, app);

    render_header(areas.header, frame.buffer_mut(), app);

    match app.controller.phase() {
        RoomPhase::Idle => render_meeting_list(areas.main, frame.buffer_mut(), app),
        RoomPhase::Joining => render_name_form(areas.main, frame, app),
        RoomPhase::WaitingForAdmission => render_waiting(areas.main, frame.buffer_mut(), app),
        RoomPhase::Active => render_room(areas.main, frame, app, viewport(area, app)),
    }

    if let Some(log_area) = areas.log {
        log_pane::render(log_area, frame.buffer_mut(), &app.log);
    }

    render_status(areas.status, frame.buffer_mut(), app);

    if app.show_help {
        help::render_help_popup(frame);
    }
}

fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = " Microchurch Meet";
    let right = match app.controller.meeting() {
        Some(m) => format!("{}  [{}] ", m.title, app.controller.phase().as_str()),
        None => "F1 Help ".to_string(),
    };
    let padding = (area.width as usize).saturating_sub(title.len() + right.chars().count());

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, Style::default().fg(Color::Cyan)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(status) = &app.status {
        let style = if status.is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", status.text), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let sep = Span::styled(" | ", Style::default().fg(Color::Gray));
    let mut spans = vec![Span::styled(
        format!(" {}", app.controller.phase().as_str()),
        Style::default().fg(Color::Yellow),
    )];
    if app.controller.phase() == RoomPhase::Active {
        spans.push(sep.clone());
        spans.push(Span::styled(
            format!("Tab: {}", app.focus.as_str()),
            Style::default().fg(Color::Cyan),
        ));
    }
    spans.push(sep.clone());
    spans.push(Span::styled("F1: help", Style::default().fg(Color::Gray)));
    spans.push(sep.clone());
    spans.push(Span::styled("C-d: log", Style::default().fg(Color::Gray)));
    if let Some(line) = app.log.last_line().filter(|_| !app.log.visible) {
        spans.push(sep);
        spans.push(Span::styled(line.to_string(), Style::default().fg(Color::Gray)));
    }

    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn meeting_lines(meeting: &Meeting, selected: bool) -> Vec<Line<'static>> {
    let marker = if selected { "▶ " } else { "  " };
    let title_style = if selected {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    let mut lines = vec![
        Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Yellow)),
            Span::styled(meeting.title.clone(), title_style),
        ]),
        Line::from(Span::styled(
            format!(
                "  {} · Host: {} · {} waiting",
                meeting.start_time, meeting.host, meeting.participants
            ),
            Style::default().fg(Color::Cyan),
        )),
    ];
    if !meeting.description.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  {}", meeting.description),
            Style::default().fg(Color::Gray),
        )));
    }
    lines.push(Line::from(""));
    lines
}

fn render_meeting_list(area: Rect, buf: &mut Buffer, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " Upcoming meetings ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);

    if app.meetings.is_empty() {
        Paragraph::new(Line::from(Span::styled(
            " No meetings scheduled",
            Style::default().fg(Color::DarkGray),
        )))
        .render(inner, buf);
        return;
    }

    let mut lines = Vec::new();
    let mut selected_top = 0;
    for (i, meeting) in app.meetings.iter().enumerate() {
        if i == app.selected_meeting {
            selected_top = lines.len();
        }
        lines.extend(meeting_lines(meeting, i == app.selected_meeting));
    }
    // Keep the selection's first line on screen.
    let height = inner.height as usize;
    let scroll = (selected_top + 3).saturating_sub(height);
    Paragraph::new(lines)
        .scroll((scroll as u16, 0))
        .render(inner, buf);
}

fn render_name_form(area: Rect, frame: &mut Frame, app: &App) {
    let Some(meeting) = app.controller.meeting() else {
        return;
    };
    let popup = help::centered_rect(
        56.min(area.width),
        11.min(area.height),
        area,
    );
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            format!(" Join {} ", meeting.title),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let [info, input_area, error, hint] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(inner.inner(Margin::new(1, 0)));

    frame.render_widget(
        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("{} · hosted by {}", meeting.start_time, meeting.host),
                Style::default().fg(Color::Cyan),
            )),
            Line::from(Span::styled(
                "How should others see you?",
                Style::default().fg(Color::Gray),
            )),
        ]),
        info,
    );

    input::render(frame, input_area, &app.name_input, "Your name", "Enter your name", true);

    if let Some(msg) = &app.name_error {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                msg.clone(),
                Style::default().fg(Color::Red),
            ))),
            error,
        );
    }
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "Enter: join · Esc: cancel",
            Style::default().fg(Color::DarkGray),
        ))),
        hint,
    );
}

fn media_status(media: &LocalMedia) -> Span<'static> {
    match media {
        LocalMedia::Pending => Span::styled(
            "Waiting for camera permission…",
            Style::default().fg(Color::Yellow),
        ),
        LocalMedia::Live(handle) if !handle.stream().has_track(TrackKind::Audio) => Span::styled(
            "Camera ready, no microphone",
            Style::default().fg(Color::Green),
        ),
        LocalMedia::Live(_) => Span::styled("Camera ready", Style::default().fg(Color::Green)),
        LocalMedia::Unavailable(e) => Span::styled(
            format!("Camera unavailable ({}), joining without video", e),
            Style::default().fg(Color::Gray),
        ),
    }
}

fn render_waiting(area: Rect, buf: &mut Buffer, app: &App) {
    let Some(session) = app.controller.session() else {
        return;
    };
    let meeting = session.meeting();
    let popup = help::centered_rect(60.min(area.width), 9.min(area.height), area);
    Clear.render(popup, buf);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            " Waiting room ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(popup);
    block.render(popup, buf);

    let lines = vec![
        Line::from(Span::styled(
            meeting.title.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!(
            "Hi {}, {} will let you in shortly.",
            session.roster().local().name,
            meeting.host
        )),
        Line::from(media_status(session.local_media())),
        Line::from(""),
        Line::from(Span::styled(
            "Esc: leave",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .render(inner.inner(Margin::new(1, 0)), buf);
}

fn render_room(area: Rect, frame: &mut Frame, app: &App, viewport: ViewportClass) {
    let Some(session) = app.controller.session() else {
        return;
    };
    let areas = room_areas(area, viewport);

    stage::render(
        areas.stage,
        frame.buffer_mut(),
        session,
        viewport,
        App::pip_cells(session.pip()),
        app.focus == Focus::Stage,
    );
    stage::render_controls(areas.controls, frame.buffer_mut(), session);
    chat_panel::render(
        areas.chat,
        frame,
        session,
        &app.chat_input,
        app.selected_message,
        app.focus == Focus::Chat,
    );
    people::render(
        areas.people,
        frame.buffer_mut(),
        session,
        app.selected_person,
        app.focus == Focus::People,
    );
}
