//! TUI application state and main event loop

use anyhow::{Context, Result};
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use futures::{FutureExt, StreamExt};
use ratatui::layout::Rect;
use ratatui::DefaultTerminal;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crate::models::{Meeting, ParticipantId};
use crate::room::chat::QUICK_REACTIONS;
use crate::room::layout::{GestureId, PipDimensions};
use crate::room::media::MediaDevices;
use crate::room::sim_devices::SimulatedDevices;
use crate::room::{MeetingController, RoomDriver, RoomError, RoomEvent, RoomPhase};
use crate::store::share_link;

use super::input::TextInput;
use super::log_capture::LogBuffer;
use super::log_pane::LogPane;
use super::ui;

/// Redraw interval while idle
const TICK_MS: u64 = 250;

/// Keyboard PiP resize step, in px.
const PIP_KEY_STEP: i64 = 40;

/// Pixel size of one terminal cell, for mapping the PiP onto the grid.
pub const PX_PER_COL: u32 = 8;
pub const PX_PER_ROW: u32 = 16;

/// Focused region of the active room
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Stage,
    Chat,
    People,
}

impl Focus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Focus::Stage => "stage",
            Focus::Chat => "chat",
            Focus::People => "people",
        }
    }

    fn next(self) -> Self {
        match self {
            Focus::Stage => Focus::Chat,
            Focus::Chat => Focus::People,
            Focus::People => Focus::Stage,
        }
    }
}

/// One-line message in the status bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub is_error: bool,
}

/// A row in the people panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonRef {
    Waiting(ParticipantId),
    Present(ParticipantId),
}

/// Startup options for the room TUI
#[derive(Debug, Clone, Default)]
pub struct RoomOptions {
    pub meetings: Vec<Meeting>,
    /// Open the join form for this meeting right away.
    pub meeting_id: Option<String>,
    /// Name pre-filled in the join form; submitted right away with `meeting_id`.
    pub name: Option<String>,
    pub link_domain: String,
    pub narrow_viewport_cols: u16,
}

/// Application state
pub struct App {
    pub controller: MeetingController,
    /// Handle on the simulated backend, for ending a share out-of-band.
    sim: Option<SimulatedDevices>,
    pub meetings: Vec<Meeting>,
    pub selected_meeting: usize,
    pub name_input: TextInput,
    pub name_error: Option<String>,
    pub chat_input: TextInput,
    pub focus: Focus,
    pub selected_message: Option<usize>,
    pub selected_person: usize,
    pub show_help: bool,
    pub log: LogPane,
    pub status: Option<Status>,
    pub link_domain: String,
    pub narrow_cols: u16,
    default_name: Option<String>,
    gesture: Option<GestureId>,
    pub should_exit: bool,
}

impl App {
    pub fn new(
        controller: MeetingController,
        options: RoomOptions,
        log: LogBuffer,
        sim: Option<SimulatedDevices>,
    ) -> Self {
        let mut app = Self {
            controller,
            sim,
            meetings: options.meetings,
            selected_meeting: 0,
            name_input: TextInput::default(),
            name_error: None,
            chat_input: TextInput::default(),
            focus: Focus::default(),
            selected_message: None,
            selected_person: 0,
            show_help: false,
            log: LogPane::new(log),
            status: None,
            link_domain: options.link_domain,
            narrow_cols: options.narrow_viewport_cols,
            default_name: options.name.clone(),
            gesture: None,
            should_exit: false,
        };

        if let Some(id) = options.meeting_id {
            match app.meetings.iter().position(|m| m.id == id) {
                Some(index) => {
                    app.selected_meeting = index;
                    app.join_selected();
                    if options.name.is_some() {
                        app.submit_name();
                    }
                }
                None => app.set_error(format!("No meeting with id {}", id)),
            }
        }
        app
    }

    fn set_info(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: false,
        });
    }

    fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            is_error: true,
        });
    }

    /// Report a controller error: user-facing ones go to the status bar.
    fn report(&mut self, e: RoomError) {
        if e.is_user_facing() {
            self.set_error(e.to_string());
        } else {
            tracing::debug!("{}", e);
        }
    }

    /// Whether the local participant hosts the current session.
    pub fn is_host(&self) -> bool {
        self.controller
            .session()
            .is_some_and(|s| s.roster().local_is_host())
    }

    /// Rows of the people panel: waiting entries (host only), then everyone
    /// in the call except the local participant.
    pub fn people(&self) -> Vec<PersonRef> {
        let Some(session) = self.controller.session() else {
            return Vec::new();
        };
        let roster = session.roster();
        let mut rows = Vec::new();
        if roster.local_is_host() {
            rows.extend(roster.waiting().map(|w| PersonRef::Waiting(w.id.clone())));
        }
        rows.extend(
            roster
                .remote_participants()
                .iter()
                .map(|p| PersonRef::Present(p.id.clone())),
        );
        rows
    }

    // -----------------------------------------------------------------
    // Terminal events
    // -----------------------------------------------------------------

    pub fn handle_terminal_event(&mut self, event: Event, area: Rect) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse, area),
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            self.show_help = false;
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_exit = true;
                return;
            }
            KeyCode::Char('d') if ctrl => {
                self.log.toggle();
                return;
            }
            KeyCode::F(1) => {
                self.show_help = true;
                return;
            }
            KeyCode::PageUp if self.log.visible => {
                self.log.scroll_up(5);
                return;
            }
            KeyCode::PageDown if self.log.visible => {
                self.log.scroll_down(5);
                return;
            }
            _ => {}
        }

        match self.controller.phase() {
            RoomPhase::Idle => self.handle_list_key(key),
            RoomPhase::Joining => self.handle_name_key(key),
            RoomPhase::WaitingForAdmission => {
                if key.code == KeyCode::Esc {
                    self.leave();
                }
            }
            RoomPhase::Active => self.handle_room_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_meeting = self.selected_meeting.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_meeting + 1 < self.meetings.len() {
                    self.selected_meeting += 1;
                }
            }
            KeyCode::Char('l') => {
                if let Some(m) = self.meetings.get(self.selected_meeting) {
                    let link = share_link(&self.link_domain, &m.id);
                    self.set_info(format!("Share link: {}", link));
                }
            }
            KeyCode::Enter => self.join_selected(),
            _ => {}
        }
    }

    fn join_selected(&mut self) {
        let Some(meeting) = self.meetings.get(self.selected_meeting).cloned() else {
            return;
        };
        match self.controller.request_join(meeting) {
            Ok(_) => {
                self.name_input =
                    TextInput::with_value(self.default_name.clone().unwrap_or_default());
                self.name_error = None;
                self.status = None;
            }
            Err(e) => self.report(e),
        }
    }

    fn handle_name_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.leave(),
            KeyCode::Enter => self.submit_name(),
            KeyCode::Char(c) => {
                self.name_input.insert(c);
                self.name_error = None;
            }
            KeyCode::Backspace => self.name_input.backspace(),
            KeyCode::Delete => self.name_input.delete(),
            KeyCode::Left => self.name_input.left(),
            KeyCode::Right => self.name_input.right(),
            KeyCode::Home => self.name_input.home(),
            KeyCode::End => self.name_input.end(),
            _ => {}
        }
    }

    fn submit_name(&mut self) {
        match self.controller.submit_name(self.name_input.value()) {
            Ok(_) => {
                self.name_error = None;
                self.default_name = Some(self.name_input.value().trim().to_string());
                self.focus = Focus::Stage;
                self.selected_message = None;
                self.selected_person = 0;
            }
            Err(RoomError::Validation(msg)) => self.name_error = Some(msg),
            Err(e) => self.report(e),
        }
    }

    fn leave(&mut self) {
        if self.controller.leave() {
            self.set_info("You left the meeting");
        }
        self.gesture = None;
        self.chat_input.clear();
        self.selected_message = None;
        self.selected_person = 0;
        self.focus = Focus::Stage;
    }

    fn handle_room_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Tab {
            self.focus = self.focus.next();
            return;
        }
        match self.focus {
            Focus::Stage => self.handle_stage_key(key),
            Focus::Chat => self.handle_chat_key(key),
            Focus::People => self.handle_people_key(key),
        }
    }

    fn handle_stage_key(&mut self, key: KeyEvent) {
        let result = match key.code {
            KeyCode::Char('c') => self.controller.toggle_camera().map(|on| {
                self.set_info(if on { "Camera on" } else { "Camera off" });
            }),
            KeyCode::Char('m') => self.controller.toggle_mic().map(|on| {
                self.set_info(if on { "Microphone on" } else { "Microphone muted" });
            }),
            KeyCode::Char('s') => self.controller.toggle_screen_share(),
            KeyCode::Char('x') => self.controller.stop_screen_share().map(|stopped| {
                if stopped {
                    self.set_info("Screen sharing stopped");
                }
            }),
            KeyCode::Char('e') => {
                self.end_share_out_of_band();
                Ok(())
            }
            KeyCode::Char('[') => {
                self.resize_pip_by(-PIP_KEY_STEP);
                Ok(())
            }
            KeyCode::Char(']') => {
                self.resize_pip_by(PIP_KEY_STEP);
                Ok(())
            }
            KeyCode::Char('L') | KeyCode::Esc => {
                self.leave();
                Ok(())
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            self.report(e);
        }
    }

    fn end_share_out_of_band(&mut self) {
        let presenting = self
            .controller
            .session()
            .is_some_and(|s| s.is_presenting());
        match &self.sim {
            Some(sim) if presenting => {
                sim.end_screen_share();
            }
            Some(_) => self.set_info("Not presenting"),
            None => self.set_info("Stop the share from your system to end it"),
        }
    }

    /// Keyboard resize: a complete begin/drag/end gesture of `delta` px.
    fn resize_pip_by(&mut self, delta: i64) {
        let Some(gesture) = self.controller.begin_pip_resize(0) else {
            return;
        };
        // Pointer moving left grows the overlay.
        self.controller.drag_pip_resize(gesture, -delta);
        self.controller.end_pip_resize(gesture);
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        let messages = self
            .controller
            .session()
            .map(|s| s.chat().len())
            .unwrap_or(0);
        match key.code {
            KeyCode::Esc => {
                if self.selected_message.take().is_none() {
                    self.focus = Focus::Stage;
                }
            }
            KeyCode::Up => {
                self.selected_message = match self.selected_message {
                    _ if messages == 0 => None,
                    None => Some(messages - 1),
                    Some(i) => Some(i.saturating_sub(1)),
                };
            }
            KeyCode::Down => {
                self.selected_message = match self.selected_message {
                    Some(i) if i + 1 < messages => Some(i + 1),
                    _ => None,
                };
            }
            KeyCode::Char(c @ '1'..='5')
                if self.chat_input.is_empty() && self.selected_message.is_some() =>
            {
                let emoji = QUICK_REACTIONS[c as usize - '1' as usize];
                self.react_selected(emoji);
            }
            KeyCode::Enter => {
                let text = self.chat_input.take();
                match self.controller.send_message(&text) {
                    Ok(_) => self.selected_message = None,
                    Err(e) => self.report(e),
                }
            }
            KeyCode::Char(c) => self.chat_input.insert(c),
            KeyCode::Backspace => self.chat_input.backspace(),
            KeyCode::Delete => self.chat_input.delete(),
            KeyCode::Left => self.chat_input.left(),
            KeyCode::Right => self.chat_input.right(),
            KeyCode::Home => self.chat_input.home(),
            KeyCode::End => self.chat_input.end(),
            _ => {}
        }
    }

    fn react_selected(&mut self, emoji: &str) {
        let id = self.selected_message.and_then(|i| {
            self.controller
                .session()
                .and_then(|s| s.chat().messages().get(i))
                .map(|m| m.id.clone())
        });
        if let Some(id) = id {
            if let Err(e) = self.controller.react(&id, emoji) {
                self.report(e);
            }
        }
    }

    fn handle_people_key(&mut self, key: KeyEvent) {
        let people = self.people();
        match key.code {
            KeyCode::Up => self.selected_person = self.selected_person.saturating_sub(1),
            KeyCode::Down => {
                if self.selected_person + 1 < people.len() {
                    self.selected_person += 1;
                }
            }
            KeyCode::Esc => self.focus = Focus::Stage,
            KeyCode::Char(c @ ('a' | 'd' | 'm' | 'r')) => {
                let Some(target) = people.get(self.selected_person).cloned() else {
                    return;
                };
                if !self.is_host() {
                    self.set_info("Only the host can manage participants");
                    return;
                }
                let changed = match (c, &target) {
                    ('a', PersonRef::Waiting(id)) => self.controller.admit(id),
                    ('d', PersonRef::Waiting(id)) => self.controller.deny(id),
                    ('m', PersonRef::Present(id)) => {
                        let changed = self.controller.toggle_mute(id);
                        let muted = self
                            .controller
                            .session()
                            .and_then(|s| s.roster().get(id))
                            .map(|p| (p.name.clone(), p.muted));
                        if let (true, Some((name, muted))) = (changed, muted) {
                            self.set_info(if muted {
                                format!("{} muted", name)
                            } else {
                                format!("{} unmuted", name)
                            });
                        }
                        changed
                    }
                    ('r', PersonRef::Present(id)) => self.controller.remove(id),
                    _ => false,
                };
                if changed {
                    let len = self.people().len();
                    self.selected_person = self.selected_person.min(len.saturating_sub(1));
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------
    // Mouse: PiP drag handle
    // -----------------------------------------------------------------

    fn handle_mouse(&mut self, mouse: MouseEvent, area: Rect) {
        let x = mouse.column as i64 * PX_PER_COL as i64;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let on_handle = ui::pip_rect(area, self).is_some_and(|pip| {
                    mouse.column == pip.x && mouse.row == pip.y
                });
                if on_handle {
                    self.gesture = self.controller.begin_pip_resize(x);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(g) = self.gesture {
                    self.controller.drag_pip_resize(g, x);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(g) = self.gesture.take() {
                    self.controller.end_pip_resize(g);
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------
    // Room events
    // -----------------------------------------------------------------

    pub fn handle_room_event(&mut self, event: RoomEvent) {
        let was = self.controller.phase();
        let note = match &event {
            RoomEvent::ScreenShareEnded { .. } => Some("Screen sharing ended".to_string()),
            RoomEvent::DisplayCaptureResolved { result: Err(e), .. } => {
                Some(format!("Screen sharing was not started ({})", e))
            }
            RoomEvent::CameraAndMicResolved { result: Err(e), .. } => Some(format!(
                "{}; continuing without video",
                RoomError::from(e.clone())
            )),
            _ => None,
        };
        if self.controller.handle_event(event) {
            if let Some(note) = note {
                self.set_info(note);
            }
            if was == RoomPhase::WaitingForAdmission && self.controller.phase() == RoomPhase::Active
            {
                self.set_info("The host let you in");
            }
        }
        if self
            .controller
            .session()
            .is_some_and(|s| !s.is_resizing_pip())
        {
            self.gesture = None;
        }
    }

    /// PiP size in terminal cells.
    pub fn pip_cells(dims: PipDimensions) -> (u16, u16) {
        (
            dims.width.div_ceil(PX_PER_COL) as u16,
            dims.height.div_ceil(PX_PER_ROW) as u16,
        )
    }
}

/// Run the TUI with panic-safe terminal restore
pub async fn run<D: MediaDevices + 'static>(mut app: App, mut driver: RoomDriver<D>) -> Result<()> {
    let mut terminal = ratatui::init();
    crossterm::execute!(std::io::stdout(), EnableMouseCapture)
        .context("Failed to enable mouse capture")?;

    let result = AssertUnwindSafe(run_app(&mut terminal, &mut app, &mut driver))
        .catch_unwind()
        .await;

    let _ = crossterm::execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    // Release devices even when the loop ended with an error.
    app.controller.leave();
    driver.dispatch(app.controller.drain_effects());

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}

async fn run_app<D: MediaDevices + 'static>(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    driver: &mut RoomDriver<D>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(TICK_MS));

    driver.dispatch(app.controller.drain_effects());

    while !app.should_exit {
        app.log.refresh();
        let frame = terminal.draw(|frame| ui::render(frame, app))?;
        let area = frame.area;

        tokio::select! {
            maybe = events.next() => match maybe {
                Some(Ok(event)) => app.handle_terminal_event(event, area),
                Some(Err(e)) => return Err(e).context("Failed to read terminal event"),
                None => break,
            },
            Some(event) = driver.recv() => app.handle_room_event(event),
            _ = tick.tick() => {}
        }

        driver.dispatch(app.controller.drain_effects());
    }

    Ok(())
}
