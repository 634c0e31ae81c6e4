//! Meeting session controller: the room's state machine.
//!
//! ```text
//! Idle ──request_join──▶ Joining ──submit_name──┬─▶ Active            (host)
//!   ▲                                           └─▶ WaitingForAdmission (guest)
//!   │                                                   │ AdmissionGranted
//!   └──────────────────── leave (from any state) ◀──────┴─▶ Active
//! ```
//!
//! The controller is synchronous. Anything that needs to wait (permission
//! prompts, simulated remote activity) is queued as an `Effect` for the
//! driver, whose results come back through `handle_event`. Effects and events
//! carry the session epoch; results for an epoch that is no longer current are
//! discarded, and any stream they carry is stopped on the spot.

use std::time::Duration;

use crate::models::{LiveParticipant, Meeting, MessageId, ParticipantId};

use super::error::{MediaError, RoomError};
use super::layout::GestureId;
use super::media::{discard_stream, MediaHandle, MediaStream, StopReason, StreamId};
use super::roster::Roster;
use super::session::{LocalMedia, MeetingSession, ScreenShare, SessionEpoch};

/// Work the controller needs done outside its synchronous methods.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Prompt for camera + microphone.
    AcquireCameraAndMic { epoch: SessionEpoch },
    /// Prompt for a screen capture and watch it for out-of-band termination.
    StartDisplayCapture { epoch: SessionEpoch },
    /// Let the waiting guest in after a fixed delay.
    ScheduleAdmission { epoch: SessionEpoch, after: Duration },
    /// Begin the scripted remote activity for an active session.
    StartSimulation {
        epoch: SessionEpoch,
        meeting: Meeting,
        local_name: String,
        local_is_host: bool,
    },
    /// The local user sent a message; `author`, who is in the call, may react
    /// to it.
    ScheduleReplies {
        epoch: SessionEpoch,
        message: MessageId,
        author: String,
    },
    /// The session ended; abandon all outstanding work for it.
    CancelSession { epoch: SessionEpoch },
}

/// Results and simulated remote activity fed back into the controller.
#[derive(Debug)]
pub enum RoomEvent {
    CameraAndMicResolved {
        epoch: SessionEpoch,
        result: Result<MediaStream, MediaError>,
    },
    DisplayCaptureResolved {
        epoch: SessionEpoch,
        result: Result<MediaStream, MediaError>,
    },
    /// The capture was terminated outside the app.
    ScreenShareEnded {
        epoch: SessionEpoch,
        stream: StreamId,
    },
    AdmissionGranted {
        epoch: SessionEpoch,
    },
    /// A remote participant who is already in the call.
    ParticipantJoined {
        epoch: SessionEpoch,
        name: String,
    },
    /// A remote participant knocking at the waiting room.
    ParticipantArrived {
        epoch: SessionEpoch,
        name: String,
    },
    RemoteMessage {
        epoch: SessionEpoch,
        author: String,
        text: String,
    },
    RemoteReaction {
        epoch: SessionEpoch,
        message: MessageId,
        author: String,
        emoji: String,
    },
}

impl RoomEvent {
    pub fn epoch(&self) -> SessionEpoch {
        match self {
            RoomEvent::CameraAndMicResolved { epoch, .. }
            | RoomEvent::DisplayCaptureResolved { epoch, .. }
            | RoomEvent::ScreenShareEnded { epoch, .. }
            | RoomEvent::AdmissionGranted { epoch }
            | RoomEvent::ParticipantJoined { epoch, .. }
            | RoomEvent::ParticipantArrived { epoch, .. }
            | RoomEvent::RemoteMessage { epoch, .. }
            | RoomEvent::RemoteReaction { epoch, .. } => *epoch,
        }
    }

    /// Release whatever resource the event carries.
    pub(crate) fn discard(self) {
        match self {
            RoomEvent::CameraAndMicResolved {
                result: Ok(stream), ..
            }
            | RoomEvent::DisplayCaptureResolved {
                result: Ok(stream), ..
            } => discard_stream(stream),
            _ => {}
        }
    }
}

/// Controller state.
#[derive(Debug, Default)]
pub enum RoomState {
    #[default]
    Idle,
    /// Name entry for `meeting`.
    Joining {
        epoch: SessionEpoch,
        meeting: Meeting,
    },
    WaitingForAdmission(Box<MeetingSession>),
    Active(Box<MeetingSession>),
}

/// Fieldless mirror of `RoomState` for display and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Idle,
    Joining,
    WaitingForAdmission,
    Active,
}

impl RoomPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomPhase::Idle => "idle",
            RoomPhase::Joining => "joining",
            RoomPhase::WaitingForAdmission => "waiting for admission",
            RoomPhase::Active => "in a meeting",
        }
    }
}

impl From<&RoomState> for RoomPhase {
    fn from(state: &RoomState) -> Self {
        match state {
            RoomState::Idle => RoomPhase::Idle,
            RoomState::Joining { .. } => RoomPhase::Joining,
            RoomState::WaitingForAdmission(_) => RoomPhase::WaitingForAdmission,
            RoomState::Active(_) => RoomPhase::Active,
        }
    }
}

/// How `submit_name` resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Admitted,
    Waiting,
}

/// Tunables for the controller.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// How long a guest sits in the waiting room before the simulated host
    /// lets them in.
    pub admission_delay: Duration,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            admission_delay: Duration::from_millis(3000),
        }
    }
}

/// The meeting room state machine. At most one session exists at a time.
pub struct MeetingController {
    settings: RoomSettings,
    state: RoomState,
    next_epoch: SessionEpoch,
    effects: Vec<Effect>,
}

impl MeetingController {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            settings,
            state: RoomState::Idle,
            next_epoch: SessionEpoch::first(),
            effects: Vec::new(),
        }
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn phase(&self) -> RoomPhase {
        self.state().into()
    }

    /// The meeting being joined or attended.
    pub fn meeting(&self) -> Option<&Meeting> {
        match &self.state {
            RoomState::Idle => None,
            RoomState::Joining { meeting, .. } => Some(meeting),
            RoomState::WaitingForAdmission(s) | RoomState::Active(s) => Some(s.meeting()),
        }
    }

    /// The current session, whether waiting or active.
    pub fn session(&self) -> Option<&MeetingSession> {
        match &self.state {
            RoomState::WaitingForAdmission(s) | RoomState::Active(s) => Some(s),
            RoomState::Idle | RoomState::Joining { .. } => None,
        }
    }

    fn current_epoch(&self) -> Option<SessionEpoch> {
        match &self.state {
            RoomState::Idle => None,
            RoomState::Joining { epoch, .. } => Some(*epoch),
            RoomState::WaitingForAdmission(s) | RoomState::Active(s) => Some(s.epoch()),
        }
    }

    /// Tracks still open in the current session.
    pub fn open_tracks(&self) -> usize {
        self.session().map(MeetingSession::open_tracks).unwrap_or(0)
    }

    /// Hand queued effects to the driver.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn session_mut(&mut self) -> Option<&mut MeetingSession> {
        match &mut self.state {
            RoomState::WaitingForAdmission(s) | RoomState::Active(s) => Some(s),
            RoomState::Idle | RoomState::Joining { .. } => None,
        }
    }

    fn active_mut(&mut self, operation: &'static str) -> Result<&mut MeetingSession, RoomError> {
        let phase = self.phase();
        match &mut self.state {
            RoomState::Active(s) => Ok(s),
            _ => Err(RoomError::InvalidState {
                operation,
                phase: phase.as_str(),
            }),
        }
    }

    // ---------------------------------------------------------------------
    // Join / leave
    // ---------------------------------------------------------------------

    /// Open the name-entry step for `meeting`. Only valid while idle.
    pub fn request_join(&mut self, meeting: Meeting) -> Result<SessionEpoch, RoomError> {
        if let Some(current) = self.meeting() {
            return Err(RoomError::JoinInProgress(current.id.clone()));
        }
        let epoch = self.next_epoch;
        self.next_epoch = epoch.next();
        tracing::info!(%epoch, meeting = %meeting.id, "Join requested for \"{}\"", meeting.title);
        self.state = RoomState::Joining { epoch, meeting };
        Ok(epoch)
    }

    /// Enter the room under `name`.
    ///
    /// The host goes straight in; anyone else waits for admission. Both ask
    /// for camera and microphone right away.
    pub fn submit_name(&mut self, name: &str) -> Result<JoinOutcome, RoomError> {
        let name = name.trim();
        let (epoch, meeting) = match std::mem::take(&mut self.state) {
            RoomState::Joining { epoch, meeting } if !name.is_empty() => (epoch, meeting),
            other => {
                let joining = matches!(other, RoomState::Joining { .. });
                self.state = other;
                return Err(if joining {
                    RoomError::Validation("Please enter your name to join".to_string())
                } else {
                    RoomError::InvalidState {
                        operation: "submit a name",
                        phase: self.phase().as_str(),
                    }
                });
            }
        };

        let is_host = meeting.is_hosted_by(name);
        let local = LiveParticipant::new(name, is_host);
        let roster = Roster::new(local, meeting.host.clone());
        let session = Box::new(MeetingSession::new(epoch, meeting, roster));

        self.effects.push(Effect::AcquireCameraAndMic { epoch });

        if is_host {
            tracing::info!(%epoch, name, "Joined as host");
            self.activate(session);
            Ok(JoinOutcome::Admitted)
        } else {
            tracing::info!(%epoch, name, "Waiting for the host to admit");
            self.effects.push(Effect::ScheduleAdmission {
                epoch,
                after: self.settings.admission_delay,
            });
            self.state = RoomState::WaitingForAdmission(session);
            Ok(JoinOutcome::Waiting)
        }
    }

    fn activate(&mut self, session: Box<MeetingSession>) {
        self.effects.push(Effect::StartSimulation {
            epoch: session.epoch(),
            meeting: session.meeting().clone(),
            local_name: session.roster().local().name.clone(),
            local_is_host: session.roster().local_is_host(),
        });
        self.state = RoomState::Active(session);
    }

    /// End the current session from whatever phase it is in.
    ///
    /// Stops every open track, drops roster, chat, waiting queue and PiP
    /// state, and returns to idle. Returns false when already idle.
    pub fn leave(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            RoomState::Idle => false,
            RoomState::Joining { epoch, meeting } => {
                tracing::info!(%epoch, meeting = %meeting.id, "Join cancelled");
                self.effects.push(Effect::CancelSession { epoch });
                true
            }
            RoomState::WaitingForAdmission(mut session) | RoomState::Active(mut session) => {
                let epoch = session.epoch();
                session.release_media();
                tracing::info!(
                    %epoch,
                    meeting = %session.meeting().id,
                    messages = session.chat().len(),
                    "Left meeting"
                );
                self.effects.push(Effect::CancelSession { epoch });
                true
            }
        }
    }

    // ---------------------------------------------------------------------
    // Devices
    // ---------------------------------------------------------------------

    /// Show or hide the camera preview. The hardware track keeps running.
    pub fn toggle_camera(&mut self) -> Result<bool, RoomError> {
        let session = self.active_mut("toggle the camera")?;
        session.camera_on = !session.camera_on;
        tracing::debug!(camera_on = session.camera_on, "Camera toggled");
        Ok(session.camera_on)
    }

    /// Flip the local microphone flag. The hardware track keeps running.
    pub fn toggle_mic(&mut self) -> Result<bool, RoomError> {
        let session = self.active_mut("toggle the microphone")?;
        session.mic_on = !session.mic_on;
        tracing::debug!(mic_on = session.mic_on, "Microphone toggled");
        Ok(session.mic_on)
    }

    /// Start presenting, or stop if already presenting. A toggle while the
    /// capture prompt is still open is ignored.
    pub fn toggle_screen_share(&mut self) -> Result<(), RoomError> {
        let session = self.active_mut("share the screen")?;
        let epoch = session.epoch();
        match session.screen {
            ScreenShare::Off => session.screen = ScreenShare::Requesting,
            ScreenShare::Requesting => {
                tracing::debug!("Screen capture prompt already open");
                return Ok(());
            }
            ScreenShare::Presenting(_) => {
                session.stop_screen(StopReason::Explicit);
                return Ok(());
            }
        }
        self.effects.push(Effect::StartDisplayCapture { epoch });
        Ok(())
    }

    /// Explicitly stop presenting. Returns whether a share was running.
    pub fn stop_screen_share(&mut self) -> Result<bool, RoomError> {
        let session = self.active_mut("stop sharing")?;
        Ok(session.stop_screen(StopReason::Explicit))
    }

    // ---------------------------------------------------------------------
    // Chat
    // ---------------------------------------------------------------------

    /// Send a chat message as the local participant. Blank text is ignored.
    pub fn send_message(&mut self, text: &str) -> Result<Option<MessageId>, RoomError> {
        let session = self.active_mut("send a message")?;
        let author = session.roster.local().name.clone();
        let id = session.chat.send(&author, text);
        let responder = session
            .roster
            .remote_participants()
            .first()
            .map(|p| p.name.clone());
        if let (Some(id), Some(responder)) = (&id, responder) {
            let epoch = session.epoch();
            self.effects.push(Effect::ScheduleReplies {
                epoch,
                message: id.clone(),
                author: responder,
            });
        }
        Ok(id)
    }

    /// Toggle the local participant's `emoji` reaction on a message.
    pub fn react(&mut self, message: &MessageId, emoji: &str) -> Result<bool, RoomError> {
        let session = self.active_mut("react")?;
        let actor = session.roster.local().name.clone();
        Ok(session.chat.react(message, emoji, &actor))
    }

    // ---------------------------------------------------------------------
    // Host moderation
    // ---------------------------------------------------------------------

    fn moderate(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut Roster) -> Result<bool, RoomError>,
    ) -> bool {
        let session = match self.active_mut(operation) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!("Ignored {}: {}", operation, e);
                return false;
            }
        };
        match apply(&mut session.roster) {
            Ok(changed) => {
                if changed {
                    tracing::info!("{} applied", operation);
                }
                changed
            }
            Err(e) => {
                tracing::warn!("Rejected {}: {}", operation, e);
                false
            }
        }
    }

    /// Let a waiting participant in. Host only; returns whether anything changed.
    pub fn admit(&mut self, id: &ParticipantId) -> bool {
        self.moderate("admit", |r| r.admit(id))
    }

    /// Turn a waiting participant away. Host only.
    pub fn deny(&mut self, id: &ParticipantId) -> bool {
        self.moderate("deny", |r| r.deny(id))
    }

    /// Remove a remote participant. Host only.
    pub fn remove(&mut self, id: &ParticipantId) -> bool {
        self.moderate("remove", |r| r.remove(id))
    }

    /// Flip a participant's mute indicator. Host only.
    pub fn toggle_mute(&mut self, id: &ParticipantId) -> bool {
        self.moderate("mute toggle", |r| r.toggle_mute(id))
    }

    // ---------------------------------------------------------------------
    // PiP resize
    // ---------------------------------------------------------------------

    /// Start resizing the self-view overlay. Only while presenting.
    pub fn begin_pip_resize(&mut self, x: i64) -> Option<GestureId> {
        let session = self.active_mut("resize").ok()?;
        if !session.pip_visible() {
            return None;
        }
        Some(session.pip.begin(x))
    }

    pub fn drag_pip_resize(&mut self, gesture: GestureId, x: i64) -> bool {
        match self.active_mut("resize") {
            Ok(session) => session.pip.drag(gesture, x),
            Err(_) => false,
        }
    }

    pub fn end_pip_resize(&mut self, gesture: GestureId) -> bool {
        match self.active_mut("resize") {
            Ok(session) => session.pip.end(gesture),
            Err(_) => false,
        }
    }

    // ---------------------------------------------------------------------
    // Driver results
    // ---------------------------------------------------------------------

    /// Apply a driver event. Returns whether it changed anything.
    pub fn handle_event(&mut self, event: RoomEvent) -> bool {
        let epoch = event.epoch();
        if self.current_epoch() != Some(epoch) {
            tracing::debug!(%epoch, "Discarding event for a session that has ended");
            event.discard();
            return false;
        }

        match event {
            RoomEvent::CameraAndMicResolved { result, .. } => {
                let Some(session) = self.session_mut() else {
                    if let Ok(stream) = result {
                        discard_stream(stream);
                    }
                    return false;
                };
                camera_resolved(session, result)
            }
            RoomEvent::DisplayCaptureResolved { result, .. } => match self.active_mut("present") {
                Ok(session) => display_resolved(session, result),
                Err(_) => {
                    if let Ok(stream) = result {
                        discard_stream(stream);
                    }
                    false
                }
            },
            RoomEvent::ScreenShareEnded { stream, .. } => match self.active_mut("present") {
                Ok(session) if session.screen_stream_id() == Some(&stream) => {
                    session.stop_screen(StopReason::Interrupted)
                }
                _ => false,
            },
            RoomEvent::AdmissionGranted { .. } => match std::mem::take(&mut self.state) {
                RoomState::WaitingForAdmission(session) => {
                    tracing::info!(%epoch, "Admitted by host");
                    self.activate(session);
                    true
                }
                other => {
                    self.state = other;
                    false
                }
            },
            RoomEvent::ParticipantJoined { name, .. } => match self.active_mut("join") {
                Ok(session) => session.roster.seed(&name).is_some(),
                Err(_) => false,
            },
            RoomEvent::ParticipantArrived { name, .. } => match self.active_mut("knock") {
                Ok(session) if session.roster.local_is_host() => {
                    session.roster.enqueue(&name).is_some()
                }
                _ => false,
            },
            RoomEvent::RemoteMessage { author, text, .. } => match self.active_mut("chat") {
                Ok(session) if session.roster.contains_name(&author) => {
                    session.chat.send(&author, &text).is_some()
                }
                Ok(_) => {
                    tracing::debug!(%author, "Dropped message from someone not in the call");
                    false
                }
                Err(_) => false,
            },
            RoomEvent::RemoteReaction {
                message,
                author,
                emoji,
                ..
            } => match self.active_mut("react") {
                Ok(session) if session.roster.contains_name(&author) => {
                    session.chat.react(&message, &emoji, &author)
                }
                Ok(_) => {
                    tracing::debug!(%author, "Dropped reaction from someone not in the call");
                    false
                }
                Err(_) => false,
            },
        }
    }
}

fn camera_resolved(
    session: &mut MeetingSession,
    result: Result<MediaStream, MediaError>,
) -> bool {
    let pending = matches!(session.local_media, LocalMedia::Pending);
    match result {
        Ok(stream) if pending => {
            tracing::info!(stream = %stream.id(), "Camera and microphone live");
            session.local_media = LocalMedia::Live(MediaHandle::new(stream));
            true
        }
        Ok(stream) => {
            discard_stream(stream);
            false
        }
        Err(e) if pending => {
            tracing::warn!("Error accessing media: {}; continuing without video", e);
            session.local_media = LocalMedia::Unavailable(e);
            true
        }
        Err(_) => false,
    }
}

fn display_resolved(
    session: &mut MeetingSession,
    result: Result<MediaStream, MediaError>,
) -> bool {
    if !matches!(session.screen, ScreenShare::Requesting) {
        if let Ok(stream) = result {
            discard_stream(stream);
        }
        return false;
    }
    match result {
        Ok(stream) => {
            tracing::info!(stream = %stream.id(), "Presenting");
            session.screen = ScreenShare::Presenting(MediaHandle::new(stream));
        }
        Err(e) => {
            tracing::warn!("Error sharing screen: {}", e);
            session.screen = ScreenShare::Off;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::layout::PipDimensions;
    use crate::room::media::TrackKind;
    use crate::room::sim_devices::{SimulatedTrack, TrackProbe};
    use tokio_test::{assert_err, assert_ok};

    fn meeting() -> Meeting {
        Meeting {
            id: "bible-study".to_string(),
            title: "Wednesday Bible Study".to_string(),
            host: "Pastor John".to_string(),
            start_time: "Wed 7:00 PM".to_string(),
            description: String::new(),
            participants: 3,
        }
    }

    fn stream(kinds: &[TrackKind]) -> (MediaStream, Vec<TrackProbe>) {
        let mut tracks: Vec<Box<dyn crate::room::media::MediaTrack>> = Vec::new();
        let mut probes = Vec::new();
        for kind in kinds {
            let (t, p) = SimulatedTrack::new(*kind, kind.as_str());
            tracks.push(Box::new(t));
            probes.push(p);
        }
        (MediaStream::new(tracks), probes)
    }

    fn joined(name: &str) -> (MeetingController, SessionEpoch) {
        let mut c = MeetingController::new(RoomSettings::default());
        let epoch = c.request_join(meeting()).unwrap();
        c.submit_name(name).unwrap();
        (c, epoch)
    }

    fn host_with_camera() -> (MeetingController, SessionEpoch, Vec<TrackProbe>) {
        let (mut c, epoch) = joined("Pastor John");
        let (s, probes) = stream(&[TrackKind::Audio, TrackKind::Video]);
        assert!(c.handle_event(RoomEvent::CameraAndMicResolved {
            epoch,
            result: Ok(s)
        }));
        (c, epoch, probes)
    }

    fn present(c: &mut MeetingController, epoch: SessionEpoch) -> (StreamId, Vec<TrackProbe>) {
        c.toggle_screen_share().unwrap();
        let (s, probes) = stream(&[TrackKind::Screen]);
        let id = s.id().clone();
        assert!(c.handle_event(RoomEvent::DisplayCaptureResolved {
            epoch,
            result: Ok(s)
        }));
        (id, probes)
    }

    #[test]
    fn test_host_joins_active() {
        let mut c = MeetingController::new(RoomSettings::default());
        let epoch = c.request_join(meeting()).unwrap();
        assert_eq!(c.phase(), RoomPhase::Joining);

        assert_eq!(c.submit_name("  pastor john ").unwrap(), JoinOutcome::Admitted);
        assert_eq!(c.phase(), RoomPhase::Active);
        let session = c.session().unwrap();
        assert!(session.roster().local().is_host);
        assert_eq!(session.roster().local().name, "pastor john");

        let effects = c.drain_effects();
        assert_eq!(effects[0], Effect::AcquireCameraAndMic { epoch });
        assert!(matches!(
            effects[1],
            Effect::StartSimulation {
                local_is_host: true,
                ..
            }
        ));
        assert!(c.drain_effects().is_empty());
    }

    #[test]
    fn test_guest_waits_then_becomes_active() {
        let mut c = MeetingController::new(RoomSettings::default());
        let epoch = c.request_join(meeting()).unwrap();
        assert_eq!(c.submit_name("Sarah").unwrap(), JoinOutcome::Waiting);
        assert_eq!(c.phase(), RoomPhase::WaitingForAdmission);
        assert!(!c.session().unwrap().roster().local().is_host);

        let effects = c.drain_effects();
        assert!(effects.contains(&Effect::ScheduleAdmission {
            epoch,
            after: Duration::from_millis(3000)
        }));
        assert_err!(c.toggle_screen_share());

        assert!(c.handle_event(RoomEvent::AdmissionGranted { epoch }));
        assert_eq!(c.phase(), RoomPhase::Active);
        assert!(matches!(
            c.drain_effects().as_slice(),
            [Effect::StartSimulation {
                local_is_host: false,
                ..
            }]
        ));
    }

    #[test]
    fn test_empty_name_is_rejected_without_transition() {
        let mut c = MeetingController::new(RoomSettings::default());
        c.request_join(meeting()).unwrap();
        assert!(matches!(c.submit_name("   "), Err(RoomError::Validation(_))));
        assert!(matches!(
            c.state(),
            RoomState::Joining { meeting, .. } if meeting.host == "Pastor John"
        ));
        assert!(c.drain_effects().is_empty());
    }

    #[test]
    fn test_single_flight_join() {
        let mut c = MeetingController::new(RoomSettings::default());
        c.request_join(meeting()).unwrap();
        let mut other = meeting();
        other.id = "youth".to_string();
        assert!(matches!(
            c.request_join(other.clone()),
            Err(RoomError::JoinInProgress(id)) if id == "bible-study"
        ));
        c.submit_name("Pastor John").unwrap();
        assert_err!(c.request_join(other.clone()));

        c.leave();
        assert_ok!(c.request_join(other));
    }

    #[test]
    fn test_submit_name_requires_joining() {
        let mut c = MeetingController::new(RoomSettings::default());
        assert!(matches!(
            c.submit_name("Sarah"),
            Err(RoomError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_leave_releases_everything() {
        let (mut c, epoch, camera) = host_with_camera();
        let (_, screen) = present(&mut c, epoch);
        c.handle_event(RoomEvent::ParticipantJoined {
            epoch,
            name: "Sarah".to_string(),
        });
        c.handle_event(RoomEvent::ParticipantArrived {
            epoch,
            name: "Grace".to_string(),
        });
        c.send_message("Welcome all").unwrap();
        assert_eq!(c.open_tracks(), 3);
        c.drain_effects();

        assert!(c.leave());
        assert_eq!(c.phase(), RoomPhase::Idle);
        assert_eq!(c.open_tracks(), 0);
        assert!(c.session().is_none());
        assert_eq!(c.drain_effects(), vec![Effect::CancelSession { epoch }]);
        for probe in camera.iter().chain(screen.iter()) {
            assert!(!probe.is_live());
            assert_eq!(probe.stop_calls(), 1);
        }

        assert!(!c.leave());
        assert!(c.drain_effects().is_empty());
        for probe in camera.iter().chain(screen.iter()) {
            assert_eq!(probe.stop_calls(), 1);
        }
    }

    #[test]
    fn test_leave_from_every_phase() {
        let mut c = MeetingController::new(RoomSettings::default());
        assert!(!c.leave());

        c.request_join(meeting()).unwrap();
        assert!(c.leave());
        assert_eq!(c.phase(), RoomPhase::Idle);

        let epoch = c.request_join(meeting()).unwrap();
        c.submit_name("Sarah").unwrap();
        let (s, probes) = stream(&[TrackKind::Audio, TrackKind::Video]);
        c.handle_event(RoomEvent::CameraAndMicResolved {
            epoch,
            result: Ok(s),
        });
        assert!(c.leave());
        assert!(probes.iter().all(|p| p.stop_calls() == 1));
        assert_eq!(c.open_tracks(), 0);
    }

    #[test]
    fn test_late_camera_after_leave_is_stopped() {
        let (mut c, epoch) = joined("Pastor John");
        c.leave();

        let (s, probes) = stream(&[TrackKind::Audio, TrackKind::Video]);
        assert!(!c.handle_event(RoomEvent::CameraAndMicResolved {
            epoch,
            result: Ok(s)
        }));
        assert!(probes.iter().all(|p| !p.is_live() && p.stop_calls() == 1));
    }

    #[test]
    fn test_late_camera_from_previous_session_is_stopped() {
        let (mut c, old) = joined("Pastor John");
        c.leave();
        let current = c.request_join(meeting()).unwrap();
        c.submit_name("Pastor John").unwrap();
        assert_ne!(old, current);

        let (s, probes) = stream(&[TrackKind::Video]);
        assert!(!c.handle_event(RoomEvent::CameraAndMicResolved {
            epoch: old,
            result: Ok(s)
        }));
        assert_eq!(probes[0].stop_calls(), 1);
        assert!(matches!(
            c.session().unwrap().local_media(),
            LocalMedia::Pending
        ));
    }

    #[test]
    fn test_camera_failure_degrades_to_placeholder() {
        let (mut c, epoch) = joined("Pastor John");
        assert!(c.handle_event(RoomEvent::CameraAndMicResolved {
            epoch,
            result: Err(MediaError::PermissionDenied)
        }));
        let session = c.session().unwrap();
        assert!(matches!(
            session.local_media(),
            LocalMedia::Unavailable(MediaError::PermissionDenied)
        ));
        assert_eq!(
            session.local_preview(),
            crate::room::session::LocalPreview::Placeholder {
                initials: "P".to_string()
            }
        );
        assert_eq!(c.phase(), RoomPhase::Active);
        assert!(c.leave());
    }

    #[test]
    fn test_camera_toggle_hides_preview_but_keeps_track() {
        let (mut c, _, probes) = host_with_camera();
        assert_eq!(
            c.session().unwrap().local_preview(),
            crate::room::session::LocalPreview::Live {
                camera: "video".to_string()
            }
        );
        assert!(!c.toggle_camera().unwrap());
        assert!(matches!(
            c.session().unwrap().local_preview(),
            crate::room::session::LocalPreview::Placeholder { .. }
        ));
        assert!(probes.iter().all(|p| p.is_live()));
        assert!(!c.toggle_mic().unwrap());
        assert!(c.toggle_mic().unwrap());
    }

    #[test]
    fn test_screen_share_stop_paths_converge() {
        // Explicit stop.
        let (mut a, epoch_a, _) = host_with_camera();
        let (_, probes_a) = present(&mut a, epoch_a);
        assert!(a.session().unwrap().pip_visible());
        a.toggle_screen_share().unwrap();

        // Out-of-band end.
        let (mut b, epoch_b, _) = host_with_camera();
        let (stream_b, probes_b) = present(&mut b, epoch_b);
        assert!(b.handle_event(RoomEvent::ScreenShareEnded {
            epoch: epoch_b,
            stream: stream_b
        }));

        for c in [&a, &b] {
            let s = c.session().unwrap();
            assert!(matches!(s.screen(), ScreenShare::Off));
            assert!(!s.is_presenting());
            assert!(!s.pip_visible());
            assert!(!s.is_resizing_pip());
        }
        assert_eq!(probes_a[0].stop_calls(), 1);
        assert_eq!(probes_b[0].stop_calls(), 1);
    }

    #[test]
    fn test_stale_screen_end_is_ignored() {
        let (mut c, epoch, _) = host_with_camera();
        let (first, _) = present(&mut c, epoch);
        c.stop_screen_share().unwrap();
        let (_, probes) = present(&mut c, epoch);

        assert!(!c.handle_event(RoomEvent::ScreenShareEnded {
            epoch,
            stream: first
        }));
        assert!(c.session().unwrap().is_presenting());
        assert!(probes[0].is_live());
    }

    #[test]
    fn test_screen_request_in_flight_and_denied() {
        let (mut c, epoch, _) = host_with_camera();
        c.drain_effects();
        c.toggle_screen_share().unwrap();
        c.toggle_screen_share().unwrap();
        assert_eq!(
            c.drain_effects(),
            vec![Effect::StartDisplayCapture { epoch }]
        );
        assert!(matches!(c.session().unwrap().screen(), ScreenShare::Requesting));

        assert!(c.handle_event(RoomEvent::DisplayCaptureResolved {
            epoch,
            result: Err(MediaError::PermissionDenied)
        }));
        assert!(matches!(c.session().unwrap().screen(), ScreenShare::Off));
    }

    #[test]
    fn test_display_capture_after_stop_is_discarded() {
        let (mut c, epoch, _) = host_with_camera();
        c.toggle_screen_share().unwrap();
        // Requesting -> explicit stop cancels the pending request.
        assert!(!c.stop_screen_share().unwrap());
        let (s, probes) = stream(&[TrackKind::Screen]);
        assert!(!c.handle_event(RoomEvent::DisplayCaptureResolved {
            epoch,
            result: Ok(s)
        }));
        assert_eq!(probes[0].stop_calls(), 1);
        assert!(!c.session().unwrap().is_presenting());
    }

    #[test]
    fn test_non_host_moderation_is_a_no_op() {
        let (mut c, epoch) = joined("Sarah");
        c.handle_event(RoomEvent::AdmissionGranted { epoch });
        c.handle_event(RoomEvent::ParticipantJoined {
            epoch,
            name: "Mike".to_string(),
        });
        let mike = c.session().unwrap().roster().remote_participants()[0]
            .id
            .clone();

        assert!(!c.toggle_mute(&mike));
        assert!(!c.remove(&mike));
        assert!(!c.admit(&mike));
        assert!(!c.deny(&mike));
        let roster = c.session().unwrap().roster();
        assert_eq!(roster.len(), 2);
        assert!(!roster.get(&mike).unwrap().muted);

        // Guests never see the waiting room.
        assert!(!c.handle_event(RoomEvent::ParticipantArrived {
            epoch,
            name: "Grace".to_string()
        }));
    }

    #[test]
    fn test_host_moderation() {
        let (mut c, epoch, _) = host_with_camera();
        c.handle_event(RoomEvent::ParticipantArrived {
            epoch,
            name: "Grace".to_string(),
        });
        c.handle_event(RoomEvent::ParticipantArrived {
            epoch,
            name: "Daniel".to_string(),
        });
        let waiting: Vec<_> = c
            .session()
            .unwrap()
            .roster()
            .waiting()
            .map(|w| w.id.clone())
            .collect();

        assert!(c.admit(&waiting[0]));
        assert!(c.deny(&waiting[1]));
        assert!(!c.admit(&waiting[1]));

        let roster = c.session().unwrap().roster();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.waiting().len(), 0);
        let grace = roster.remote_participants()[0].id.clone();
        let local = roster.local().id.clone();

        assert!(c.toggle_mute(&grace));
        assert!(c.session().unwrap().roster().get(&grace).unwrap().muted);
        assert!(!c.remove(&local));
        assert!(c.remove(&grace));
        assert_eq!(c.session().unwrap().roster().len(), 1);
    }

    #[test]
    fn test_chat_scenario_with_remote_reaction() {
        let (mut c, epoch) = joined("Pastor John");
        c.handle_event(RoomEvent::ParticipantJoined {
            epoch,
            name: "Sarah".to_string(),
        });
        c.drain_effects();
        let id = c.send_message("Hi").unwrap().unwrap();
        assert!(matches!(
            c.drain_effects().last(),
            Some(Effect::ScheduleReplies { message, author, .. })
                if *message == id && author == "Sarah"
        ));

        assert!(c.react(&id, "👍").unwrap());
        assert!(c.handle_event(RoomEvent::RemoteReaction {
            epoch,
            message: id.clone(),
            author: "Sarah".to_string(),
            emoji: "👍".to_string(),
        }));
        assert!(c.react(&id, "👍").unwrap());

        let reactions = &c.session().unwrap().chat().get(&id).unwrap().reactions;
        assert_eq!(reactions.len(), 1);
        assert_eq!(
            reactions["👍"].iter().cloned().collect::<Vec<_>>(),
            vec!["Sarah".to_string()]
        );

        assert_eq!(c.send_message("   ").unwrap(), None);
        assert!(!c.react(&MessageId::new(), "👍").unwrap());
    }

    #[test]
    fn test_remote_message_appends_in_order() {
        let (mut c, epoch) = joined("Pastor John");
        c.handle_event(RoomEvent::ParticipantJoined {
            epoch,
            name: "Sarah".to_string(),
        });
        c.send_message("Welcome").unwrap();
        c.handle_event(RoomEvent::RemoteMessage {
            epoch,
            author: "Sarah".to_string(),
            text: "Good evening!".to_string(),
        });
        let authors: Vec<_> = c
            .session()
            .unwrap()
            .chat()
            .messages()
            .iter()
            .map(|m| m.author.clone())
            .collect();
        assert_eq!(authors, vec!["Pastor John", "Sarah"]);
    }

    #[test]
    fn test_removed_participant_can_no_longer_chat() {
        let (mut c, epoch) = joined("Pastor John");
        for name in ["Sarah", "Mike"] {
            c.handle_event(RoomEvent::ParticipantJoined {
                epoch,
                name: name.to_string(),
            });
        }
        let sarah = c.session().unwrap().roster().remote_participants()[0]
            .id
            .clone();
        assert!(c.remove(&sarah));
        c.drain_effects();

        let id = c.send_message("Let us pray").unwrap().unwrap();
        assert!(matches!(
            c.drain_effects().last(),
            Some(Effect::ScheduleReplies { author, .. }) if author == "Mike"
        ));

        assert!(!c.handle_event(RoomEvent::RemoteMessage {
            epoch,
            author: "Sarah".to_string(),
            text: "Good evening everyone!".to_string(),
        }));
        assert!(!c.handle_event(RoomEvent::RemoteReaction {
            epoch,
            message: id.clone(),
            author: "sarah ".to_string(),
            emoji: "🙏".to_string(),
        }));

        let chat = c.session().unwrap().chat();
        assert_eq!(chat.len(), 1);
        assert!(chat.get(&id).unwrap().reactions.is_empty());

        // Nobody left to answer: no reply is scheduled.
        let mike = c.session().unwrap().roster().remote_participants()[0]
            .id
            .clone();
        assert!(c.remove(&mike));
        c.drain_effects();
        c.send_message("Amen").unwrap();
        assert!(c.drain_effects().is_empty());
    }

    #[test]
    fn test_pip_resize_only_while_presenting() {
        let (mut c, epoch, _) = host_with_camera();
        assert!(c.begin_pip_resize(100).is_none());

        present(&mut c, epoch);
        let g = c.begin_pip_resize(500).unwrap();
        assert!(c.drag_pip_resize(g, 420));
        assert_eq!(c.session().unwrap().pip().width, 360);
        assert!(c.end_pip_resize(g));
        assert!(!c.drag_pip_resize(g, 0));

        // Leaving resets; a gesture leaked from the old session does nothing.
        let leaked = c.begin_pip_resize(500).unwrap();
        c.leave();
        let epoch = c.request_join(meeting()).unwrap();
        c.submit_name("Pastor John").unwrap();
        present(&mut c, epoch);
        assert_eq!(c.session().unwrap().pip(), PipDimensions::default());
        assert!(!c.drag_pip_resize(leaked, 0));
        assert_eq!(c.session().unwrap().pip(), PipDimensions::default());
    }

    #[test]
    fn test_interrupt_cancels_resize() {
        let (mut c, epoch, _) = host_with_camera();
        let (id, _) = present(&mut c, epoch);
        let g = c.begin_pip_resize(10).unwrap();
        c.handle_event(RoomEvent::ScreenShareEnded { epoch, stream: id });
        assert!(!c.session().unwrap().is_resizing_pip());
        assert!(!c.drag_pip_resize(g, 0));
    }
}
