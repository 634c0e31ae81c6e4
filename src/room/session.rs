//! The session-state object: everything one meeting visit owns.
//!
//! Presentation code reads a `MeetingSession` through the controller and never
//! keeps its own copy. Mutation happens only through the controller.

use crate::models::{initials, Meeting};

use super::chat::ChatLog;
use super::error::MediaError;
use super::layout::{PipDimensions, PipResizer};
use super::media::{MediaHandle, StopReason, StreamId, TrackKind};
use super::roster::Roster;

/// Generation counter of join attempts. Every effect and event is tagged with
/// the epoch it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionEpoch(u64);

impl SessionEpoch {
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for SessionEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Camera + microphone acquisition state.
#[derive(Debug, Default)]
pub enum LocalMedia {
    /// Permission prompt outstanding.
    #[default]
    Pending,
    Live(MediaHandle),
    /// Acquisition failed; the room runs in placeholder mode.
    Unavailable(MediaError),
}

/// Screen share state.
#[derive(Debug, Default)]
pub enum ScreenShare {
    #[default]
    Off,
    /// Display-capture prompt outstanding.
    Requesting,
    Presenting(MediaHandle),
}

/// What the local tile should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalPreview {
    /// Camera feed, by the label of its video track.
    Live { camera: String },
    Placeholder { initials: String },
}

/// State of one meeting visit, from name submission until leave.
#[derive(Debug)]
pub struct MeetingSession {
    epoch: SessionEpoch,
    meeting: Meeting,
    pub(super) roster: Roster,
    pub(super) chat: ChatLog,
    pub(super) local_media: LocalMedia,
    pub(super) screen: ScreenShare,
    pub(super) pip: PipResizer,
    pub(super) camera_on: bool,
    pub(super) mic_on: bool,
}

impl MeetingSession {
    pub fn new(epoch: SessionEpoch, meeting: Meeting, roster: Roster) -> Self {
        Self {
            epoch,
            meeting,
            roster,
            chat: ChatLog::new(),
            local_media: LocalMedia::default(),
            screen: ScreenShare::default(),
            pip: PipResizer::new(epoch),
            camera_on: true,
            mic_on: true,
        }
    }

    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    pub fn meeting(&self) -> &Meeting {
        &self.meeting
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn local_media(&self) -> &LocalMedia {
        &self.local_media
    }

    pub fn screen(&self) -> &ScreenShare {
        &self.screen
    }

    pub fn camera_on(&self) -> bool {
        self.camera_on
    }

    pub fn mic_on(&self) -> bool {
        self.mic_on
    }

    pub fn is_presenting(&self) -> bool {
        matches!(self.screen, ScreenShare::Presenting(_))
    }

    /// The self-view overlay is shown exactly while presenting.
    pub fn pip_visible(&self) -> bool {
        self.is_presenting()
    }

    pub fn pip(&self) -> PipDimensions {
        self.pip.dimensions()
    }

    pub fn is_resizing_pip(&self) -> bool {
        self.pip.is_resizing()
    }

    pub fn local_preview(&self) -> LocalPreview {
        match (&self.local_media, self.camera_on) {
            (LocalMedia::Live(handle), true) => LocalPreview::Live {
                camera: handle
                    .stream()
                    .tracks()
                    .iter()
                    .find(|t| t.kind() == TrackKind::Video)
                    .map(|t| t.label().to_string())
                    .unwrap_or_else(|| "camera".to_string()),
            },
            _ => LocalPreview::Placeholder {
                initials: initials(&self.roster.local().name),
            },
        }
    }

    /// Tracks still running across the camera and screen handles.
    pub fn open_tracks(&self) -> usize {
        let camera = match &self.local_media {
            LocalMedia::Live(h) => h.live_tracks(),
            _ => 0,
        };
        let screen = match &self.screen {
            ScreenShare::Presenting(h) => h.live_tracks(),
            _ => 0,
        };
        camera + screen
    }

    pub(super) fn screen_stream_id(&self) -> Option<&StreamId> {
        match &self.screen {
            ScreenShare::Presenting(h) => Some(h.id()),
            _ => None,
        }
    }

    /// Stop the screen handle (if any) and return to not presenting.
    pub(super) fn stop_screen(&mut self, reason: StopReason) -> bool {
        let was_presenting = match std::mem::take(&mut self.screen) {
            ScreenShare::Presenting(mut handle) => {
                let stopped = handle.stop();
                tracing::info!(stream = %handle.id(), ?reason, stopped, "Screen share stopped");
                true
            }
            ScreenShare::Requesting | ScreenShare::Off => false,
        };
        self.pip.cancel();
        was_presenting
    }

    /// Stop every open handle. Called once when the session ends.
    pub(super) fn release_media(&mut self) -> usize {
        self.stop_screen(StopReason::Leave);
        match std::mem::take(&mut self.local_media) {
            LocalMedia::Live(mut handle) => handle.stop(),
            LocalMedia::Pending | LocalMedia::Unavailable(_) => 0,
        }
    }
}
