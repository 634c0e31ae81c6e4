//! Media acquisition: capture device access and owned stream handles.
//!
//! A `MediaDevices` backend opens streams; the session wraps each opened
//! stream in a `MediaHandle`, which is the only thing allowed to stop its
//! tracks. Stopping is exactly-once: a second `stop()` is a no-op, and a
//! handle dropped without being stopped stops itself.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::oneshot;

use super::error::MediaError;

/// Kind of a capture track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
    Screen,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
            TrackKind::Screen => "screen",
        }
    }
}

/// A single live capture track owned by some backend.
///
/// `stop` releases the hardware (and its activity indicator). Implementations
/// must tolerate repeated calls.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn kind(&self) -> TrackKind;
    fn label(&self) -> &str;
    fn stop(&self);
    fn is_live(&self) -> bool;
}

/// Identifier of an opened stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(String);

impl StreamId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A set of tracks opened together by one permission prompt.
#[derive(Debug)]
pub struct MediaStream {
    id: StreamId,
    tracks: Vec<Box<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self {
            id: StreamId::new(),
            tracks,
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    pub fn tracks(&self) -> &[Box<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind() == kind)
    }
}

/// A display capture plus its out-of-band termination signal.
///
/// `ended` resolves when the platform or the user stops the capture outside
/// the app (the "stop sharing" bar, a closed window, ...).
pub struct DisplayCapture {
    pub stream: MediaStream,
    pub ended: oneshot::Receiver<()>,
}

/// Permission-gated access to capture devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open a combined microphone + camera stream.
    async fn open_user_media(&self) -> Result<MediaStream, MediaError>;

    /// Open a screen capture stream.
    async fn open_display_media(&self) -> Result<DisplayCapture, MediaError>;
}

/// Why a screen share ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user pressed stop in the room.
    Explicit,
    /// The capture was terminated outside the app. A normal transition.
    Interrupted,
    /// The session ended.
    Leave,
}

/// Exclusive owner of an opened stream.
#[derive(Debug)]
pub struct MediaHandle {
    stream: MediaStream,
    stopped: bool,
}

impl MediaHandle {
    pub fn new(stream: MediaStream) -> Self {
        Self {
            stream,
            stopped: false,
        }
    }

    pub fn id(&self) -> &StreamId {
        self.stream.id()
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    /// Tracks that are still running.
    pub fn live_tracks(&self) -> usize {
        if self.stopped {
            return 0;
        }
        self.stream.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Stop every track. Returns how many tracks were stopped by this call.
    pub fn stop(&mut self) -> usize {
        if self.stopped {
            return 0;
        }
        self.stopped = true;
        for track in &self.stream.tracks {
            track.stop();
            tracing::debug!(
                stream = %self.stream.id,
                kind = track.kind().as_str(),
                label = track.label(),
                "Track stopped"
            );
        }
        self.stream.tracks.len()
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        if !self.stopped {
            tracing::warn!(stream = %self.stream.id, "Media handle dropped while live, stopping");
            self.stop();
        }
    }
}

/// Stop an orphaned stream that arrived for a session that no longer exists.
pub fn discard_stream(stream: MediaStream) {
    let mut handle = MediaHandle::new(stream);
    let stopped = handle.stop();
    tracing::debug!(stream = %handle.id(), stopped, "Discarded stale stream");
}
