//! Simulated capture devices.
//!
//! Stand-in for a real permission prompt: each request waits a configurable
//! prompt delay, then grants, denies, or reports a missing device. Every track
//! handed out is observable through a `TrackProbe`, and an active screen share
//! can be ended out-of-band with `end_screen_share`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use super::error::MediaError;
use super::media::{DisplayCapture, MediaDevices, MediaStream, MediaTrack, TrackKind};

/// How a simulated permission prompt resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptOutcome {
    #[default]
    Grant,
    Deny,
    Missing,
}

impl PromptOutcome {
    fn resolve(self) -> Result<(), MediaError> {
        match self {
            PromptOutcome::Grant => Ok(()),
            PromptOutcome::Deny => Err(MediaError::PermissionDenied),
            PromptOutcome::Missing => Err(MediaError::NoDevice),
        }
    }
}

#[derive(Debug, Default)]
struct TrackState {
    live: AtomicBool,
    stops: AtomicUsize,
}

/// Test-side view of a simulated track.
#[derive(Debug, Clone)]
pub struct TrackProbe {
    #[cfg_attr(not(test), allow(dead_code))]
    kind: TrackKind,
    state: Arc<TrackState>,
}

impl TrackProbe {
    #[cfg(test)]
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Number of times `stop` was invoked on the track.
    #[cfg(test)]
    pub fn stop_calls(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }
}

/// A track with no hardware behind it.
#[derive(Debug)]
pub struct SimulatedTrack {
    kind: TrackKind,
    label: String,
    state: Arc<TrackState>,
}

impl SimulatedTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> (Self, TrackProbe) {
        let state = Arc::new(TrackState::default());
        state.live.store(true, Ordering::SeqCst);
        let probe = TrackProbe {
            kind,
            state: Arc::clone(&state),
        };
        (
            Self {
                kind,
                label: label.into(),
                state,
            },
            probe,
        )
    }
}

impl MediaTrack for SimulatedTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        self.state.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.state.live.load(Ordering::SeqCst)
    }
}

/// Behaviour of the simulated backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedDeviceConfig {
    pub camera: PromptOutcome,
    pub screen: PromptOutcome,
    /// Time the fake permission prompt stays open.
    pub prompt_delay_ms: u64,
}

impl Default for SimulatedDeviceConfig {
    fn default() -> Self {
        Self {
            camera: PromptOutcome::Grant,
            screen: PromptOutcome::Grant,
            prompt_delay_ms: 300,
        }
    }
}

#[derive(Default)]
struct Shared {
    /// Live tracks, plus any stopped since the last track was opened.
    probes: Vec<TrackProbe>,
    screen_end: Option<oneshot::Sender<()>>,
}

/// Simulated `MediaDevices` backend. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SimulatedDevices {
    config: SimulatedDeviceConfig,
    shared: Arc<Mutex<Shared>>,
}

impl SimulatedDevices {
    pub fn new(config: SimulatedDeviceConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        // A panicked holder can't leave the probe list inconsistent.
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn track(&self, kind: TrackKind, label: &str) -> Box<dyn MediaTrack> {
        let (track, probe) = SimulatedTrack::new(kind, label);
        let mut shared = self.lock();
        shared.probes.retain(TrackProbe::is_live);
        shared.probes.push(probe);
        Box::new(track)
    }

    async fn prompt(&self, outcome: PromptOutcome) -> Result<(), MediaError> {
        if self.config.prompt_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.prompt_delay_ms)).await;
        }
        outcome.resolve()
    }

    /// Tracks handed out that were still live when the latest one opened.
    #[cfg(test)]
    pub fn probes(&self) -> Vec<TrackProbe> {
        self.lock().probes.clone()
    }

    /// Tracks handed out that are still running.
    pub fn live_tracks(&self) -> usize {
        self.lock().probes.iter().filter(|p| p.is_live()).count()
    }

    /// Simulate the platform terminating the current screen capture.
    ///
    /// Returns false when no capture is active.
    pub fn end_screen_share(&self) -> bool {
        match self.lock().screen_end.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl MediaDevices for SimulatedDevices {
    async fn open_user_media(&self) -> Result<MediaStream, MediaError> {
        self.prompt(self.config.camera).await?;
        let tracks = vec![
            self.track(TrackKind::Audio, "Simulated Microphone"),
            self.track(TrackKind::Video, "Simulated Camera"),
        ];
        tracing::debug!("Simulated camera and microphone granted");
        Ok(MediaStream::new(tracks))
    }

    async fn open_display_media(&self) -> Result<DisplayCapture, MediaError> {
        self.prompt(self.config.screen).await?;
        let stream = MediaStream::new(vec![self.track(TrackKind::Screen, "Simulated Screen")]);
        let (tx, rx) = oneshot::channel();
        self.lock().screen_end = Some(tx);
        tracing::debug!("Simulated screen capture granted");
        Ok(DisplayCapture { stream, ended: rx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::media::discard_stream;

    fn instant(camera: PromptOutcome, screen: PromptOutcome) -> SimulatedDevices {
        SimulatedDevices::new(SimulatedDeviceConfig {
            camera,
            screen,
            prompt_delay_ms: 0,
        })
    }

    #[tokio::test]
    async fn test_grant_yields_audio_and_video() {
        let devices = instant(PromptOutcome::Grant, PromptOutcome::Grant);
        let stream = devices.open_user_media().await.unwrap();
        assert!(stream.has_track(TrackKind::Audio));
        assert!(stream.has_track(TrackKind::Video));
        assert_eq!(devices.live_tracks(), 2);
    }

    #[tokio::test]
    async fn test_deny_and_missing() {
        let devices = instant(PromptOutcome::Deny, PromptOutcome::Missing);
        assert_eq!(
            devices.open_user_media().await.unwrap_err(),
            MediaError::PermissionDenied
        );
        assert_eq!(
            devices.open_display_media().await.err(),
            Some(MediaError::NoDevice)
        );
        assert!(devices.probes().is_empty());
    }

    #[tokio::test]
    async fn test_stopped_tracks_are_forgotten() {
        let devices = instant(PromptOutcome::Grant, PromptOutcome::Grant);
        for _ in 0..3 {
            let stream = devices.open_user_media().await.unwrap();
            discard_stream(stream);
        }
        assert_eq!(devices.live_tracks(), 0);

        let _stream = devices.open_user_media().await.unwrap();
        assert_eq!(devices.probes().len(), 2);
        assert_eq!(devices.live_tracks(), 2);
    }

    #[tokio::test]
    async fn test_end_screen_share_fires_once() {
        let devices = instant(PromptOutcome::Grant, PromptOutcome::Grant);
        assert!(!devices.end_screen_share());

        let capture = devices.open_display_media().await.unwrap();
        assert!(devices.end_screen_share());
        assert!(capture.ended.await.is_ok());
        assert!(!devices.end_screen_share());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_delay() {
        let devices = SimulatedDevices::new(SimulatedDeviceConfig::default());
        let start = tokio::time::Instant::now();
        devices.open_user_media().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
