//! V4L2 camera backend.
//!
//! Opens a real camera with the `v4l` crate and runs an mmap capture thread
//! for as long as the track is live. Frames are counted, not rendered: the
//! terminal room only needs to know the camera is producing. There is no
//! audio capture or screen capture on this backend.

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::error::MediaError;
use super::media::{DisplayCapture, MediaDevices, MediaStream, MediaTrack, TrackKind};

/// Capture settings for the V4L2 backend.
#[derive(Debug, Clone)]
pub struct V4lSettings {
    pub device_path: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for V4lSettings {
    fn default() -> Self {
        Self {
            device_path: "/dev/video0".to_string(),
            width: 320,
            height: 240,
            fps: 15,
        }
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    stop: AtomicBool,
    running: AtomicBool,
    frames: AtomicU64,
}

/// Live camera track backed by a capture thread.
#[derive(Debug)]
pub struct V4lCameraTrack {
    label: String,
    state: Arc<CaptureState>,
}

impl V4lCameraTrack {
    /// Frames read from the device so far.
    pub fn frames(&self) -> u64 {
        self.state.frames.load(Ordering::Relaxed)
    }
}

impl MediaTrack for V4lCameraTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        // The capture thread releases the device when it sees the flag.
        self.state.stop.store(true, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        !self.state.stop.load(Ordering::SeqCst) && self.state.running.load(Ordering::SeqCst)
    }
}

/// `MediaDevices` backed by a V4L2 camera.
pub struct V4lDevices {
    settings: V4lSettings,
}

impl V4lDevices {
    pub fn new(settings: V4lSettings) -> Self {
        Self { settings }
    }
}

fn media_error(e: io::Error) -> MediaError {
    match e.kind() {
        io::ErrorKind::PermissionDenied => MediaError::PermissionDenied,
        io::ErrorKind::NotFound => MediaError::NoDevice,
        _ => MediaError::Device(e.to_string()),
    }
}

/// Open the device and start the capture thread. Blocking.
fn open_camera(settings: &V4lSettings) -> Result<V4lCameraTrack, MediaError> {
    let dev = Device::with_path(&settings.device_path).map_err(media_error)?;

    let mut fmt = dev.format().map_err(media_error)?;
    fmt.width = settings.width;
    fmt.height = settings.height;
    fmt.fourcc = FourCC::new(b"YUYV");
    let actual = match dev.set_format(&fmt) {
        Ok(f) => f,
        Err(_) => {
            fmt.fourcc = FourCC::new(b"MJPG");
            dev.set_format(&fmt).map_err(media_error)?
        }
    };

    if let Ok(mut params) = dev.params() {
        params.interval = v4l::Fraction::new(1, settings.fps);
        let _ = dev.set_params(&params);
    }

    let label = match dev.query_caps() {
        Ok(caps) => caps.card,
        Err(_) => settings.device_path.clone(),
    };
    tracing::info!(
        "Camera opened: {} {}x{} fourcc={} (requested {}x{} @ {}fps)",
        label,
        actual.width,
        actual.height,
        actual.fourcc,
        settings.width,
        settings.height,
        settings.fps,
    );

    let state = Arc::new(CaptureState::default());
    state.running.store(true, Ordering::SeqCst);
    let thread_state = Arc::clone(&state);
    std::thread::spawn(move || {
        if let Err(e) = capture_loop(&dev, &thread_state) {
            tracing::error!("Camera capture loop exited: {}", e);
        }
        thread_state.running.store(false, Ordering::SeqCst);
        tracing::debug!(
            frames = thread_state.frames.load(Ordering::Relaxed),
            "Camera released"
        );
    });

    Ok(V4lCameraTrack { label, state })
}

fn capture_loop(dev: &Device, state: &CaptureState) -> io::Result<()> {
    let mut stream = Stream::with_buffers(dev, Type::VideoCapture, 4)?;
    while !state.stop.load(Ordering::SeqCst) {
        stream.next()?;
        state.frames.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}

/// Open the camera, capture for `duration`, and return the frame count.
/// Blocking; used by the `cam-test` command.
pub fn cam_test(settings: &V4lSettings, duration: std::time::Duration) -> Result<u64, MediaError> {
    let track = open_camera(settings)?;
    std::thread::sleep(duration);
    let frames = track.frames();
    track.stop();
    if frames == 0 {
        return Err(MediaError::Device("no frames captured".to_string()));
    }
    Ok(frames)
}

#[async_trait]
impl MediaDevices for V4lDevices {
    async fn open_user_media(&self) -> Result<MediaStream, MediaError> {
        let settings = self.settings.clone();
        let track = tokio::task::spawn_blocking(move || open_camera(&settings))
            .await
            .map_err(|e| MediaError::Device(e.to_string()))??;
        Ok(MediaStream::new(vec![Box::new(track)]))
    }

    async fn open_display_media(&self) -> Result<DisplayCapture, MediaError> {
        Err(MediaError::NotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_map_to_media_errors() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(media_error(denied), MediaError::PermissionDenied);
        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(media_error(missing), MediaError::NoDevice);
        assert!(matches!(
            media_error(io::Error::other("busy")),
            MediaError::Device(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_device_reports_no_device() {
        let devices = V4lDevices::new(V4lSettings {
            device_path: "/dev/does-not-exist-video".to_string(),
            ..V4lSettings::default()
        });
        assert_eq!(
            devices.open_user_media().await.unwrap_err(),
            MediaError::NoDevice
        );
        assert_eq!(
            devices.open_display_media().await.err(),
            Some(MediaError::NotSupported)
        );
    }

    #[test]
    fn test_stopped_track_is_not_live() {
        let state = Arc::new(CaptureState::default());
        state.running.store(true, Ordering::SeqCst);
        let track = V4lCameraTrack {
            label: "test".to_string(),
            state,
        };
        assert!(track.is_live());
        track.stop();
        assert!(!track.is_live());
        assert_eq!(track.frames(), 0);
    }
}
