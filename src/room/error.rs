//! Meeting room error types.
//!
//! Only `Validation` reaches the user as a message. `Permission` is logged and
//! swallowed by the controller, and `MediaAcquisition` degrades the room to
//! placeholder mode.

use thiserror::Error;

/// Failure to open a capture device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// The user (or platform policy) refused the permission prompt.
    #[error("permission denied")]
    PermissionDenied,

    /// No matching capture device is present.
    #[error("no capture device found")]
    NoDevice,

    /// The backend cannot provide this kind of capture at all.
    #[error("not supported by this media backend")]
    NotSupported,

    /// The device exists but failed to open or configure.
    #[error("device error: {0}")]
    Device(String),
}

/// Meeting room error type.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Input rejected before any state change (e.g. empty display name).
    #[error("{0}")]
    Validation(String),

    /// A host-only operation was attempted by a non-host, or a forbidden
    /// target was chosen (e.g. removing yourself).
    #[error("permission denied: {0}")]
    Permission(&'static str),

    /// Camera, microphone or screen capture could not be opened.
    #[error("media acquisition failed: {0}")]
    MediaAcquisition(#[from] MediaError),

    /// A join flow or session already exists in this client.
    #[error("already joining or in meeting {0}")]
    JoinInProgress(String),

    /// The operation is not valid in the controller's current phase.
    #[error("cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },
}

impl RoomError {
    /// Whether this error should be shown to the user.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, RoomError::Validation(_) | RoomError::JoinInProgress(_))
    }
}
