//! The live meeting room.
//!
//! `controller` owns the state machine and the session object, `driver`
//! executes its effects on tokio. The remaining modules are the pieces a
//! session is built from.

pub mod chat;
pub mod controller;
pub mod driver;
pub mod error;
pub mod headless;
pub mod layout;
pub mod media;
pub mod roster;
pub mod session;
pub mod sim_devices;
pub mod simulation;
#[cfg(feature = "video-capture")]
pub mod v4l_devices;

pub use controller::{MeetingController, RoomEvent, RoomPhase, RoomSettings};
pub use driver::RoomDriver;
pub use error::RoomError;
pub use session::{LocalMedia, LocalPreview, MeetingSession, ScreenShare};
