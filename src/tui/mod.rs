//! Terminal user interface for the meeting room
//!
//! Ratatui front end over the room controller and driver.

mod app;
mod chat_panel;
mod help;
mod input;
pub mod log_capture;
mod log_pane;
mod people;
mod stage;
mod ui;

pub use app::{run, App, RoomOptions};
