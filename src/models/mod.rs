//! Data models for gatherings, participants and chat

mod chat;
mod meeting;
mod participant;

pub use chat::*;
pub use meeting::*;
pub use participant::*;
