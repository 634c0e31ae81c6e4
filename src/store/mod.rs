//! Read-only meeting list and share links.
//!
//! Meetings are scheduled elsewhere; this client only reads them from a TOML
//! file of `[[meetings]]` tables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::models::Meeting;

/// Source of scheduled meetings.
pub trait MeetingStore {
    fn list(&self) -> Result<Vec<Meeting>>;

    fn find(&self, id: &str) -> Result<Option<Meeting>> {
        Ok(self.list()?.into_iter().find(|m| m.id == id))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MeetingsFile {
    #[serde(default)]
    meetings: Vec<Meeting>,
}

/// Meetings read from a TOML file, with a built-in list when it is missing.
pub struct FileMeetingStore {
    path: PathBuf,
}

impl FileMeetingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MeetingStore for FileMeetingStore {
    fn list(&self) -> Result<Vec<Meeting>> {
        if !self.path.exists() {
            tracing::debug!(
                "No meetings file at {}, using built-in schedule",
                self.path.display()
            );
            return Ok(seed_meetings());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read meetings file {}", self.path.display()))?;
        let file: MeetingsFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse meetings file {}", self.path.display()))?;
        Ok(file.meetings)
    }
}

/// Shareable join link for a meeting.
pub fn share_link(domain: &str, meeting_id: &str) -> String {
    format!("https://{}/meet/{}", domain.trim_end_matches('/'), meeting_id)
}

/// Print the meeting list to stdout.
pub fn print_meetings(meetings: &[Meeting], link_domain: &str) {
    println!("\nUpcoming meetings:");
    println!("{:-<60}", "");
    if meetings.is_empty() {
        println!("  (no meetings scheduled)");
        return;
    }
    for m in meetings {
        println!("{}", m.title);
        println!("  ID: {}", m.id);
        println!("  When: {}  Host: {}", m.start_time, m.host);
        if m.participants > 0 {
            println!("  Waiting: {}", m.participants);
        }
        if !m.description.is_empty() {
            println!("  {}", m.description);
        }
        println!("  Link: {}", share_link(link_domain, &m.id));
        println!();
    }
}

fn meeting(
    id: &str,
    title: &str,
    host: &str,
    start_time: &str,
    description: &str,
    participants: u32,
) -> Meeting {
    Meeting {
        id: id.to_string(),
        title: title.to_string(),
        host: host.to_string(),
        start_time: start_time.to_string(),
        description: description.to_string(),
        participants,
    }
}

/// Schedule shown before any meetings file exists.
pub fn seed_meetings() -> Vec<Meeting> {
    vec![
        meeting(
            "sunday-service",
            "Sunday Worship Service",
            "Pastor John",
            "Sun 10:00 AM",
            "Weekly worship, message and communion.",
            12,
        ),
        meeting(
            "bible-study",
            "Wednesday Bible Study",
            "Pastor John",
            "Wed 7:00 PM",
            "Walking through the Gospel of John together.",
            5,
        ),
        meeting(
            "youth-night",
            "Youth Night",
            "Sarah",
            "Fri 6:30 PM",
            "Games, worship and small groups for students.",
            3,
        ),
        meeting(
            "prayer-circle",
            "Morning Prayer Circle",
            "Mike",
            "Mon 6:30 AM",
            "A short time of prayer before the work week.",
            0,
        ),
    ]
}
