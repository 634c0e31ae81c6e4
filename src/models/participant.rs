//! Roster entities

use chrono::{DateTime, Utc};
use std::fmt;

/// Identifier of a participant or waiting entry, unique within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Someone currently in the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveParticipant {
    pub id: ParticipantId,
    pub name: String,
    pub is_host: bool,
    /// Host-set moderation indicator. Does not gate the participant's audio.
    pub muted: bool,
}

impl LiveParticipant {
    pub fn new(name: impl Into<String>, is_host: bool) -> Self {
        Self {
            id: ParticipantId::new(),
            name: name.into(),
            is_host,
            muted: false,
        }
    }

    /// Avatar placeholder text: the first character of the name, uppercased.
    pub fn initials(&self) -> String {
        initials(&self.name)
    }
}

/// A join request parked in the waiting room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingEntry {
    pub id: ParticipantId,
    pub name: String,
    pub arrived_at: DateTime<Utc>,
}

impl WaitingEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ParticipantId::new(),
            name: name.into(),
            arrived_at: Utc::now(),
        }
    }
}

pub fn initials(name: &str) -> String {
    name.trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "?".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials() {
        assert_eq!(initials("sarah"), "S");
        assert_eq!(initials("  Mike"), "M");
        assert_eq!(initials(""), "?");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = LiveParticipant::new("A", false);
        let b = LiveParticipant::new("A", false);
        assert_ne!(a.id, b.id);
        assert!(!a.muted);
    }
}
