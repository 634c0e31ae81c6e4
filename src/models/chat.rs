//! Chat entities

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of a chat message within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat message with its reactions.
///
/// `reactions` maps an emoji to the names of everyone who applied it. A key is
/// never present with an empty set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub author: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub reactions: BTreeMap<String, BTreeSet<String>>,
}

impl ChatMessage {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            author: author.into(),
            text: text.into(),
            sent_at: Utc::now(),
            reactions: BTreeMap::new(),
        }
    }
}

/// One emoji's aggregate as shown under a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: usize,
    /// Whether the viewing user is among the supporters.
    pub mine: bool,
}
