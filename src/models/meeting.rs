//! Meeting records as published by the content store

use serde::{Deserialize, Serialize};

/// A scheduled gathering.
///
/// Created by the admin scheduling surface; the meeting room only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    /// Display name of the host. A joining user whose name matches this
    /// (trimmed, case-insensitive) gets host privileges.
    pub host: String,
    /// Free-form schedule string, e.g. "Wed 7:00 PM".
    pub start_time: String,
    #[serde(default)]
    pub description: String,
    /// Waiting-participant counter shown in the meeting list. Display only.
    #[serde(default)]
    pub participants: u32,
}

impl Meeting {
    /// Whether `name` identifies this meeting's host.
    pub fn is_hosted_by(&self, name: &str) -> bool {
        names_match(&self.host, name)
    }
}

/// Trimmed, case-insensitive display name comparison.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
