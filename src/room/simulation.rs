//! Scripted remote activity.
//!
//! There is no transport: the other people in the room are played by a
//! script of fixed-delay events, loaded from the config file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{names_match, Meeting};

/// A waiting-room arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedArrival {
    pub name: String,
    pub after_ms: u64,
}

/// A chat message from a remote participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedMessage {
    pub author: String,
    pub text: String,
    pub after_ms: u64,
}

/// How a remote participant responds to the local user's messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedReaction {
    pub emoji: String,
    pub after_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationScript {
    /// Remote participants already in the call when the local user arrives.
    pub participants: Vec<String>,
    /// People knocking at the waiting room. Only played to a host.
    pub arrivals: Vec<ScriptedArrival>,
    pub greetings: Vec<ScriptedMessage>,
    /// Reaction to every message the local user sends, if any.
    pub reaction: Option<ScriptedReaction>,
}

impl Default for SimulationScript {
    fn default() -> Self {
        Self {
            participants: vec!["Sarah".to_string(), "Mike".to_string()],
            arrivals: vec![
                ScriptedArrival {
                    name: "Grace".to_string(),
                    after_ms: 5_000,
                },
                ScriptedArrival {
                    name: "Daniel".to_string(),
                    after_ms: 12_000,
                },
            ],
            greetings: vec![
                ScriptedMessage {
                    author: "Sarah".to_string(),
                    text: "Good evening everyone!".to_string(),
                    after_ms: 2_000,
                },
                ScriptedMessage {
                    author: "Mike".to_string(),
                    text: "Hi all, glad to be here.".to_string(),
                    after_ms: 4_000,
                },
            ],
            reaction: Some(ScriptedReaction {
                emoji: "🙏".to_string(),
                after_ms: 1_500,
            }),
        }
    }
}

/// One step of a planned run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    Join { name: String },
    Arrive { name: String },
    Say { author: String, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub after: Duration,
    pub action: ScriptAction,
}

impl SimulationScript {
    /// Remote participants present at join, host first when the local user
    /// is not the host. Never includes the local user.
    pub fn remote_participants(&self, meeting: &Meeting, local_name: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let candidates = std::iter::once(&meeting.host).chain(self.participants.iter());
        for name in candidates {
            let name = name.trim();
            if name.is_empty()
                || names_match(name, local_name)
                || names.iter().any(|n| names_match(n, name))
            {
                continue;
            }
            names.push(name.to_string());
        }
        names
    }

    /// Expand the script for one session, ordered by delay.
    pub fn plan(
        &self,
        meeting: &Meeting,
        local_name: &str,
        local_is_host: bool,
    ) -> Vec<ScriptStep> {
        let present = self.remote_participants(meeting, local_name);

        let mut steps: Vec<ScriptStep> = present
            .iter()
            .map(|name| ScriptStep {
                after: Duration::ZERO,
                action: ScriptAction::Join { name: name.clone() },
            })
            .collect();

        if local_is_host {
            steps.extend(self.arrivals.iter().map(|a| ScriptStep {
                after: Duration::from_millis(a.after_ms),
                action: ScriptAction::Arrive {
                    name: a.name.clone(),
                },
            }));
        }

        // A greeting is only spoken by someone who is actually in the room.
        steps.extend(
            self.greetings
                .iter()
                .filter(|g| present.iter().any(|p| names_match(p, &g.author)))
                .map(|g| ScriptStep {
                    after: Duration::from_millis(g.after_ms),
                    action: ScriptAction::Say {
                        author: g.author.clone(),
                        text: g.text.clone(),
                    },
                }),
        );

        steps.sort_by_key(|s| s.after);
        steps
    }
}
