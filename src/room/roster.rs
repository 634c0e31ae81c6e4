//! Participant registry and waiting-room gate.
//!
//! Host-only operations check the local participant's host flag before
//! touching anything. A rejected call returns `RoomError::Permission` and
//! leaves the roster untouched.

use std::collections::VecDeque;

use crate::models::{names_match, LiveParticipant, ParticipantId, WaitingEntry};

use super::error::RoomError;

/// Roster of one session: the local participant first, then everyone else in
/// join order, plus the queue of people waiting to be let in.
#[derive(Debug, Clone)]
pub struct Roster {
    host_name: String,
    participants: Vec<LiveParticipant>,
    waiting: VecDeque<WaitingEntry>,
}

impl Roster {
    /// Create a roster containing only the local participant.
    pub fn new(local: LiveParticipant, host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            participants: vec![local],
            waiting: VecDeque::new(),
        }
    }

    pub fn local(&self) -> &LiveParticipant {
        // The local participant is inserted at construction and never removed.
        &self.participants[0]
    }

    pub fn local_is_host(&self) -> bool {
        self.local().is_host
    }

    pub fn participants(&self) -> &[LiveParticipant] {
        &self.participants
    }

    pub fn remote_participants(&self) -> &[LiveParticipant] {
        &self.participants[1..]
    }

    pub fn waiting(&self) -> impl ExactSizeIterator<Item = &WaitingEntry> {
        self.waiting.iter()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&LiveParticipant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.participants.iter().any(|p| names_match(&p.name, name))
    }

    /// Add a participant who is already in the call (simulation seeding).
    pub fn seed(&mut self, name: &str) -> Option<ParticipantId> {
        let name = name.trim();
        if name.is_empty() || self.contains_name(name) {
            return None;
        }
        let participant = LiveParticipant::new(name, names_match(&self.host_name, name));
        let id = participant.id.clone();
        self.participants.push(participant);
        Some(id)
    }

    /// Park a join request in the waiting room.
    pub fn enqueue(&mut self, name: &str) -> Option<ParticipantId> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let entry = WaitingEntry::new(name);
        let id = entry.id.clone();
        tracing::info!(waiting_id = %id, name, "Participant waiting for admission");
        self.waiting.push_back(entry);
        Some(id)
    }

    fn require_host(&self, operation: &'static str) -> Result<(), RoomError> {
        if self.local_is_host() {
            Ok(())
        } else {
            Err(RoomError::Permission(operation))
        }
    }

    fn take_waiting(&mut self, id: &ParticipantId) -> Option<WaitingEntry> {
        let pos = self.waiting.iter().position(|e| &e.id == id)?;
        self.waiting.remove(pos)
    }

    /// Promote a waiting entry to the roster. Unknown ids are a no-op.
    ///
    /// Returns whether the roster changed.
    pub fn admit(&mut self, id: &ParticipantId) -> Result<bool, RoomError> {
        self.require_host("only the host can admit participants")?;
        let Some(entry) = self.take_waiting(id) else {
            return Ok(false);
        };
        let is_host = names_match(&self.host_name, &entry.name);
        self.participants.push(LiveParticipant {
            id: entry.id,
            name: entry.name,
            is_host,
            muted: false,
        });
        Ok(true)
    }

    /// Discard a waiting entry without admitting it.
    pub fn deny(&mut self, id: &ParticipantId) -> Result<bool, RoomError> {
        self.require_host("only the host can deny participants")?;
        Ok(self.take_waiting(id).is_some())
    }

    /// Remove a remote participant from the call.
    pub fn remove(&mut self, id: &ParticipantId) -> Result<bool, RoomError> {
        self.require_host("only the host can remove participants")?;
        if &self.local().id == id {
            return Err(RoomError::Permission("use leave to exit the meeting"));
        }
        let before = self.participants.len();
        self.participants.retain(|p| &p.id != id);
        Ok(self.participants.len() != before)
    }

    /// Flip a participant's mute indicator.
    pub fn toggle_mute(&mut self, id: &ParticipantId) -> Result<bool, RoomError> {
        self.require_host("only the host can mute participants")?;
        match self.participants.iter_mut().find(|p| &p.id == id) {
            Some(p) => {
                p.muted = !p.muted;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_roster() -> Roster {
        Roster::new(LiveParticipant::new("Pastor John", true), "Pastor John")
    }

    fn guest_roster() -> Roster {
        Roster::new(LiveParticipant::new("Sarah", false), "Pastor John")
    }

    #[test]
    fn test_local_first_and_seed_dedup() {
        let mut roster = host_roster();
        assert!(roster.seed("Sarah").is_some());
        assert!(roster.seed("sarah ").is_none());
        assert!(roster.seed("pastor john").is_none());
        assert!(roster.seed("   ").is_none());
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.local().name, "Pastor John");
        assert_eq!(roster.remote_participants()[0].name, "Sarah");
    }

    #[test]
    fn test_seeded_host_flag_follows_meeting_host() {
        let mut roster = guest_roster();
        let id = roster.seed("Pastor John").unwrap();
        assert!(roster.get(&id).unwrap().is_host);
        assert!(!roster.local_is_host());
    }

    #[test]
    fn test_admit_promotes_unmuted() {
        let mut roster = host_roster();
        let id = roster.enqueue("Grace").unwrap();
        assert_eq!(roster.waiting().len(), 1);

        assert!(roster.admit(&id).unwrap());
        assert_eq!(roster.waiting().len(), 0);
        let p = roster.get(&id).unwrap();
        assert_eq!(p.name, "Grace");
        assert!(!p.muted);
        assert!(!p.is_host);

        // Second admit of the same id is a silent no-op.
        assert!(!roster.admit(&id).unwrap());
    }

    #[test]
    fn test_deny_discards() {
        let mut roster = host_roster();
        let id = roster.enqueue("Daniel").unwrap();
        assert!(roster.deny(&id).unwrap());
        assert_eq!(roster.waiting().len(), 0);
        assert!(roster.get(&id).is_none());
        assert!(!roster.deny(&id).unwrap());
    }

    #[test]
    fn test_remove_rejects_local() {
        let mut roster = host_roster();
        let local = roster.local().id.clone();
        assert!(matches!(
            roster.remove(&local),
            Err(RoomError::Permission(_))
        ));
        assert_eq!(roster.len(), 1);

        let sarah = roster.seed("Sarah").unwrap();
        assert!(roster.remove(&sarah).unwrap());
        assert!(!roster.remove(&sarah).unwrap());
    }

    #[test]
    fn test_toggle_mute_flips() {
        let mut roster = host_roster();
        let mike = roster.seed("Mike").unwrap();
        assert!(roster.toggle_mute(&mike).unwrap());
        assert!(roster.get(&mike).unwrap().muted);
        assert!(roster.toggle_mute(&mike).unwrap());
        assert!(!roster.get(&mike).unwrap().muted);
        assert!(!roster.toggle_mute(&ParticipantId::new()).unwrap());
    }

    #[test]
    fn test_non_host_operations_change_nothing() {
        let mut roster = guest_roster();
        let mike = roster.seed("Mike").unwrap();
        let waiting = roster.enqueue("Grace").unwrap();
        let before = roster.clone();

        assert!(matches!(roster.admit(&waiting), Err(RoomError::Permission(_))));
        assert!(matches!(roster.deny(&waiting), Err(RoomError::Permission(_))));
        assert!(matches!(roster.remove(&mike), Err(RoomError::Permission(_))));
        assert!(matches!(roster.toggle_mute(&mike), Err(RoomError::Permission(_))));

        assert_eq!(roster.participants(), before.participants());
        assert_eq!(
            roster.waiting().cloned().collect::<Vec<_>>(),
            before.waiting().cloned().collect::<Vec<_>>()
        );
    }
}
