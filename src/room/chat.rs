//! Chat channel: append-only message log with toggle reactions.

use std::collections::BTreeSet;

use crate::models::{ChatMessage, MessageId, ReactionSummary};

/// Reactions offered in the quick palette, in display order.
pub const QUICK_REACTIONS: [&str; 5] = ["👍", "❤️", "🙏", "😂", "🎉"];

/// Session chat log. Display order is send order.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Append a message. Blank text is ignored.
    pub fn send(&mut self, author: &str, text: &str) -> Option<MessageId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let message = ChatMessage::new(author, text);
        let id = message.id.clone();
        self.messages.push(message);
        Some(id)
    }

    /// Toggle `actor`'s `emoji` reaction on a message.
    ///
    /// Returns whether anything changed. Unknown messages and blank emoji are
    /// ignored.
    pub fn react(&mut self, id: &MessageId, emoji: &str, actor: &str) -> bool {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return false;
        }
        let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) else {
            return false;
        };

        let supporters = message.reactions.entry(emoji.to_string()).or_default();
        if !supporters.remove(actor) {
            supporters.insert(actor.to_string());
        }
        if supporters.is_empty() {
            message.reactions.remove(emoji);
        }
        true
    }

    /// Per-emoji counts for a message as seen by `viewer`.
    pub fn reaction_summary(&self, id: &MessageId, viewer: &str) -> Vec<ReactionSummary> {
        self.get(id)
            .map(|m| summarize(&m.reactions, viewer))
            .unwrap_or_default()
    }
}

/// Derive display aggregates from the supporter sets alone.
pub fn summarize(
    reactions: &std::collections::BTreeMap<String, BTreeSet<String>>,
    viewer: &str,
) -> Vec<ReactionSummary> {
    reactions
        .iter()
        .map(|(emoji, who)| ReactionSummary {
            emoji: emoji.clone(),
            count: who.len(),
            mine: who.contains(viewer),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_ignores_blank_and_keeps_order() {
        let mut log = ChatLog::new();
        assert!(log.send("A", "   ").is_none());
        log.send("A", "first").unwrap();
        log.send("B", "  second  ").unwrap();
        let texts: Vec<_> = log.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(log.messages()[0].reactions.is_empty());
    }

    #[test]
    fn test_reaction_scenario() {
        let mut log = ChatLog::new();
        let id = log.send("A", "Hi").unwrap();

        assert!(log.react(&id, "👍", "A"));
        assert!(log.react(&id, "👍", "B"));
        assert!(log.react(&id, "👍", "A"));

        let reactions = &log.get(&id).unwrap().reactions;
        assert_eq!(reactions.len(), 1);
        let supporters: Vec<_> = reactions["👍"].iter().cloned().collect();
        assert_eq!(supporters, vec!["B".to_string()]);
    }

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let mut log = ChatLog::new();
        let id = log.send("A", "Amen").unwrap();
        log.react(&id, "🙏", "B");
        let before = log.get(&id).unwrap().reactions.clone();

        log.react(&id, "👍", "C");
        log.react(&id, "👍", "C");
        assert_eq!(log.get(&id).unwrap().reactions, before);
    }

    #[test]
    fn test_empty_sets_are_pruned() {
        let mut log = ChatLog::new();
        let id = log.send("A", "Hi").unwrap();
        log.react(&id, "🎉", "A");
        log.react(&id, "🎉", "A");
        assert!(!log.get(&id).unwrap().reactions.contains_key("🎉"));
    }

    #[test]
    fn test_independent_emoji_sets() {
        let mut log = ChatLog::new();
        let id = log.send("A", "Hi").unwrap();
        log.react(&id, "👍", "A");
        log.react(&id, "❤️", "A");
        log.react(&id, "❤️", "B");

        let summary = log.reaction_summary(&id, "B");
        let heart = summary.iter().find(|s| s.emoji == "❤️").unwrap();
        let thumbs = summary.iter().find(|s| s.emoji == "👍").unwrap();
        assert_eq!((heart.count, heart.mine), (2, true));
        assert_eq!((thumbs.count, thumbs.mine), (1, false));
    }

    #[test]
    fn test_react_unknown_message_or_blank_emoji() {
        let mut log = ChatLog::new();
        let id = log.send("A", "Hi").unwrap();
        assert!(!log.react(&MessageId::new(), "👍", "A"));
        assert!(!log.react(&id, " ", "A"));
        assert!(log.get(&id).unwrap().reactions.is_empty());
    }
}
