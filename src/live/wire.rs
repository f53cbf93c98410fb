//! Wire events of the Chatline live stream
//!
//! One JSON envelope per WebSocket text frame: `{"event": <name>, "data": {...}}`.
//! The five server event kinds normalize into channel-scoped timeline
//! mutations plus typing updates; everything else is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Document, Message};

/// Envelope as framed on the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Envelope {
    NewMessage(NewMessagePayload),
    MessageUpdated(MessageUpdatedPayload),
    MessageDeleted(MessageDeletedPayload),
    ReactionApplied(ReactionAppliedPayload),
    Typing(TypingPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub message: Message,
}

/// The combined update shape: any subset of the three orthogonal
/// variants (text, pin flag, reaction delta) may be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUpdatedPayload {
    pub message_id: String,
    pub reference_id: String,
    #[serde(rename = "updatedAtTimestamp", default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub new_content: Option<Document>,
    #[serde(rename = "isPinned", default)]
    pub is_pinned: Option<bool>,
    #[serde(default)]
    pub reaction: Option<ReactionDelta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionDelta {
    pub emoji: String,
    pub acting_user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedPayload {
    pub message_id: String,
    pub reference_id: String,
}

/// Full-replace variant used for reaction confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionAppliedPayload {
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: String,
    pub display_name: String,
    pub is_typing: bool,
    pub reference_id: String,
}

// -- Normalized forms consumed by the timeline engine --

/// One orthogonal change to an existing message.
#[derive(Debug, Clone)]
pub enum MessageChange {
    Text {
        content: Document,
        edited_at: Option<DateTime<Utc>>,
    },
    Pin {
        pinned: bool,
    },
    Reaction {
        emoji: String,
        user: String,
    },
}

/// A normalized mutation of one channel's timeline.
#[derive(Debug, Clone)]
pub enum TimelineMutation {
    /// Insert-if-absent (id dedup guards against echo of an optimistic send).
    Insert(Message),
    /// Patch-by-id; changes apply in wire order.
    Update {
        id: String,
        changes: Vec<MessageChange>,
    },
    /// Full replace by id, position preserved.
    Replace(Message),
    /// Remove-by-id; no-op when already absent.
    Remove { id: String },
}

/// A live event scoped to one channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Timeline(TimelineMutation),
    Typing {
        user_id: String,
        display_name: String,
        is_typing: bool,
    },
}

/// Parse one text frame. Unknown or malformed events are dropped.
pub fn parse_frame(text: &str) -> Option<Envelope> {
    match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            tracing::debug!("Dropping live frame ({}): {}", e, text);
            None
        }
    }
}

/// Client → server subscribe frame for one channel's stream.
pub fn subscribe_frame(channel_id: &str) -> String {
    serde_json::json!({
        "event": "subscribe",
        "data": { "referenceId": channel_id }
    })
    .to_string()
}

/// Client → server application-level heartbeat.
pub fn ping_frame() -> String {
    serde_json::json!({ "event": "ping", "data": {} }).to_string()
}

impl Envelope {
    /// Normalize into (channel id, event). The channel id rides alongside so
    /// the consumer can drop events for channels it no longer shows.
    pub fn normalize(self) -> (String, ChannelEvent) {
        match self {
            Envelope::NewMessage(p) => {
                let channel_id = p.message.reference_id.clone();
                (
                    channel_id,
                    ChannelEvent::Timeline(TimelineMutation::Insert(p.message)),
                )
            }
            Envelope::MessageUpdated(p) => {
                let mut changes = Vec::new();
                if let Some(content) = p.new_content {
                    changes.push(MessageChange::Text {
                        content,
                        edited_at: p.updated_at,
                    });
                }
                if let Some(pinned) = p.is_pinned {
                    changes.push(MessageChange::Pin { pinned });
                }
                if let Some(delta) = p.reaction {
                    changes.push(MessageChange::Reaction {
                        emoji: delta.emoji,
                        user: delta.acting_user,
                    });
                }
                (
                    p.reference_id,
                    ChannelEvent::Timeline(TimelineMutation::Update {
                        id: p.message_id,
                        changes,
                    }),
                )
            }
            Envelope::MessageDeleted(p) => (
                p.reference_id,
                ChannelEvent::Timeline(TimelineMutation::Remove { id: p.message_id }),
            ),
            Envelope::ReactionApplied(p) => {
                let channel_id = p.message.reference_id.clone();
                (
                    channel_id,
                    ChannelEvent::Timeline(TimelineMutation::Replace(p.message)),
                )
            }
            Envelope::Typing(p) => (
                p.reference_id,
                ChannelEvent::Typing {
                    user_id: p.user_id,
                    display_name: p.display_name,
                    is_typing: p.is_typing,
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_message() {
        let frame = r#"{"event": "new-message", "data": {"message": {
            "id": "m1", "referenceId": "ch1",
            "sender": {"id": "u1", "displayName": "Ada"},
            "createdAtTimestamp": "2024-03-01T10:00:00Z",
            "content": {"paragraphs": []}
        }}}"#;
        let envelope = parse_frame(frame).unwrap();
        let (channel_id, event) = envelope.normalize();
        assert_eq!(channel_id, "ch1");
        match event {
            ChannelEvent::Timeline(TimelineMutation::Insert(msg)) => assert_eq!(msg.id, "m1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_combined_update_yields_changes_in_order() {
        let frame = r#"{"event": "message-updated", "data": {
            "messageId": "m1", "referenceId": "ch1",
            "updatedAtTimestamp": "2024-03-01T10:05:00Z",
            "newContent": {"paragraphs": [{"nodes": [{"type": "text", "text": "edited"}]}]},
            "isPinned": true,
            "reaction": {"emoji": "🎉", "actingUser": "u2"}
        }}"#;
        let (channel_id, event) = parse_frame(frame).unwrap().normalize();
        assert_eq!(channel_id, "ch1");
        let changes = match event {
            ChannelEvent::Timeline(TimelineMutation::Update { id, changes }) => {
                assert_eq!(id, "m1");
                changes
            }
            other => panic!("unexpected event: {:?}", other),
        };
        assert_eq!(changes.len(), 3);
        match &changes[0] {
            MessageChange::Text { content, edited_at } => {
                assert_eq!(content.plain_text(), "edited");
                assert!(edited_at.is_some());
            }
            other => panic!("expected text change first: {:?}", other),
        }
        assert!(matches!(changes[1], MessageChange::Pin { pinned: true }));
        match &changes[2] {
            MessageChange::Reaction { emoji, user } => {
                assert_eq!(emoji, "🎉");
                assert_eq!(user, "u2");
            }
            other => panic!("expected reaction change last: {:?}", other),
        }
    }

    #[test]
    fn test_pin_only_update() {
        let frame = r#"{"event": "message-updated", "data": {
            "messageId": "m1", "referenceId": "ch1", "isPinned": false
        }}"#;
        let (_, event) = parse_frame(frame).unwrap().normalize();
        match event {
            ChannelEvent::Timeline(TimelineMutation::Update { changes, .. }) => {
                assert_eq!(changes.len(), 1);
                assert!(matches!(changes[0], MessageChange::Pin { pinned: false }));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_deleted_normalizes_to_remove() {
        let frame = r#"{"event": "message-deleted", "data": {
            "messageId": "m9", "referenceId": "ch2"
        }}"#;
        let (channel_id, event) = parse_frame(frame).unwrap().normalize();
        assert_eq!(channel_id, "ch2");
        match event {
            ChannelEvent::Timeline(TimelineMutation::Remove { id }) => assert_eq!(id, "m9"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_reaction_applied_normalizes_to_replace() {
        let frame = r#"{"event": "reaction-applied", "data": {"message": {
            "id": "m1", "referenceId": "ch1",
            "sender": {"id": "u1", "displayName": null},
            "createdAtTimestamp": "2024-03-01T10:00:00Z",
            "content": {"paragraphs": []},
            "reactions": [{"emoji": "👍", "counter": 1, "sentBy": ["u2"]}]
        }}}"#;
        let (_, event) = parse_frame(frame).unwrap().normalize();
        match event {
            ChannelEvent::Timeline(TimelineMutation::Replace(msg)) => {
                assert_eq!(msg.reactions.len(), 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_typing_event() {
        let frame = r#"{"event": "typing", "data": {
            "userId": "u3", "displayName": "Lin", "isTyping": true, "referenceId": "ch1"
        }}"#;
        let (channel_id, event) = parse_frame(frame).unwrap().normalize();
        assert_eq!(channel_id, "ch1");
        match event {
            ChannelEvent::Typing {
                user_id,
                display_name,
                is_typing,
            } => {
                assert_eq!(user_id, "u3");
                assert_eq!(display_name, "Lin");
                assert!(is_typing);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_dropped() {
        assert!(parse_frame(r#"{"event": "presence", "data": {}}"#).is_none());
        assert!(parse_frame("not json").is_none());
    }

    #[test]
    fn test_subscribe_frame_shape() {
        let frame = subscribe_frame("ch1");
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "subscribe");
        assert_eq!(v["data"]["referenceId"], "ch1");
    }
}
