//! Message-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserRef;

/// One inline node of a rich-text paragraph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InlineNode {
    #[serde(rename_all = "camelCase")]
    Text { text: String },
    #[serde(rename_all = "camelCase")]
    Mention { user_id: String, label: String },
    #[serde(rename_all = "camelCase")]
    Pin { message_id: String },
}

/// A paragraph of inline nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub nodes: Vec<InlineNode>,
}

/// Rich-text message content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
}

impl Document {
    /// Build a document from plain text, one paragraph per line
    pub fn from_text(text: &str) -> Self {
        Self {
            paragraphs: text
                .split('\n')
                .map(|line| Paragraph {
                    nodes: vec![InlineNode::Text {
                        text: line.to_string(),
                    }],
                })
                .collect(),
        }
    }

    /// Flatten to plain text; mentions render as @label, pin markers as 📌
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for (i, para) in self.paragraphs.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            for node in &para.nodes {
                match node {
                    InlineNode::Text { text } => out.push_str(text),
                    InlineNode::Mention { label, .. } => {
                        out.push('@');
                        out.push_str(label);
                    }
                    InlineNode::Pin { .. } => out.push('📌'),
                }
            }
        }
        out
    }
}

/// Attachment kind tag; kinds this client does not know degrade to File
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
}

impl AttachmentKind {
    /// Short label for display: "image", "video", "audio", "file".
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }
}

impl From<String> for AttachmentKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::File,
        }
    }
}

/// Typed blob reference carried by a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// One emoji reaction and the users who sent it.
/// Invariant: `counter == sent_by.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    pub counter: u32,
    pub sent_by: Vec<String>,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Id of the channel the message belongs to
    pub reference_id: String,
    pub sender: UserRef,
    #[serde(rename = "createdAtTimestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAtTimestamp", default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub content: Document,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    /// Embedded snapshot of the message this one replies to
    #[serde(default)]
    pub reply_to: Option<Box<Message>>,
    #[serde(default)]
    pub forwarded_from: Option<String>,
    #[serde(rename = "isPinned", default)]
    pub pinned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_message() {
        let json = r#"{
            "id": "m1",
            "referenceId": "ch1",
            "sender": {"id": "u1", "displayName": "Ada"},
            "createdAtTimestamp": "2024-03-01T10:00:00Z",
            "content": {"paragraphs": [{"nodes": [
                {"type": "text", "text": "hello "},
                {"type": "mention", "userId": "u2", "label": "Grace"}
            ]}]},
            "attachments": [{"type": "image", "url": "https://x/a.png", "name": "a.png", "size": 123}],
            "reactions": [{"emoji": "👍", "counter": 2, "sentBy": ["u2", "u3"]}],
            "isPinned": true
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.reference_id, "ch1");
        assert_eq!(msg.sender.label(), "Ada");
        assert!(msg.updated_at.is_none());
        assert_eq!(msg.content.plain_text(), "hello @Grace");
        assert_eq!(msg.attachments[0].kind, AttachmentKind::Image);
        assert_eq!(msg.reactions[0].counter, 2);
        assert!(msg.pinned);
        assert!(msg.reply_to.is_none());
    }

    #[test]
    fn test_parse_minimal_message_defaults() {
        let json = r#"{
            "id": "m2",
            "referenceId": "ch1",
            "sender": {"id": "u1", "displayName": null},
            "createdAtTimestamp": "2024-03-01T10:01:00Z",
            "content": {"paragraphs": []}
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.attachments.is_empty());
        assert!(msg.reactions.is_empty());
        assert!(!msg.pinned);
        assert_eq!(msg.sender.label(), "u1");
    }

    #[test]
    fn test_unknown_attachment_kind_degrades_to_file() {
        let json = r#"{"type": "hologram", "url": "https://x/h", "name": "h"}"#;
        let att: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(att.kind, AttachmentKind::File);
        assert_eq!(att.size, 0);
    }

    #[test]
    fn test_document_text_roundtrip() {
        let doc = Document::from_text("one\ntwo");
        assert_eq!(doc.paragraphs.len(), 2);
        assert_eq!(doc.plain_text(), "one\ntwo");
    }
}
