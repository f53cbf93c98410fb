//! Incremental message timeline synchronization
//!
//! Merges backward-paginated history with live events arriving out of band,
//! keeps the viewport anchored while history loads, and resolves
//! jump-to-message requests against not-yet-loaded history.

pub mod jump;
pub mod store;
pub mod sync;
pub mod typing;
pub mod viewport;

pub use sync::{ScrollCommand, TimelineCommand, TimelineHandle, TimelineUpdate};

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{TimeZone, Utc};

    use crate::models::{Document, Message, UserRef};

    /// Minimal message in channel ch1, `secs` seconds after a fixed base time.
    pub fn message(id: &str, secs: i64) -> Message {
        message_in("ch1", id, secs)
    }

    pub fn message_in(channel_id: &str, id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            reference_id: channel_id.to_string(),
            sender: UserRef {
                id: "u1".to_string(),
                display_name: Some("Ada".to_string()),
            },
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
                + chrono::Duration::seconds(secs),
            updated_at: None,
            content: Document::from_text("hi"),
            attachments: Vec::new(),
            reactions: Vec::new(),
            reply_to: None,
            forwarded_from: None,
            pinned: false,
        }
    }
}
