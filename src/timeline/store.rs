//! Ordered, deduplicated message timeline for the active channel

use crate::live::wire::{MessageChange, TimelineMutation};
use crate::models::{Message, Reaction};

/// What a live mutation did to the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// New message appended at the end.
    Appended,
    /// Existing message patched in place.
    Patched,
    /// Message removed.
    Removed,
    /// Nothing changed (duplicate insert, or patch/remove of an unknown id).
    Noop,
}

/// Ordered, id-deduplicated message sequence for exactly one channel.
///
/// The pagination cursor is derived, never stored: it is the id of the
/// oldest message currently held. `has_more` is the server's flag from the
/// last page, kept until the next reset.
pub struct TimelineStore {
    channel_id: Option<String>,
    messages: Vec<Message>,
    has_more: bool,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self {
            channel_id: None,
            messages: Vec::new(),
            has_more: false,
        }
    }

    /// Switch to a channel: discards messages, cursor and `has_more`
    /// in one step.
    pub fn reset(&mut self, channel_id: String) {
        self.channel_id = Some(channel_id);
        self.messages.clear();
        self.has_more = false;
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// The `before` parameter for the next backward fetch.
    pub fn oldest_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn set_has_more(&mut self, has_more: bool) {
        self.has_more = has_more;
    }

    /// Merge an older page (ascending) in front of the current messages,
    /// dropping any incoming message whose id is already present.
    /// Returns how many messages were actually inserted.
    pub fn prepend_page(&mut self, incoming: Vec<Message>) -> usize {
        let mut fresh: Vec<Message> = incoming
            .into_iter()
            .filter(|m| !self.contains(&m.id))
            .collect();
        let added = fresh.len();
        if added > 0 {
            fresh.append(&mut self.messages);
            self.messages = fresh;
        }
        added
    }

    /// Apply one live mutation. Patches mutate in place by id and never
    /// move the element, so chronological order survives edits and pins.
    pub fn apply(&mut self, mutation: TimelineMutation) -> Applied {
        match mutation {
            TimelineMutation::Insert(msg) => {
                // Dedup guards against the server echo of an optimistic send.
                if self.contains(&msg.id) {
                    Applied::Noop
                } else {
                    self.messages.push(msg);
                    Applied::Appended
                }
            }
            TimelineMutation::Update { id, changes } => {
                let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) else {
                    return Applied::Noop;
                };
                if changes.is_empty() {
                    return Applied::Noop;
                }
                for change in changes {
                    apply_change(msg, change);
                }
                Applied::Patched
            }
            TimelineMutation::Replace(new) => {
                match self.messages.iter_mut().find(|m| m.id == new.id) {
                    Some(slot) => {
                        *slot = new;
                        Applied::Patched
                    }
                    None => Applied::Noop,
                }
            }
            TimelineMutation::Remove { id } => {
                let before = self.messages.len();
                self.messages.retain(|m| m.id != id);
                if self.messages.len() < before {
                    Applied::Removed
                } else {
                    Applied::Noop
                }
            }
        }
    }
}

fn apply_change(msg: &mut Message, change: MessageChange) {
    match change {
        MessageChange::Text { content, edited_at } => {
            msg.content = content;
            // The wire timestamp is optional; without one the old stamp stays.
            if edited_at.is_some() {
                msg.updated_at = edited_at;
            }
        }
        MessageChange::Pin { pinned } => msg.pinned = pinned,
        MessageChange::Reaction { emoji, user } => toggle_reaction(msg, &emoji, &user),
    }
}

/// Toggle one user's reaction for one emoji.
///
/// Absent entry: create with counter 1. Present without the user: append
/// and increment. Present with the user: remove and decrement, dropping
/// the entry when the counter reaches 0. The decrement saturates, so a
/// drifted counter can never underflow.
fn toggle_reaction(msg: &mut Message, emoji: &str, user: &str) {
    let Some(idx) = msg.reactions.iter().position(|r| r.emoji == emoji) else {
        msg.reactions.push(Reaction {
            emoji: emoji.to_string(),
            counter: 1,
            sent_by: vec![user.to_string()],
        });
        return;
    };

    let reaction = &mut msg.reactions[idx];
    match reaction.sent_by.iter().position(|u| u == user) {
        None => {
            reaction.sent_by.push(user.to_string());
            reaction.counter += 1;
        }
        Some(pos) => {
            reaction.sent_by.remove(pos);
            reaction.counter = reaction.counter.saturating_sub(1);
            if reaction.counter == 0 {
                msg.reactions.remove(idx);
            }
        }
    }
}
