//! Typing indicator set for the active channel

use std::collections::HashMap;

/// Who is typing right now. Membership is the `is_typing` flag: an entry
/// exists exactly while a typing-start has not been followed by a
/// typing-stop or a channel switch. Nothing here persists or times out.
#[derive(Default)]
pub struct TypingSet {
    users: HashMap<String, String>,
}

impl TypingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one typing event. Returns true when the visible set changed.
    pub fn apply(&mut self, user_id: &str, display_name: &str, is_typing: bool) -> bool {
        if is_typing {
            self.users
                .insert(user_id.to_string(), display_name.to_string())
                .as_deref()
                != Some(display_name)
        } else {
            self.users.remove(user_id).is_some()
        }
    }

    /// Channel switch: drop everything. Returns true when the set was
    /// non-empty.
    pub fn clear(&mut self) -> bool {
        let changed = !self.users.is_empty();
        self.users.clear();
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Display names, sorted for a stable footer.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.values().cloned().collect();
        names.sort();
        names
    }
}
