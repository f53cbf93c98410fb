//! Jump-to-message resolver
//!
//! Drives repeated backward pagination until a target message id is
//! loaded or history runs out. Pull-based: the synchronizer asks for the
//! next step after every timeline change, so each change cycle does at
//! most one page load.

/// Next action on behalf of a pending jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpStep {
    /// Target is loaded; schedule the settle-delayed scroll to it.
    ScrollTo(String),
    /// Target still absent; load one more page.
    LoadPage,
    /// Target unreachable; the jump is abandoned (diagnostic logged).
    Abandon,
}

struct PendingJump {
    target_id: String,
    pages_loaded: usize,
}

/// Best-effort navigation to a message id anywhere in history.
pub struct JumpResolver {
    pending: Option<PendingJump>,
    /// Backfill ceiling; keeps a deep-history jump from issuing an
    /// unbounded chain of sequential fetches.
    page_limit: usize,
}

impl JumpResolver {
    pub fn new(page_limit: usize) -> Self {
        Self {
            pending: None,
            page_limit,
        }
    }

    /// Begin resolving `target_id`, replacing any jump still pending.
    pub fn begin(&mut self, target_id: String) {
        tracing::debug!("Jump requested to {}", target_id);
        self.pending = Some(PendingJump {
            target_id,
            pages_loaded: 0,
        });
    }

    /// Channel switch: a pending jump no longer means anything.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Id the pending jump is looking for, if any.
    pub fn target(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.target_id.as_str())
    }

    /// Re-check after a timeline change. `target_loaded` is the membership
    /// of the target id in the current timeline; `has_more` the flag from
    /// the latest page.
    pub fn step(&mut self, target_loaded: bool, has_more: bool) -> Option<JumpStep> {
        let pending = self.pending.as_mut()?;

        if target_loaded {
            let target_id = pending.target_id.clone();
            self.pending = None;
            return Some(JumpStep::ScrollTo(target_id));
        }

        if !has_more {
            tracing::warn!(
                "Jump target {} unreachable: history exhausted",
                pending.target_id
            );
            self.pending = None;
            return Some(JumpStep::Abandon);
        }

        if pending.pages_loaded >= self.page_limit {
            tracing::warn!(
                "Jump target {} unreachable: gave up after {} pages",
                pending.target_id,
                self.page_limit
            );
            self.pending = None;
            return Some(JumpStep::Abandon);
        }

        pending.pages_loaded += 1;
        Some(JumpStep::LoadPage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_target_scrolls_immediately() {
        let mut jump = JumpResolver::new(32);
        jump.begin("m5".to_string());
        assert_eq!(jump.step(true, true), Some(JumpStep::ScrollTo("m5".to_string())));
        assert!(!jump.is_pending());
        // The jump is consumed; further changes ask for nothing.
        assert_eq!(jump.step(true, true), None);
    }

    #[test]
    fn test_backfills_until_found() {
        let mut jump = JumpResolver::new(32);
        jump.begin("m5".to_string());
        assert_eq!(jump.step(false, true), Some(JumpStep::LoadPage));
        assert_eq!(jump.step(false, true), Some(JumpStep::LoadPage));
        assert_eq!(jump.step(true, true), Some(JumpStep::ScrollTo("m5".to_string())));
    }

    #[test]
    fn test_exhausted_history_abandons() {
        let mut jump = JumpResolver::new(32);
        jump.begin("gone".to_string());
        assert_eq!(jump.step(false, true), Some(JumpStep::LoadPage));
        assert_eq!(jump.step(false, false), Some(JumpStep::Abandon));
        assert!(!jump.is_pending());
    }

    #[test]
    fn test_page_ceiling_abandons() {
        let mut jump = JumpResolver::new(2);
        jump.begin("deep".to_string());
        assert_eq!(jump.step(false, true), Some(JumpStep::LoadPage));
        assert_eq!(jump.step(false, true), Some(JumpStep::LoadPage));
        assert_eq!(jump.step(false, true), Some(JumpStep::Abandon));
    }

    #[test]
    fn test_new_request_replaces_pending() {
        let mut jump = JumpResolver::new(32);
        jump.begin("m5".to_string());
        jump.step(false, true);
        jump.begin("m9".to_string());
        assert_eq!(jump.step(true, true), Some(JumpStep::ScrollTo("m9".to_string())));
    }

    #[test]
    fn test_cancel_clears_pending() {
        let mut jump = JumpResolver::new(32);
        jump.begin("m5".to_string());
        jump.cancel();
        assert_eq!(jump.step(false, true), None);
    }
}
