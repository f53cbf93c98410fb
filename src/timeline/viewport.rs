//! Scroll-anchored viewport state machine
//!
//! Tracks where the rendering surface sits relative to the timeline and
//! decides when to auto-follow new messages, when to request backward
//! pagination, and how to keep the visible messages still while an older
//! page lands above them. Geometry is in abstract surface units (rows for
//! a terminal); the surface reports, the machine decides.

/// Geometry of the rendering surface at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Scroll offset from the top of the content.
    pub top: usize,
    /// Total content height.
    pub content_height: usize,
    /// Visible height.
    pub viewport_height: usize,
}

impl Geometry {
    fn is_at_bottom(&self) -> bool {
        self.top + self.viewport_height >= self.content_height
    }

    fn is_near_top(&self, threshold: usize) -> bool {
        self.top <= threshold
    }
}

/// Effect the driver must execute in response to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Fetch the next older page.
    RequestPage,
    /// Snap the surface to the bottom of the content.
    ToBottom,
    /// Shift the scroll offset by this many units (anchor preservation).
    AdjustBy(i64),
}

/// Anchoring phase. `AnchorPending` carries the content height recorded
/// when the prepend was committed, consumed by the first `rendered`
/// report painted at a different height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Following,
    Paginating,
    AnchorPending { prev_height: usize },
}

/// The viewport anchor controller.
///
/// `initial_scroll_done` gates both auto-follow and the near-top trigger:
/// until the first paint has settled, the surface necessarily reports
/// top-of-content geometry, and acting on it would fire a spurious fetch.
pub struct ViewportAnchor {
    phase: Phase,
    initial_scroll_done: bool,
    near_top_threshold: usize,
    last: Option<Geometry>,
}

impl ViewportAnchor {
    pub fn new(near_top_threshold: usize) -> Self {
        Self {
            phase: Phase::Idle,
            initial_scroll_done: false,
            near_top_threshold,
            last: None,
        }
    }

    /// Channel switch: back to the pre-first-paint state.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.initial_scroll_done = false;
        self.last = None;
    }

    /// The initial bottom scroll has settled; follow and near-top
    /// triggering are armed from here on.
    pub fn initial_scroll_settled(&mut self) {
        self.initial_scroll_done = true;
        self.phase = Phase::Following;
    }

    pub fn initial_scroll_done(&self) -> bool {
        self.initial_scroll_done
    }

    pub fn is_paginating(&self) -> bool {
        matches!(self.phase, Phase::Paginating)
    }

    pub fn is_following(&self) -> bool {
        matches!(self.phase, Phase::Following)
    }

    /// The surface scrolled (user input or a driver effect taking hold).
    pub fn scrolled(&mut self, geom: Geometry, has_more: bool) -> Option<Effect> {
        if !self.initial_scroll_done {
            self.last = Some(geom);
            return None;
        }

        let effect = match self.phase {
            // A second near-top trigger is suppressed, not queued; the
            // anchor handshake likewise runs to completion first.
            Phase::Paginating | Phase::AnchorPending { .. } => None,
            Phase::Idle | Phase::Following => {
                if geom.is_near_top(self.near_top_threshold) && has_more {
                    self.phase = Phase::Paginating;
                    Some(Effect::RequestPage)
                } else {
                    self.phase = if geom.is_at_bottom() {
                        Phase::Following
                    } else {
                        Phase::Idle
                    };
                    None
                }
            }
        };
        self.last = Some(geom);
        effect
    }

    /// Post-paint report from the surface. While an anchor is pending this
    /// completes the handshake: the height delta between the recorded and
    /// the freshly painted content becomes a scroll correction.
    ///
    /// The surface repaints once per folded update, so reports at the
    /// recorded height are from paints that predate the reflow; a prepend
    /// always grows the content, so the completing paint is strictly
    /// taller and the anchor stays armed until it arrives.
    pub fn rendered(&mut self, geom: Geometry) -> Option<Effect> {
        if let Phase::AnchorPending { prev_height } = self.phase {
            let delta = geom.content_height as i64 - prev_height as i64;
            if delta == 0 {
                self.last = Some(geom);
                return None;
            }
            let adjusted = Geometry {
                top: (geom.top as i64 + delta).max(0) as usize,
                ..geom
            };
            self.phase = if adjusted.is_at_bottom() {
                Phase::Following
            } else {
                Phase::Idle
            };
            self.last = Some(adjusted);
            return Some(Effect::AdjustBy(delta));
        }

        self.last = Some(geom);
        if self.initial_scroll_done && matches!(self.phase, Phase::Idle | Phase::Following) {
            self.phase = if geom.is_at_bottom() {
                Phase::Following
            } else {
                Phase::Idle
            };
        }
        None
    }

    /// A page load started outside the near-top trigger (explicit load-more
    /// or a jump backfill step). A pending anchor stays pending: its
    /// correction is still owed.
    pub fn fetch_started(&mut self) {
        if !matches!(self.phase, Phase::AnchorPending { .. }) {
            self.phase = Phase::Paginating;
        }
    }

    /// The in-flight page resolved; `prepended` is how many messages the
    /// store actually inserted. A non-empty prepend arms the anchor
    /// handshake, a fully-deduplicated one just releases the flag.
    pub fn fetch_resolved(&mut self, prepended: usize) {
        match self.phase {
            // A backfill resolved over an unconsumed anchor: the recorded
            // height predates both prepends, so one correction covers
            // them, and an empty page changes nothing.
            Phase::AnchorPending { .. } => {}
            _ if prepended > 0 => {
                let prev_height = self.last.map(|g| g.content_height).unwrap_or(0);
                self.phase = Phase::AnchorPending { prev_height };
            }
            _ => self.settle_phase(),
        }
    }

    /// The in-flight page failed; release the flag so an explicit user
    /// action can retry.
    pub fn fetch_failed(&mut self) {
        self.settle_phase();
    }

    /// The store appended a new message at the bottom. Prepends never come
    /// through here: they take the anchor path, which is what keeps page
    /// growth from yanking a reader to the bottom.
    pub fn appended(&mut self) -> Option<Effect> {
        if self.initial_scroll_done && self.phase == Phase::Following {
            Some(Effect::ToBottom)
        } else {
            None
        }
    }

    fn settle_phase(&mut self) {
        self.phase = match self.last {
            Some(g) if !g.is_at_bottom() => Phase::Idle,
            _ => Phase::Following,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(top: usize, content: usize, viewport: usize) -> Geometry {
        Geometry {
            top,
            content_height: content,
            viewport_height: viewport,
        }
    }

    /// Anchor armed and settled at the bottom of a 100-row history.
    fn settled_anchor() -> ViewportAnchor {
        let mut anchor = ViewportAnchor::new(3);
        anchor.initial_scroll_settled();
        anchor.rendered(geom(80, 100, 20));
        anchor
    }

    #[test]
    fn test_initial_geometry_does_not_trigger_fetch() {
        let mut anchor = ViewportAnchor::new(3);
        // Before the initial scroll settles the surface reports top=0,
        // which must not be mistaken for a scroll-to-top.
        assert_eq!(anchor.scrolled(geom(0, 100, 20), true), None);
        assert_eq!(anchor.rendered(geom(0, 100, 20)), None);
        assert_eq!(anchor.appended(), None);
    }

    #[test]
    fn test_near_top_triggers_one_page() {
        let mut anchor = settled_anchor();
        assert_eq!(
            anchor.scrolled(geom(2, 100, 20), true),
            Some(Effect::RequestPage)
        );
        // While in flight, further near-top scrolls are suppressed.
        assert_eq!(anchor.scrolled(geom(0, 100, 20), true), None);
        assert!(anchor.is_paginating());
    }

    #[test]
    fn test_no_trigger_when_history_exhausted() {
        let mut anchor = settled_anchor();
        assert_eq!(anchor.scrolled(geom(0, 100, 20), false), None);
        assert!(!anchor.is_paginating());
    }

    #[test]
    fn test_no_trigger_away_from_top() {
        let mut anchor = settled_anchor();
        assert_eq!(anchor.scrolled(geom(40, 100, 20), true), None);
    }

    #[test]
    fn test_follow_tracks_bottom_contact() {
        let mut anchor = settled_anchor();
        assert!(anchor.is_following());

        anchor.scrolled(geom(40, 100, 20), true);
        assert!(!anchor.is_following());
        assert_eq!(anchor.appended(), None);

        anchor.scrolled(geom(80, 100, 20), true);
        assert!(anchor.is_following());
        assert_eq!(anchor.appended(), Some(Effect::ToBottom));
    }

    #[test]
    fn test_append_suppressed_while_paginating() {
        let mut anchor = settled_anchor();
        anchor.fetch_started();
        assert_eq!(anchor.appended(), None);
    }

    #[test]
    fn test_prepend_anchor_handshake() {
        let mut anchor = settled_anchor();
        // Reader scrolls near the top and a page load begins.
        assert_eq!(
            anchor.scrolled(geom(2, 100, 20), true),
            Some(Effect::RequestPage)
        );
        anchor.fetch_resolved(25);

        // The repaint is 50 rows taller; the reader is shifted down by
        // exactly that much, so the same rows stay on screen.
        assert_eq!(
            anchor.rendered(geom(2, 150, 20)),
            Some(Effect::AdjustBy(50))
        );
        assert!(!anchor.is_following());
        assert!(!anchor.is_paginating());
    }

    #[test]
    fn test_anchor_survives_repaint_at_recorded_height() {
        let mut anchor = settled_anchor();
        anchor.scrolled(geom(2, 100, 20), true);
        anchor.fetch_resolved(10);

        // The surface repaints once per folded update; the spinner-off
        // paint still shows the old height and must not use up the
        // anchor meant for the taller paint behind it.
        assert_eq!(anchor.rendered(geom(2, 100, 20)), None);
        assert_eq!(anchor.rendered(geom(2, 100, 20)), None);
        assert_eq!(
            anchor.rendered(geom(2, 130, 20)),
            Some(Effect::AdjustBy(30))
        );
    }

    #[test]
    fn test_backfill_step_keeps_pending_anchor() {
        let mut anchor = settled_anchor();
        anchor.scrolled(geom(2, 100, 20), true);
        anchor.fetch_resolved(10);

        // A jump backfill starts its next page before the repaint lands.
        anchor.fetch_started();
        assert_eq!(
            anchor.rendered(geom(2, 130, 20)),
            Some(Effect::AdjustBy(30))
        );
    }

    #[test]
    fn test_consecutive_prepends_fold_into_one_correction() {
        let mut anchor = settled_anchor();
        anchor.scrolled(geom(2, 100, 20), true);
        anchor.fetch_resolved(10);
        anchor.fetch_started();
        anchor.fetch_resolved(10);

        // Both pages paint at once; the correction spans them.
        assert_eq!(
            anchor.rendered(geom(2, 160, 20)),
            Some(Effect::AdjustBy(60))
        );
    }

    #[test]
    fn test_deduplicated_backfill_keeps_pending_anchor() {
        let mut anchor = settled_anchor();
        anchor.scrolled(geom(2, 100, 20), true);
        anchor.fetch_resolved(10);
        anchor.fetch_started();
        anchor.fetch_resolved(0);
        assert_eq!(
            anchor.rendered(geom(2, 130, 20)),
            Some(Effect::AdjustBy(30))
        );
    }

    #[test]
    fn test_empty_page_releases_flag_without_anchor() {
        let mut anchor = settled_anchor();
        anchor.scrolled(geom(2, 100, 20), true);
        anchor.fetch_resolved(0);
        assert!(!anchor.is_paginating());
        // Plain report, no adjustment owed.
        assert_eq!(anchor.rendered(geom(2, 100, 20)), None);
    }

    #[test]
    fn test_fetch_failure_releases_flag_for_retry() {
        let mut anchor = settled_anchor();
        anchor.scrolled(geom(2, 100, 20), true);
        anchor.fetch_failed();
        assert!(!anchor.is_paginating());
        // The retry is an explicit user action: another scroll.
        assert_eq!(
            anchor.scrolled(geom(1, 100, 20), true),
            Some(Effect::RequestPage)
        );
    }

    #[test]
    fn test_scroll_during_anchor_handshake_is_inert() {
        let mut anchor = settled_anchor();
        anchor.scrolled(geom(2, 100, 20), true);
        anchor.fetch_resolved(10);
        assert_eq!(anchor.scrolled(geom(0, 100, 20), true), None);
        // The handshake still completes afterwards.
        assert_eq!(
            anchor.rendered(geom(0, 130, 20)),
            Some(Effect::AdjustBy(30))
        );
    }

    #[test]
    fn test_reset_disarms_until_next_settle() {
        let mut anchor = settled_anchor();
        anchor.reset();
        assert_eq!(anchor.scrolled(geom(0, 50, 20), true), None);
        assert_eq!(anchor.appended(), None);

        anchor.initial_scroll_settled();
        assert_eq!(anchor.appended(), Some(Effect::ToBottom));
    }

    #[test]
    fn test_short_content_counts_as_bottom() {
        let mut anchor = ViewportAnchor::new(3);
        anchor.initial_scroll_settled();
        // Ten rows of content in a twenty-row viewport.
        anchor.rendered(geom(0, 10, 20));
        assert!(anchor.is_following());
    }
}
