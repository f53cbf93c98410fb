//! Timeline synchronizer actor
//!
//! One spawned task owns the store, the viewport anchor, the jump resolver
//! and the typing set, and runs the cooperative loop that merges fetch
//! results, live events and surface reports. The rendering surface talks
//! to it exclusively through a `TimelineHandle`: commands in, read-only
//! snapshots and effects out.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::OptionFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Sleep};

use crate::api::{FetchError, MessageApi, MessagePage};
use crate::config::Config;
use crate::live::wire::{ChannelEvent, TimelineMutation};
use crate::live::{LiveCommand, SocketEvent};
use crate::models::Message;

use super::jump::{JumpResolver, JumpStep};
use super::store::{Applied, TimelineStore};
use super::typing::TypingSet;
use super::viewport::{Effect, Geometry, ViewportAnchor};

/// Surface → synchronizer commands.
#[derive(Debug)]
pub enum TimelineCommand {
    /// Show a channel: reset, subscribe, load the newest page.
    OpenChannel(String),
    /// Explicit older-page request (also the retry path after a failure).
    LoadMore,
    /// Navigate to a message id anywhere in history.
    ScrollTo(String),
    /// The surface scrolled to this geometry.
    Scrolled(Geometry),
    /// Post-paint geometry report.
    Rendered(Geometry),
    /// Send composed text to the active channel.
    Send(String),
}

/// Scroll effect for the surface to execute on its next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollCommand {
    ToBottom,
    AdjustBy(i64),
    ToMessage(String),
}

/// Synchronizer → surface updates.
#[derive(Debug)]
pub enum TimelineUpdate {
    /// Read-only snapshot after any timeline change.
    Messages {
        messages: Vec<Message>,
        has_more: bool,
    },
    /// Newest-page load in progress.
    Loading(bool),
    /// Older-page load in progress.
    LoadingMore(bool),
    /// Last fetch failed; cleared by the next successful load.
    LoadFailed(bool),
    /// Live connection state.
    Connected(bool),
    /// Who is typing in the active channel, sorted.
    Typing(Vec<String>),
    Scroll(ScrollCommand),
    SendFailed(String),
}

/// Handle for the surface side: send commands, receive updates.
pub struct TimelineHandle {
    cmd_tx: mpsc::UnboundedSender<TimelineCommand>,
    update_rx: mpsc::UnboundedReceiver<TimelineUpdate>,
}

impl TimelineHandle {
    /// Spawn the synchronizer over an injected fetcher and live feed.
    ///
    /// The live connection is a capability handed in by the caller, which
    /// owns its lifecycle; the synchronizer only subscribes channels on it
    /// and consumes its events.
    pub fn start(
        config: &Config,
        api: Arc<dyn MessageApi>,
        live_tx: mpsc::UnboundedSender<LiveCommand>,
        live_rx: mpsc::UnboundedReceiver<SocketEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let actor = Synchronizer::new(config, api, live_tx, update_tx);
        tokio::spawn(actor.run(cmd_rx, live_rx));

        Self { cmd_tx, update_rx }
    }

    /// Send a command to the synchronizer (non-blocking).
    pub fn send(&self, cmd: TimelineCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Timeline channel closed -- command dropped");
        }
    }

    /// Receive the next update. Returns `None` only when the synchronizer
    /// task is gone. Designed to be used inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<TimelineUpdate> {
        self.update_rx.recv().await
    }
}

/// What a fetch was for, decided when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    /// Newest page after a channel open (or a retry into an empty timeline).
    Initial,
    /// Older page: near-top trigger, explicit load-more, or jump backfill.
    Older,
}

/// What the settle delay, once elapsed, should scroll to.
enum PendingScroll {
    /// Initial bottom scroll; arms the viewport when it fires.
    Bottom,
    /// Jump scroll to a now-loaded message.
    Message(String),
}

type FetchResult = (String, FetchKind, Result<MessagePage, FetchError>);
type InFlightFetch = Pin<Box<dyn Future<Output = FetchResult> + Send>>;
type SendResult = (String, Result<Message, FetchError>);
type InFlightSend = Pin<Box<dyn Future<Output = SendResult> + Send>>;
type SettleTimer = (Pin<Box<Sleep>>, PendingScroll);

struct Synchronizer {
    api: Arc<dyn MessageApi>,
    live_tx: mpsc::UnboundedSender<LiveCommand>,
    updates: mpsc::UnboundedSender<TimelineUpdate>,
    store: TimelineStore,
    anchor: ViewportAnchor,
    jump: JumpResolver,
    typing: TypingSet,
    /// Metadata of the fetch currently in flight for the active channel.
    /// While set, further page requests are suppressed, never queued.
    current_fetch: Option<FetchKind>,
    page_size: usize,
    settle_delay: Duration,
}

impl Synchronizer {
    fn new(
        config: &Config,
        api: Arc<dyn MessageApi>,
        live_tx: mpsc::UnboundedSender<LiveCommand>,
        updates: mpsc::UnboundedSender<TimelineUpdate>,
    ) -> Self {
        Self {
            api,
            live_tx,
            updates,
            store: TimelineStore::new(),
            anchor: ViewportAnchor::new(config.near_top_rows),
            jump: JumpResolver::new(config.jump_page_limit),
            typing: TypingSet::new(),
            current_fetch: None,
            page_size: config.page_size,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<TimelineCommand>,
        mut live: mpsc::UnboundedReceiver<SocketEvent>,
    ) {
        // Completed-out-of-order fetches are expected: a channel switch
        // leaves the old channel's fetch running here until it resolves
        // and is discarded by the id comparison.
        let mut fetches: FuturesUnordered<InFlightFetch> = FuturesUnordered::new();
        let mut sends: FuturesUnordered<InFlightSend> = FuturesUnordered::new();
        let mut settle: Option<SettleTimer> = None;

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd, &mut fetches, &mut sends, &mut settle),
                        None => break,
                    }
                }
                event = live.recv() => {
                    match event {
                        Some(event) => self.handle_socket_event(event, &mut fetches, &mut settle),
                        None => break,
                    }
                }
                Some((channel_id, kind, result)) = fetches.next(), if !fetches.is_empty() => {
                    self.on_fetch_complete(channel_id, kind, result, &mut fetches, &mut settle);
                }
                Some((channel_id, result)) = sends.next(), if !sends.is_empty() => {
                    self.on_send_complete(channel_id, result, &mut fetches, &mut settle);
                }
                _ = OptionFuture::from(settle.as_mut().map(|(sleep, _)| sleep)), if settle.is_some() => {
                    if let Some((_, pending)) = settle.take() {
                        self.on_settle(pending);
                    }
                }
            }
        }
        tracing::debug!("Timeline synchronizer stopped");
    }

    fn handle_command(
        &mut self,
        cmd: TimelineCommand,
        fetches: &mut FuturesUnordered<InFlightFetch>,
        sends: &mut FuturesUnordered<InFlightSend>,
        settle: &mut Option<SettleTimer>,
    ) {
        match cmd {
            TimelineCommand::OpenChannel(channel_id) => {
                self.open_channel(channel_id, fetches, settle)
            }
            TimelineCommand::LoadMore => self.load_older(fetches),
            TimelineCommand::ScrollTo(target_id) => self.scroll_to(target_id, fetches, settle),
            TimelineCommand::Scrolled(geom) => {
                let has_more = self.store.has_more();
                if let Some(effect) = self.anchor.scrolled(geom, has_more) {
                    self.run_effect(effect, fetches);
                }
            }
            TimelineCommand::Rendered(geom) => {
                if let Some(effect) = self.anchor.rendered(geom) {
                    self.run_effect(effect, fetches);
                }
            }
            TimelineCommand::Send(body) => self.send_message(body, sends),
        }
    }

    /// Reset everything for a channel and kick off the newest page.
    ///
    /// An old in-flight fetch is left running; its result dies in the
    /// channel comparison at completion time. That comparison cannot tell
    /// two opens of the same channel apart, so a reopen of the channel
    /// already showing is ignored rather than raced against itself.
    fn open_channel(
        &mut self,
        channel_id: String,
        fetches: &mut FuturesUnordered<InFlightFetch>,
        settle: &mut Option<SettleTimer>,
    ) {
        if self.store.channel_id() == Some(channel_id.as_str()) {
            tracing::debug!("Channel {} is already open", channel_id);
            return;
        }
        tracing::info!("Opening channel {}", channel_id);
        self.store.reset(channel_id.clone());
        self.anchor.reset();
        self.jump.cancel();
        self.current_fetch = None;
        *settle = None;
        if self.typing.clear() {
            self.push(TimelineUpdate::Typing(Vec::new()));
        }

        if self
            .live_tx
            .send(LiveCommand::Subscribe(channel_id.clone()))
            .is_err()
        {
            tracing::warn!("Live stream supervisor is gone");
        }

        self.push(TimelineUpdate::Loading(true));
        self.push(TimelineUpdate::LoadFailed(false));
        self.push_snapshot();

        self.current_fetch = Some(FetchKind::Initial);
        self.spawn_fetch(channel_id, FetchKind::Initial, None, fetches);
    }

    /// Start a backward page fetch for the active channel, suppressed
    /// while another fetch is in flight. Into an empty timeline this
    /// becomes a newest-page (re)load.
    fn load_older(&mut self, fetches: &mut FuturesUnordered<InFlightFetch>) {
        if self.current_fetch.is_some() {
            return;
        }
        let Some(channel_id) = self.store.channel_id().map(str::to_string) else {
            return;
        };

        let before_id = self.store.oldest_id().map(str::to_string);
        let kind = if before_id.is_none() {
            FetchKind::Initial
        } else {
            FetchKind::Older
        };
        if kind == FetchKind::Older && !self.store.has_more() {
            return;
        }

        match kind {
            FetchKind::Initial => self.push(TimelineUpdate::Loading(true)),
            FetchKind::Older => {
                self.anchor.fetch_started();
                self.push(TimelineUpdate::LoadingMore(true));
            }
        }
        self.current_fetch = Some(kind);
        self.spawn_fetch(channel_id, kind, before_id, fetches);
    }

    fn spawn_fetch(
        &self,
        channel_id: String,
        kind: FetchKind,
        before_id: Option<String>,
        fetches: &mut FuturesUnordered<InFlightFetch>,
    ) {
        let api = Arc::clone(&self.api);
        let limit = self.page_size;
        fetches.push(Box::pin(async move {
            let result = api
                .fetch_page(&channel_id, limit, before_id.as_deref())
                .await;
            (channel_id, kind, result)
        }));
    }

    /// A fetch resolved. The channel id captured at request time is
    /// compared against the active channel *here*, never assumed: a
    /// result for a channel the viewer has left is silently dropped.
    fn on_fetch_complete(
        &mut self,
        channel_id: String,
        kind: FetchKind,
        result: Result<MessagePage, FetchError>,
        fetches: &mut FuturesUnordered<InFlightFetch>,
        settle: &mut Option<SettleTimer>,
    ) {
        if self.store.channel_id() != Some(channel_id.as_str()) {
            tracing::debug!("Discarding stale fetch for {}", channel_id);
            return;
        }
        self.current_fetch = None;

        match (kind, result) {
            (FetchKind::Initial, Ok(page)) => {
                self.store.prepend_page(page.messages);
                self.store.set_has_more(page.has_more);
                self.push(TimelineUpdate::Loading(false));
                self.push(TimelineUpdate::LoadFailed(false));
                self.push_snapshot();
                self.start_settle(settle, PendingScroll::Bottom);
                self.drive_jump(fetches, settle);
            }
            (FetchKind::Older, Ok(page)) => {
                let added = self.store.prepend_page(page.messages);
                self.store.set_has_more(page.has_more);
                self.anchor.fetch_resolved(added);
                self.push(TimelineUpdate::LoadingMore(false));
                self.push(TimelineUpdate::LoadFailed(false));
                self.push_snapshot();
                self.drive_jump(fetches, settle);
            }
            (FetchKind::Initial, Err(e)) => {
                tracing::warn!("Newest page load for {} failed: {}", channel_id, e);
                self.push(TimelineUpdate::Loading(false));
                self.push(TimelineUpdate::LoadFailed(true));
            }
            (FetchKind::Older, Err(e)) => {
                tracing::warn!("Older page load for {} failed: {}", channel_id, e);
                self.anchor.fetch_failed();
                self.push(TimelineUpdate::LoadingMore(false));
                self.push(TimelineUpdate::LoadFailed(true));
                // No automatic retry, and no jump step off a failure:
                // the loop resumes only on explicit user action.
            }
        }
    }

    fn handle_socket_event(
        &mut self,
        event: SocketEvent,
        fetches: &mut FuturesUnordered<InFlightFetch>,
        settle: &mut Option<SettleTimer>,
    ) {
        match event {
            SocketEvent::Connected => self.push(TimelineUpdate::Connected(true)),
            SocketEvent::Disconnected => self.push(TimelineUpdate::Connected(false)),
            SocketEvent::Event(channel_id, event) => {
                // Events race channel switches; anything not for the
                // active channel is dropped, unsubscribed or not.
                if self.store.channel_id() != Some(channel_id.as_str()) {
                    tracing::debug!("Ignoring event for inactive channel {}", channel_id);
                    return;
                }
                match event {
                    ChannelEvent::Timeline(mutation) => {
                        self.apply_mutation(mutation, fetches, settle)
                    }
                    ChannelEvent::Typing {
                        user_id,
                        display_name,
                        is_typing,
                    } => {
                        if self.typing.apply(&user_id, &display_name, is_typing) {
                            self.push(TimelineUpdate::Typing(self.typing.names()));
                        }
                    }
                }
            }
        }
    }

    fn apply_mutation(
        &mut self,
        mutation: TimelineMutation,
        fetches: &mut FuturesUnordered<InFlightFetch>,
        settle: &mut Option<SettleTimer>,
    ) {
        let applied = self.store.apply(mutation);
        if applied == Applied::Noop {
            return;
        }
        self.push_snapshot();
        if applied == Applied::Appended {
            if let Some(effect) = self.anchor.appended() {
                self.run_effect(effect, fetches);
            }
        }
        self.drive_jump(fetches, settle);
    }

    fn scroll_to(
        &mut self,
        target_id: String,
        fetches: &mut FuturesUnordered<InFlightFetch>,
        settle: &mut Option<SettleTimer>,
    ) {
        if self.store.channel_id().is_none() {
            tracing::warn!("Jump to {} ignored: no channel open", target_id);
            return;
        }
        self.jump.begin(target_id);
        self.drive_jump(fetches, settle);
    }

    /// Advance a pending jump by at most one step. Called after every
    /// timeline change; deferred while any fetch is in flight, which is
    /// what bounds the backfill to one page load per change cycle.
    fn drive_jump(
        &mut self,
        fetches: &mut FuturesUnordered<InFlightFetch>,
        settle: &mut Option<SettleTimer>,
    ) {
        if self.current_fetch.is_some() {
            return;
        }
        let target_loaded = match self.jump.target() {
            Some(target) => self.store.contains(target),
            None => return,
        };
        match self.jump.step(target_loaded, self.store.has_more()) {
            Some(JumpStep::ScrollTo(id)) => {
                self.start_settle(settle, PendingScroll::Message(id))
            }
            Some(JumpStep::LoadPage) => self.load_older(fetches),
            Some(JumpStep::Abandon) | None => {}
        }
    }

    fn send_message(&mut self, body: String, sends: &mut FuturesUnordered<InFlightSend>) {
        let Some(channel_id) = self.store.channel_id().map(str::to_string) else {
            return;
        };
        let api = Arc::clone(&self.api);
        sends.push(Box::pin(async move {
            let result = api.send_message(&channel_id, &body).await;
            (channel_id, result)
        }));
    }

    /// The server-confirmed message goes through the normal insert path,
    /// so the live echo that follows it de-duplicates by id.
    fn on_send_complete(
        &mut self,
        channel_id: String,
        result: Result<Message, FetchError>,
        fetches: &mut FuturesUnordered<InFlightFetch>,
        settle: &mut Option<SettleTimer>,
    ) {
        match result {
            Ok(message) => {
                if self.store.channel_id() != Some(channel_id.as_str()) {
                    tracing::debug!("Send confirmation for {} after channel switch", channel_id);
                    return;
                }
                self.apply_mutation(TimelineMutation::Insert(message), fetches, settle);
            }
            Err(e) => {
                tracing::warn!("Send to {} failed: {}", channel_id, e);
                self.push(TimelineUpdate::SendFailed(e.to_string()));
            }
        }
    }

    fn run_effect(&mut self, effect: Effect, fetches: &mut FuturesUnordered<InFlightFetch>) {
        match effect {
            Effect::RequestPage => self.load_older(fetches),
            Effect::ToBottom => self.push(TimelineUpdate::Scroll(ScrollCommand::ToBottom)),
            Effect::AdjustBy(delta) => {
                self.push(TimelineUpdate::Scroll(ScrollCommand::AdjustBy(delta)))
            }
        }
    }

    fn start_settle(&self, settle: &mut Option<SettleTimer>, pending: PendingScroll) {
        *settle = Some((Box::pin(time::sleep(self.settle_delay)), pending));
    }

    /// A settle delay elapsed: issue the computed scroll, and arm the
    /// viewport if this was the first one for the channel.
    fn on_settle(&mut self, pending: PendingScroll) {
        match pending {
            PendingScroll::Bottom => {
                self.push(TimelineUpdate::Scroll(ScrollCommand::ToBottom));
            }
            PendingScroll::Message(id) => {
                self.push(TimelineUpdate::Scroll(ScrollCommand::ToMessage(id)));
            }
        }
        if !self.anchor.initial_scroll_done() {
            self.anchor.initial_scroll_settled();
        }
    }

    fn push_snapshot(&self) {
        self.push(TimelineUpdate::Messages {
            messages: self.store.messages().to_vec(),
            has_more: self.store.has_more(),
        });
    }

    fn push(&self, update: TimelineUpdate) {
        if self.updates.send(update).is_err() {
            tracing::debug!("Timeline consumer is gone");
        }
    }
}
