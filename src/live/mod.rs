//! Chatline live event stream client
//!
//! Maintains one WebSocket connection to the server's live endpoint and
//! feeds normalized events to a consumer over a channel.

pub mod socket;
pub mod wire;

use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time;

use crate::config::Config;
use wire::{ChannelEvent, MessageChange, TimelineMutation};

/// Consumer → supervisor commands.
#[derive(Debug)]
pub enum LiveCommand {
    /// Subscribe to one channel's stream (replaces any previous subscription).
    Subscribe(String),
}

/// Supervisor → consumer updates.
#[derive(Debug)]
pub enum SocketEvent {
    Connected,
    Disconnected,
    /// A normalized event with the id of the channel it belongs to.
    Event(String, ChannelEvent),
}

/// Reason the inner session loop exited.
enum DisconnectReason {
    /// Consumer went away. Do not reconnect.
    Shutdown,
    /// Error or server-initiated close. Should reconnect.
    Error(anyhow::Error),
}

/// Run the live connection with automatic reconnection.
///
/// On transient errors or server-initiated disconnects, reconnects with
/// exponential backoff (1s, 2s, 4s, ... capped at 64s); a session that
/// stayed up for 60s resets the backoff. Exits when the command sender
/// or the event receiver is dropped.
pub async fn connect_and_run(
    config: Config,
    mut commands: mpsc::UnboundedReceiver<LiveCommand>,
    events: mpsc::UnboundedSender<SocketEvent>,
) -> Result<()> {
    let mut backoff = 1u64;
    let mut subscribed: Option<String> = None;

    loop {
        match run_session(&config, &mut commands, &events, &mut subscribed).await {
            Ok(DisconnectReason::Shutdown) => {
                return Ok(());
            }
            Ok(DisconnectReason::Error(e)) => {
                // Connection was stable (>60s), reset backoff before reconnecting.
                backoff = 1;
                if events.send(SocketEvent::Disconnected).is_err() {
                    return Ok(());
                }
                tracing::warn!(
                    "Live stream disconnected after stable session: {:#}. Reconnecting in 1s...",
                    e,
                );
                time::sleep(Duration::from_secs(1)).await;
            }
            Err(e) => {
                if events.send(SocketEvent::Disconnected).is_err() {
                    return Ok(());
                }
                tracing::warn!(
                    "Live stream disconnected: {:#}. Reconnecting in {}s...",
                    e,
                    backoff
                );

                tokio::select! {
                    _ = time::sleep(Duration::from_secs(backoff)) => {}
                    cmd = commands.recv() => match cmd {
                        // Reconnect immediately with the new subscription.
                        Some(LiveCommand::Subscribe(channel_id)) => subscribed = Some(channel_id),
                        None => return Ok(()),
                    },
                }

                backoff = (backoff * 2).min(64);
            }
        }
    }
}

/// Run one full live session: connect, re-subscribe, event loop.
///
/// Returns `DisconnectReason::Shutdown` when the consumer went away, or
/// `DisconnectReason::Error` when the connection should be retried.
async fn run_session(
    config: &Config,
    commands: &mut mpsc::UnboundedReceiver<LiveCommand>,
    events: &mpsc::UnboundedSender<SocketEvent>,
    subscribed: &mut Option<String>,
) -> Result<DisconnectReason> {
    let url = socket::live_url(&config.server_url, &config.api_token)?;
    let mut ws = socket::ChatSocket::connect(&url).await?;

    if events.send(SocketEvent::Connected).is_err() {
        return Ok(DisconnectReason::Shutdown);
    }

    // Restore the subscription from before the reconnect.
    if let Some(channel_id) = subscribed.as_deref() {
        ws.send_text(&wire::subscribe_frame(channel_id)).await?;
    }

    // Stability threshold: reset backoff after 60s of successful connection.
    let connected_at = Instant::now();
    let stability_threshold = Duration::from_secs(60);

    let mut heartbeat = time::interval(Duration::from_secs(30));
    heartbeat.tick().await; // skip first immediate tick

    let disconnect_reason = loop {
        tokio::select! {
            frame = ws.recv_frame() => {
                match frame {
                    Ok(Some(text)) => {
                        if let Some(envelope) = wire::parse_frame(&text) {
                            let (channel_id, event) = envelope.normalize();
                            if events.send(SocketEvent::Event(channel_id, event)).is_err() {
                                break DisconnectReason::Shutdown;
                            }
                        }
                    }
                    Ok(None) => {
                        break DisconnectReason::Error(anyhow::anyhow!("WebSocket closed by server"));
                    }
                    Err(e) => {
                        break DisconnectReason::Error(e.context("WebSocket recv error"));
                    }
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(LiveCommand::Subscribe(channel_id)) => {
                        ws.send_text(&wire::subscribe_frame(&channel_id)).await?;
                        *subscribed = Some(channel_id);
                    }
                    None => {
                        break DisconnectReason::Shutdown;
                    }
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = ws.send_text(&wire::ping_frame()).await {
                    break DisconnectReason::Error(e.context("Heartbeat send failed"));
                }
            }
        }
    };

    // If we were connected long enough, report Ok so the caller resets backoff.
    if connected_at.elapsed() >= stability_threshold {
        return Ok(disconnect_reason);
    }

    match disconnect_reason {
        DisconnectReason::Shutdown => Ok(DisconnectReason::Shutdown),
        DisconnectReason::Error(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Headless CLI mode
// ---------------------------------------------------------------------------

/// Stream one channel's live events to stdout until Ctrl-C.
pub async fn tail(channel_id: &str) -> Result<()> {
    let config = Config::load()?;

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    cmd_tx
        .send(LiveCommand::Subscribe(channel_id.to_string()))
        .ok();
    tokio::spawn(connect_and_run(config, cmd_rx, event_tx));

    println!("Listening on {} (Ctrl-C to stop)", channel_id);

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(SocketEvent::Connected) => println!("(connected)"),
                    Some(SocketEvent::Disconnected) => println!("(disconnected, retrying...)"),
                    Some(SocketEvent::Event(chan, event)) if chan == channel_id => {
                        print_event(&event);
                    }
                    Some(SocketEvent::Event(..)) => {}
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                break;
            }
        }
    }

    Ok(())
}

fn print_event(event: &ChannelEvent) {
    match event {
        ChannelEvent::Timeline(TimelineMutation::Insert(msg)) => {
            println!("[new] {}: {}", msg.sender.label(), msg.content.plain_text());
        }
        ChannelEvent::Timeline(TimelineMutation::Update { id, changes }) => {
            let kinds: Vec<&str> = changes
                .iter()
                .map(|c| match c {
                    MessageChange::Text { .. } => "text",
                    MessageChange::Pin { .. } => "pin",
                    MessageChange::Reaction { .. } => "reaction",
                })
                .collect();
            println!("[update] {} ({})", id, kinds.join(", "));
        }
        ChannelEvent::Timeline(TimelineMutation::Replace(msg)) => {
            println!("[update] {} (reaction confirmed)", msg.id);
        }
        ChannelEvent::Timeline(TimelineMutation::Remove { id }) => {
            println!("[deleted] {}", id);
        }
        ChannelEvent::Typing {
            display_name,
            is_typing,
            ..
        } => {
            if *is_typing {
                println!("({} is typing...)", display_name);
            }
        }
    }
}
