//! Channel message API: backward-paginated history and sends
//!
//! The wire returns pages newest-first; the fetcher flips them to
//! ascending before anything downstream sees them.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::models::{Document, Message};

use super::client::ChatClient;

/// One backward page of channel history, ascending by creation time.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// Typed failure surface of the message API. Never retried automatically;
/// callers surface a flag and wait for explicit user action.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("channel not found")]
    ChannelNotFound,
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Seam between the timeline engine and the backend message API.
#[async_trait]
pub trait MessageApi: Send + Sync {
    /// Newest `limit` messages when `before_id` is absent, otherwise up to
    /// `limit` messages strictly older than `before_id`.
    async fn fetch_page(
        &self,
        channel_id: &str,
        limit: usize,
        before_id: Option<&str>,
    ) -> Result<MessagePage, FetchError>;

    /// Send plain text to a channel; returns the server-confirmed message.
    async fn send_message(&self, channel_id: &str, body: &str) -> Result<Message, FetchError>;
}

// -- Wire shapes --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesResponse {
    messages: Vec<Message>,
    has_more: bool,
}

impl MessagesResponse {
    /// Flip the newest-first wire order into ascending display order.
    fn into_page(self) -> MessagePage {
        let mut messages = self.messages;
        messages.reverse();
        MessagePage {
            messages,
            has_more: self.has_more,
        }
    }
}

#[async_trait]
impl MessageApi for ChatClient {
    async fn fetch_page(
        &self,
        channel_id: &str,
        limit: usize,
        before_id: Option<&str>,
    ) -> Result<MessagePage, FetchError> {
        let mut url = self.endpoint(&format!("/api/channels/{}/messages", channel_id));
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        if let Some(before) = before_id {
            url.query_pairs_mut().append_pair("before", before);
        }

        let resp = self.get(url).await?;
        let body: MessagesResponse = resp.json().await.map_err(FetchError::Decode)?;
        Ok(body.into_page())
    }

    async fn send_message(&self, channel_id: &str, body: &str) -> Result<Message, FetchError> {
        let url = self.endpoint(&format!("/api/channels/{}/messages", channel_id));
        let payload = serde_json::json!({ "content": Document::from_text(body) });

        let resp = self.post(url, &payload).await?;
        resp.json().await.map_err(FetchError::Decode)
    }
}

// ---------------------------------------------------------------------------
// One-shot CLI commands
// ---------------------------------------------------------------------------

/// Read the newest messages of a channel (prints to stdout).
pub async fn read_messages(channel_id: &str, limit: usize) -> Result<()> {
    let config = Config::load()?;
    let client = ChatClient::new(&config)?;
    let page = client.fetch_page(channel_id, limit, None).await?;

    if page.messages.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    for msg in &page.messages {
        let time = msg
            .created_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M");
        println!("[{}] {}: {}", time, msg.sender.label(), msg.content.plain_text());
    }
    if page.has_more {
        println!("({} shown, older history available)", page.messages.len());
    }

    Ok(())
}

/// Send a plain-text message to a channel (prints confirmation).
pub async fn send_text(channel_id: &str, message: &str) -> Result<()> {
    let config = Config::load()?;
    let client = ChatClient::new(&config)?;
    let sent = client.send_message(channel_id, message).await?;
    println!("Message sent ({}).", sent.id);
    Ok(())
}
