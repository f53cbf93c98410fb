//! API client module for the Chatline backend

pub mod client;
mod messages;

pub use client::ChatClient;
pub use messages::{FetchError, MessageApi, MessagePage};

use anyhow::Result;

/// Read the newest messages of a channel
pub async fn read_messages(channel_id: &str, limit: usize) -> Result<()> {
    messages::read_messages(channel_id, limit).await
}

/// Send a plain-text message to a channel
pub async fn send_message(to: &str, message: &str) -> Result<()> {
    messages::send_text(to, message).await
}
