//! Chatline WebSocket connection and frame handling

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::{Position, Url};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct ChatSocket {
    stream: WsStream,
}

impl ChatSocket {
    /// Connect to the live endpoint.
    ///
    /// Auth is the bearer token in the URL query; no headers or auth
    /// frames are needed on the WebSocket itself.
    pub async fn connect(url: &Url) -> Result<Self> {
        tracing::info!("Connecting WebSocket to {}", &url[..Position::AfterPath]);

        let (stream, response) = connect_async(url.as_str())
            .await
            .context("WebSocket connection failed")?;

        tracing::info!("WebSocket connected (status={})", response.status());

        Ok(Self { stream })
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, msg: &str) -> Result<()> {
        tracing::debug!("WS send: {}", msg);
        self.stream
            .send(Message::Text(msg.to_string()))
            .await
            .context("Failed to send WebSocket message")
    }

    /// Receive the next text frame, answering pings. Returns None when the
    /// server closes the connection.
    pub async fn recv_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("WS recv: {}", text);
                    return Ok(Some(text));
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(e).context("WebSocket receive error");
                }
                None => {
                    return Ok(None);
                }
            }
        }
    }
}

/// Live endpoint URL for a server base URL: http(s) flips to ws(s), the
/// bearer token and a fresh endpoint id ride in the query.
pub fn live_url(server_url: &str, token: &str) -> Result<Url> {
    let mut url = Url::parse(server_url).context("Invalid server_url")?;
    let ws_scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => bail!("Unsupported server_url scheme '{}'", other),
    };
    if url.set_scheme(ws_scheme).is_err() {
        bail!("Cannot derive a WebSocket URL from '{}'", server_url);
    }
    url.set_path("/api/live");

    let endpoint_id = uuid::Uuid::new_v4();
    url.query_pairs_mut()
        .clear()
        .append_pair("token", token)
        .append_pair("endpoint", &endpoint_id.to_string());

    Ok(url)
}
