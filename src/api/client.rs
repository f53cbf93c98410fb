//! Authenticated HTTP client for the Chatline API
//!
//! Wraps reqwest::Client with bearer-token injection and uniform
//! status handling.

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use url::Url;

use crate::api::FetchError;
use crate::config::Config;

/// Authenticated client for one Chatline server.
pub struct ChatClient {
    http: reqwest::Client,
    server: Url,
    token: String,
}

impl ChatClient {
    /// Build a client from a loaded config.
    pub fn new(config: &Config) -> Result<Self> {
        let server = Url::parse(&config.server_url)
            .with_context(|| format!("Invalid server_url '{}'", config.server_url))?;
        if config.api_token.is_empty() {
            bail!("No API token configured. Run 'chatline-cli init' and edit the config file.");
        }
        Ok(Self {
            http: reqwest::Client::new(),
            server,
            token: config.api_token.clone(),
        })
    }

    /// Server URL with `path` as the absolute path and no query.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.server.clone();
        url.set_path(path);
        url.set_query(None);
        url
    }

    /// GET with bearer auth.
    pub async fn get(&self, url: Url) -> Result<reqwest::Response, FetchError> {
        tracing::debug!("GET {}", url);
        let resp = self.http.get(url).bearer_auth(&self.token).send().await?;
        check_response(resp).await
    }

    /// POST a JSON body with bearer auth.
    pub async fn post(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, FetchError> {
        tracing::debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        check_response(resp).await
    }
}

/// Map non-success status codes onto the typed failure surface.
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::ChannelNotFound);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Status {
            code: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}
