//! Configuration storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Chatline server (http or https)
    pub server_url: String,
    /// Opaque API token, sent as bearer auth
    pub api_token: String,
    /// Messages per history page
    pub page_size: usize,
    /// Scroll rows from the top that arm backward pagination
    pub near_top_rows: usize,
    /// Settle delay before computed scrolls, in milliseconds
    pub settle_delay_ms: u64,
    /// Maximum pages a jump-to-message may backfill before giving up
    pub jump_page_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "https://chat.example.com".to_string(),
            api_token: String::new(),
            page_size: 50,
            near_top_rows: 3,
            settle_delay_ms: 120,
            jump_page_limit: 32,
        }
    }
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "chatline-cli", "chatline-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory for log files and other cache data
    pub fn cache_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "chatline-cli", "chatline-cli")
            .context("Could not determine cache directory")?;
        Ok(proj_dirs.cache_dir().to_path_buf())
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Restrictive permissions: the file carries the API token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }
}
