//! Chatline CLI - terminal client for Chatline servers
//!
//! Paginated history, live updates and a full-screen channel view.

mod api;
mod config;
mod live;
mod models;
mod timeline;
mod tui;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;

#[derive(Parser)]
#[command(name = "chatline-cli")]
#[command(about = "Terminal client for Chatline servers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write server URL and API token to the config file
    Init {
        /// Base URL of the server, e.g. https://chat.example.com
        #[arg(long)]
        server: String,

        /// API token, sent as bearer auth
        #[arg(long)]
        token: String,
    },

    /// Show configuration status
    Status,

    /// Read recent messages from a channel
    Read {
        /// Channel ID
        channel_id: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// Channel ID
        #[arg(short, long)]
        to: String,

        /// Message content
        message: String,
    },

    /// Stream a channel's live events to stdout
    Tail {
        /// Channel ID
        channel_id: String,
    },

    /// Watch a channel in the full-screen interface
    Watch {
        /// Channel ID
        channel_id: String,

        /// Jump to this message id once loaded
        #[arg(long)]
        at: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match cli.command {
        Commands::Init { server, token } => {
            init_config(server, token)?;
        }
        Commands::Status => {
            show_status()?;
        }
        Commands::Read { channel_id, limit } => {
            api::read_messages(&channel_id, limit).await?;
        }
        Commands::Send { to, message } => {
            tracing::info!("Sending message...");
            api::send_message(&to, &message).await?;
        }
        Commands::Tail { channel_id } => {
            live::tail(&channel_id).await?;
        }
        Commands::Watch { channel_id, at } => {
            tui::run(channel_id, at).await?;
        }
    }

    Ok(())
}

/// Initialize logging. The full-screen interface owns the terminal, so
/// `watch` logs to a file under the cache directory instead of stderr.
fn init_logging(cli: &Cli) -> Result<()> {
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if matches!(cli.command, Commands::Watch { .. }) {
        let dir = Config::cache_dir()?;
        fs::create_dir_all(&dir).context("Failed to create cache directory")?;
        let file =
            fs::File::create(dir.join("chatline.log")).context("Failed to open log file")?;
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

/// Write server and token to the config file, keeping any tuning values
/// already there. A config file that no longer parses starts over from
/// defaults.
fn init_config(server: String, token: String) -> Result<()> {
    url::Url::parse(&server).context("Invalid server URL")?;

    let mut config = Config::load().unwrap_or_default();
    config.server_url = server;
    config.api_token = token;
    config.save()?;

    println!("Configuration written to {}", Config::path()?.display());
    Ok(())
}

fn show_status() -> Result<()> {
    let path = Config::path()?;
    let config = Config::load()?;

    println!("Config file: {}", path.display());
    println!("Server: {}", config.server_url);
    if config.api_token.is_empty() {
        println!("API token: (not set -- run 'chatline-cli init')");
    } else {
        println!("API token: set");
    }
    println!("Page size: {}", config.page_size);

    Ok(())
}
