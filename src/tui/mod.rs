//! TUI module for the Chatline client
//!
//! Terminal user interface using Ratatui.

mod app;
mod compose;
mod messages;
mod ui;

pub use app::run;
