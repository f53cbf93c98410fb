//! TUI application state and main event loop

use std::sync::Arc;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio_stream::StreamExt;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;

use crate::api::ChatClient;
use crate::config::Config;
use crate::live;
use crate::timeline::{TimelineCommand, TimelineHandle, TimelineUpdate};

use super::compose::ComposeState;
use super::messages::MessagesState;
use super::ui;

/// Application state
pub struct App {
    /// Whether the app should exit
    pub should_exit: bool,
    /// Id of the channel on screen
    pub channel_id: String,
    /// Live connection state
    pub connected: bool,
    /// Newest-page load in progress
    pub loading: bool,
    /// Older-page load in progress
    pub loading_more: bool,
    /// Last load failed
    pub load_failed: bool,
    /// Transient status bar message
    pub status_message: Option<String>,
    /// Whether the status message is an error
    pub status_is_error: bool,
    /// Who is typing, sorted
    pub typing: Vec<String>,
    /// Messages pane state
    pub messages: MessagesState,
    /// Compose box state
    pub compose: ComposeState,
}

impl App {
    pub fn new(channel_id: String) -> Self {
        Self {
            should_exit: false,
            channel_id,
            connected: false,
            loading: false,
            loading_more: false,
            load_failed: false,
            status_message: None,
            status_is_error: false,
            typing: Vec::new(),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
        }
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut ratatui::Frame) {
        ui::render(frame, self);
    }

    /// Fold a synchronizer update into the view state.
    pub fn apply_update(&mut self, update: TimelineUpdate) {
        match update {
            TimelineUpdate::Messages { messages, has_more } => {
                self.messages.set_messages(messages, has_more);
            }
            TimelineUpdate::Loading(active) => self.loading = active,
            TimelineUpdate::LoadingMore(active) => self.loading_more = active,
            TimelineUpdate::LoadFailed(failed) => {
                self.load_failed = failed;
                if failed {
                    self.set_status("Couldn't load messages -- Ctrl-R retries", true);
                } else {
                    self.status_message = None;
                }
            }
            TimelineUpdate::Connected(connected) => self.connected = connected,
            TimelineUpdate::Typing(names) => self.typing = names,
            TimelineUpdate::Scroll(cmd) => self.messages.queue_scroll(cmd),
            TimelineUpdate::SendFailed(reason) => {
                self.set_status(&format!("Send failed: {}", reason), true);
            }
        }
    }

    fn set_status(&mut self, message: &str, is_error: bool) {
        self.status_message = Some(message.to_string());
        self.status_is_error = is_error;
    }

    fn handle_terminal_event(&mut self, event: Event, handle: &TimelineHandle) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key, handle),
            Event::Resize(_, _) => {
                // Picked up on the next draw.
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent, handle: &TimelineHandle) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.should_exit = true,
                KeyCode::Char('u') => self.compose.clear(),
                KeyCode::Char('r') => handle.send(TimelineCommand::LoadMore),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_exit = true,
            KeyCode::Enter => {
                if let Some(text) = self.compose.send() {
                    handle.send(TimelineCommand::Send(text));
                }
            }
            KeyCode::Up => self.scroll_and_report(-1, handle),
            KeyCode::Down => self.scroll_and_report(1, handle),
            KeyCode::PageUp => {
                let page = self.messages.page_height();
                self.scroll_and_report(-page, handle);
            }
            KeyCode::PageDown => {
                let page = self.messages.page_height();
                self.scroll_and_report(page, handle);
            }
            KeyCode::Home => {
                self.messages.scroll_to_top();
                self.report_scrolled(handle);
            }
            KeyCode::End => {
                self.messages.scroll_to_bottom();
                self.report_scrolled(handle);
            }
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Char(c) => self.compose.insert_char(c),
            _ => {}
        }
    }

    fn scroll_and_report(&mut self, delta: i64, handle: &TimelineHandle) {
        self.messages.scroll_by(delta);
        self.report_scrolled(handle);
    }

    fn report_scrolled(&self, handle: &TimelineHandle) {
        if let Some(geom) = self.messages.geometry() {
            handle.send(TimelineCommand::Scrolled(geom));
        }
    }

    /// Post-paint geometry report; how prepend anchor corrections get
    /// measured on the synchronizer side.
    fn report_rendered(&self, handle: &TimelineHandle) {
        if let Some(geom) = self.messages.geometry() {
            handle.send(TimelineCommand::Rendered(geom));
        }
    }
}

/// Run the full-screen client for one channel, optionally jumping to a
/// message id once it is loaded.
pub async fn run(channel_id: String, jump_to: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let client = ChatClient::new(&config)?;

    let (live_cmd_tx, live_cmd_rx) = mpsc::unbounded_channel();
    let (socket_tx, socket_rx) = mpsc::unbounded_channel();
    {
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = live::connect_and_run(config, live_cmd_rx, socket_tx).await {
                tracing::error!("Live connection supervisor failed: {:#}", e);
            }
        });
    }

    let handle = TimelineHandle::start(&config, Arc::new(client), live_cmd_tx, socket_rx);
    handle.send(TimelineCommand::OpenChannel(channel_id.clone()));
    if let Some(target) = jump_to {
        handle.send(TimelineCommand::ScrollTo(target));
    }

    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, handle, channel_id).await;
    ratatui::restore();
    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    mut handle: TimelineHandle,
    channel_id: String,
) -> Result<()> {
    let mut app = App::new(channel_id);
    let mut events = EventStream::new();

    while !app.should_exit {
        terminal.draw(|frame| app.render(frame))?;
        app.report_rendered(&handle);

        tokio::select! {
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => app.handle_terminal_event(event, &handle),
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }
            update = handle.recv() => {
                match update {
                    Some(update) => app.apply_update(update),
                    None => break,
                }
            }
        }
    }

    Ok(())
}
