//! Messages pane: renders the timeline and executes scroll effects.
//!
//! The pane flattens messages into a line buffer each paint and keeps the
//! per-message line ranges, which is what scroll-to-message and the
//! geometry reports are computed from. Scroll policy (following, anchor
//! corrections, pagination triggers) lives in the synchronizer; this pane
//! only moves its own offset and reports what it sees.

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::models::Message;
use crate::timeline::viewport::Geometry;
use crate::timeline::ScrollCommand;

/// State for the messages pane.
pub struct MessagesState {
    /// Timeline snapshot, ascending by server receive order.
    messages: Vec<Message>,
    /// Older history exists above the first loaded message.
    has_more: bool,
    /// Vertical scroll offset (in rendered lines, 0 = top).
    scroll_top: usize,
    /// Total line count of the last paint.
    content_height: usize,
    /// Visible height of the last paint.
    viewport_height: usize,
    /// Scroll effect to execute on the next paint.
    pending_scroll: Option<ScrollCommand>,
    /// Message id to mark after a jump.
    highlight: Option<String>,
}

impl Default for MessagesState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            has_more: false,
            scroll_top: 0,
            content_height: 0,
            viewport_height: 0,
            pending_scroll: None,
            highlight: None,
        }
    }
}

impl MessagesState {
    /// Replace the timeline snapshot. The offset is left alone: any
    /// correction arrives separately as a scroll effect.
    pub fn set_messages(&mut self, messages: Vec<Message>, has_more: bool) {
        self.messages = messages;
        self.has_more = has_more;
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Queue a scroll effect; it executes on the next paint, when the
    /// line buffer for the current snapshot exists.
    pub fn queue_scroll(&mut self, cmd: ScrollCommand) {
        self.pending_scroll = Some(cmd);
    }

    /// Manual scroll by `delta` lines (negative = up).
    pub fn scroll_by(&mut self, delta: i64) {
        let top = self.scroll_top as i64 + delta;
        self.scroll_top = top.max(0) as usize;
        self.clamp_scroll();
        self.highlight = None;
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_top = 0;
        self.highlight = None;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll();
        self.highlight = None;
    }

    /// Page height for PageUp/PageDown.
    pub fn page_height(&self) -> i64 {
        (self.viewport_height.max(1)) as i64
    }

    /// Geometry of the last paint, `None` before anything was drawn.
    pub fn geometry(&self) -> Option<Geometry> {
        if self.viewport_height == 0 {
            return None;
        }
        Some(Geometry {
            top: self.scroll_top,
            content_height: self.content_height,
            viewport_height: self.viewport_height,
        })
    }

    fn max_scroll(&self) -> usize {
        self.content_height.saturating_sub(self.viewport_height)
    }

    fn clamp_scroll(&mut self) {
        self.scroll_top = self.scroll_top.min(self.max_scroll());
    }

    fn execute_scroll(&mut self, cmd: ScrollCommand, ranges: &[(usize, usize)]) {
        match cmd {
            ScrollCommand::ToBottom => {
                self.scroll_top = self.max_scroll();
                self.highlight = None;
            }
            ScrollCommand::AdjustBy(delta) => {
                let top = self.scroll_top as i64 + delta;
                self.scroll_top = top.max(0) as usize;
                self.clamp_scroll();
            }
            ScrollCommand::ToMessage(id) => {
                if let Some(idx) = self.messages.iter().position(|m| m.id == id) {
                    if let Some((start, _)) = ranges.get(idx) {
                        self.scroll_top = (*start).min(self.max_scroll());
                        self.highlight = Some(id);
                    }
                }
            }
        }
    }

    /// Render the pane and settle any queued scroll against the freshly
    /// built line buffer.
    pub fn render(&mut self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Plain)
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let (all_lines, ranges) =
            build_message_lines(&self.messages, self.has_more, inner.width as usize, &self.highlight);

        self.content_height = all_lines.len();
        self.viewport_height = inner.height as usize;

        if let Some(cmd) = self.pending_scroll.take() {
            self.execute_scroll(cmd, &ranges);
        }
        self.clamp_scroll();

        let total_lines = all_lines.len();
        let visible_height = inner.height as usize;
        let scroll = self.scroll_top;

        for (row, line_idx) in (scroll..total_lines).take(visible_height).enumerate() {
            let y = inner.y + row as u16;
            let line_area = Rect::new(inner.x, y, inner.width, 1);
            Paragraph::new(all_lines[line_idx].clone()).render(line_area, buf);
        }

        // Scroll indicators at the right edge.
        if total_lines > visible_height {
            let indicator_x = inner.x + inner.width.saturating_sub(1);
            if scroll > 0 {
                let cell = &mut buf[(indicator_x, inner.y)];
                cell.set_char('^');
                cell.set_style(Style::default().fg(Color::DarkGray));
            }
            if scroll + visible_height < total_lines {
                let bottom_y = inner.y + inner.height.saturating_sub(1);
                let cell = &mut buf[(indicator_x, bottom_y)];
                cell.set_char('v');
                cell.set_style(Style::default().fg(Color::DarkGray));
            }
        }
    }
}

/// Build the flat line buffer and per-message line ranges in a single pass.
fn build_message_lines(
    messages: &[Message],
    has_more: bool,
    width: usize,
    highlight: &Option<String>,
) -> (Vec<Line<'static>>, Vec<(usize, usize)>) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    if has_more {
        lines.push(Line::from(Span::styled(
            "-- older history above --",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        )));
    }

    let content_width = width.saturating_sub(2);
    for msg in messages {
        let start = lines.len();
        let marked = highlight.as_deref() == Some(msg.id.as_str());
        render_message(&mut lines, msg, content_width, marked);
        lines.push(Line::from(""));
        ranges.push((start, lines.len()));
    }

    (lines, ranges)
}

/// Render a single message into the line buffer.
fn render_message(lines: &mut Vec<Line<'static>>, msg: &Message, width: usize, marked: bool) {
    let marker = if marked { "> " } else { "  " };
    let marker_style = Style::default().fg(Color::Yellow);

    // Header: sender, local time, edit and pin markers.
    let mut header = vec![
        Span::styled(marker.to_string(), marker_style),
        Span::styled(
            msg.sender.label().to_string(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", msg.created_at.with_timezone(&Local).format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if msg.updated_at.is_some() {
        header.push(Span::styled(
            " (edited)".to_string(),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if msg.pinned {
        header.push(Span::styled(
            " [pinned]".to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }
    lines.push(Line::from(header));

    // Quoted parent, one line.
    if let Some(parent) = &msg.reply_to {
        let excerpt = truncate(&parent.content.plain_text().replace('\n', " "), 60);
        lines.push(Line::from(Span::styled(
            format!("  | {}: {}", parent.sender.label(), excerpt),
            Style::default().fg(Color::DarkGray),
        )));
    }

    if let Some(origin) = &msg.forwarded_from {
        lines.push(Line::from(Span::styled(
            format!("  (forwarded from {})", origin),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
        )));
    }

    // Body, word-wrapped.
    for text_line in wrap_text(&msg.content.plain_text(), width.saturating_sub(2)) {
        lines.push(Line::from(Span::raw(format!("  {}", text_line))));
    }

    for att in &msg.attachments {
        lines.push(Line::from(Span::styled(
            format!("  [{}] {}", att.kind.label(), att.name),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::DIM),
        )));
    }

    if !msg.reactions.is_empty() {
        let mut spans: Vec<Span<'static>> = vec![Span::raw("  ".to_string())];
        for (i, r) in msg.reactions.iter().enumerate() {
            spans.push(Span::styled(
                format!("{} {}", r.emoji, r.counter),
                Style::default().fg(Color::Yellow),
            ));
            if i + 1 < msg.reactions.len() {
                spans.push(Span::raw("   "));
            }
        }
        lines.push(Line::from(spans));
    }
}

/// Word-wrap to terminal columns, measured with unicode display width.
/// Words wider than the limit get a line of their own.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            result.push(line.to_string());
        } else {
            let mut current = String::new();
            for word in line.split_whitespace() {
                if current.is_empty() {
                    current = word.to_string();
                } else if current.width() + 1 + word.width() <= max_width {
                    current.push(' ');
                    current.push_str(word);
                } else {
                    result.push(current);
                    current = word.to_string();
                }
            }
            if !current.is_empty() {
                result.push(current);
            }
        }
    }
    result
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
