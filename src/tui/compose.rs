//! Message composer: a one-line input with cursor editing and
//! horizontal scroll.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};

/// Composer state. The cursor is a byte offset into `text`, kept on a
/// char boundary by every edit.
#[derive(Default)]
pub struct ComposeState {
    text: String,
    cursor: usize,
}

impl ComposeState {
    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Remove the char before the cursor.
    pub fn backspace(&mut self) {
        if let Some(c) = self.text[..self.cursor].chars().next_back() {
            self.cursor -= c.len_utf8();
            self.text.remove(self.cursor);
        }
    }

    /// Remove the char under the cursor.
    pub fn delete(&mut self) {
        if self.cursor < self.text.len() {
            self.text.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        if let Some(c) = self.text[..self.cursor].chars().next_back() {
            self.cursor -= c.len_utf8();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(c) = self.text[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    /// Wipe the line (Ctrl+U).
    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Take the trimmed text for sending. Whitespace-only input yields
    /// nothing and stays put.
    pub fn send(&mut self) -> Option<String> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let out = trimmed.to_string();
        self.clear();
        Some(out)
    }

    /// Visible window of the input and the cursor column inside it, for
    /// an input row `width` columns wide (one column is the left margin).
    /// Scrolls so the cursor always stays in view.
    fn window(&self, width: usize) -> (String, usize) {
        let avail = width.saturating_sub(1);
        if avail == 0 {
            return (String::new(), 0);
        }
        let col = self.text[..self.cursor].chars().count();
        let skip = (col + 1).saturating_sub(avail);
        let visible: String = self.text.chars().skip(skip).take(avail).collect();
        (visible, col - skip)
    }
}

/// Composer height: the input row plus its borders.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Draw the composer and park the terminal cursor in it.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, channel_name: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let row = Rect::new(inner.x, inner.y, inner.width, 1);
    let (line, cursor_x) = if state.text.is_empty() {
        let hint: String = format!(" Type a message to {}...", channel_name)
            .chars()
            .take(row.width as usize)
            .collect();
        (
            Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))),
            row.x + 1,
        )
    } else {
        let (visible, col) = state.window(row.width as usize);
        (
            Line::from(Span::styled(
                format!(" {}", visible),
                Style::default().fg(Color::White),
            )),
            row.x + 1 + col as u16,
        )
    };
    Paragraph::new(line).render(row, frame.buffer_mut());
    frame.set_cursor_position((cursor_x, row.y));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(s: &str) -> ComposeState {
        let mut state = ComposeState::default();
        for c in s.chars() {
            state.insert_char(c);
        }
        state
    }

    #[test]
    fn test_insert_and_backspace_track_cursor() {
        let mut state = typed("hi");
        assert_eq!(state.text, "hi");

        state.move_left();
        state.backspace();
        assert_eq!(state.text, "i");
        assert_eq!(state.cursor, 0);

        state.delete();
        assert!(state.text.is_empty());
        // Editing an empty line stays put.
        state.backspace();
        state.move_left();
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn test_multibyte_edits_stay_on_char_boundaries() {
        let mut state = typed("héllo");
        state.move_left();
        state.move_left();
        state.delete();
        assert_eq!(state.text, "hélo");
        state.backspace();
        assert_eq!(state.text, "héo");
        assert_eq!(state.cursor, 3);
    }

    #[test]
    fn test_send_trims_and_rejects_whitespace() {
        let mut state = typed("  hi  ");
        assert_eq!(state.send(), Some("hi".to_string()));
        assert!(state.text.is_empty());

        state.insert_char(' ');
        assert_eq!(state.send(), None);
    }

    #[test]
    fn test_window_scrolls_to_keep_cursor_visible() {
        let state = typed("abcdefghij");
        // Six columns minus the margin leaves five; the window ends at
        // the cursor.
        let (visible, col) = state.window(6);
        assert_eq!(visible, "ghij");
        assert_eq!(col, 4);
    }

    #[test]
    fn test_window_fits_short_input() {
        let mut state = typed("abc");
        state.move_left();
        let (visible, col) = state.window(10);
        assert_eq!(visible, "abc");
        assert_eq!(col, 2);
    }
}
