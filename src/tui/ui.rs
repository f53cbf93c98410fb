//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

use super::app::App;
use super::compose;

/// Returns status indicator symbol and color based on connection state
fn status_indicator(connected: bool) -> (&'static str, Color) {
    if connected {
        ("*", Color::Green)
    } else {
        ("o", Color::Red)
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    // Layout: header (1) + messages + typing (1) + compose (3) + status (1)
    let [header_area, messages_area, typing_area, compose_area, status_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(compose::COMPOSE_HEIGHT),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    app.messages.render(messages_area, frame.buffer_mut());

    render_typing(typing_area, frame.buffer_mut(), &app.typing);

    compose::render(compose_area, frame, &app.compose, &app.channel_id);

    render_status(status_area, frame.buffer_mut(), app);
}

/// Render the header bar
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = Span::styled(
        " Chatline",
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let (status_symbol, status_color) = status_indicator(app.connected);
    let connection = Span::styled(
        format!(" {} ", status_symbol),
        Style::default().fg(status_color),
    );

    let channel = Span::styled(
        format!(" {} ", app.channel_id),
        Style::default().fg(Color::Cyan),
    );

    // Right-align channel and connection indicator.
    let left_width = " Chatline".len();
    let right_width = app.channel_id.len() + status_symbol.len() + 5;
    let padding_width = area.width.saturating_sub((left_width + right_width) as u16) as usize;
    let padding = Span::raw(" ".repeat(padding_width));

    let header_line = Line::from(vec![title, padding, channel, connection]);
    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the typing footer line
fn render_typing(area: Rect, buf: &mut Buffer, names: &[String]) {
    let Some(text) = typing_line(names) else {
        return;
    };
    let line = Line::from(Span::styled(
        format!(" {}", text),
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::ITALIC),
    ));
    Paragraph::new(line).render(area, buf);
}

/// Typing footer text for the given sorted name list.
fn typing_line(names: &[String]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(format!("{} is typing...", one)),
        [one, two] => Some(format!("{} and {} are typing...", one, two)),
        more => Some(format!("{} people are typing...", more.len())),
    }
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    // If there's a status message, show it prominently.
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} ", msg), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let (conn_symbol, conn_color) = status_indicator(app.connected);
    let connection_state = if app.connected {
        "connected"
    } else {
        "reconnecting"
    };
    let connection = Span::styled(
        format!(" {} {} ", conn_symbol, connection_state),
        Style::default().fg(conn_color),
    );

    let sep_style = Style::default().fg(Color::DarkGray);

    let activity = if app.loading {
        "loading history"
    } else if app.loading_more {
        "loading older messages"
    } else {
        ""
    };
    let activity_span = Span::styled(activity, Style::default().fg(Color::Yellow));

    let hints = Span::styled(
        "Esc: quit | End: newest | Ctrl-R: reload",
        Style::default().fg(Color::Gray),
    );

    let mut spans = vec![connection, Span::styled(" | ", sep_style)];
    if !activity.is_empty() {
        spans.push(activity_span);
        spans.push(Span::styled(" | ", sep_style));
    }
    spans.push(hints);

    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_line_shapes() {
        assert_eq!(typing_line(&[]), None);
        assert_eq!(
            typing_line(&["Ada".to_string()]),
            Some("Ada is typing...".to_string())
        );
        assert_eq!(
            typing_line(&["Ada".to_string(), "Grace".to_string()]),
            Some("Ada and Grace are typing...".to_string())
        );
        assert_eq!(
            typing_line(&[
                "Ada".to_string(),
                "Grace".to_string(),
                "Edsger".to_string()
            ]),
            Some("3 people are typing...".to_string())
        );
    }
}
