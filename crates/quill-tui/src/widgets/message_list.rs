//! Message list widget for displaying conversation turns

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

/// Who a displayed entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    /// Local notices (command output, help); never sent upstream
    Notice,
    /// Local error reports
    Error,
}

/// A single entry in the chat view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
    /// Whether tokens are still arriving for this entry
    pub is_streaming: bool,
}

impl ChatMessage {
    fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
            is_streaming: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, content)
    }

    pub fn assistant_streaming(content: impl Into<String>) -> Self {
        Self {
            is_streaming: true,
            ..Self::new(Speaker::Assistant, content)
        }
    }

    pub fn notice(content: impl Into<String>) -> Self {
        Self::new(Speaker::Notice, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Speaker::Error, content)
    }
}

/// Hint shown under the latest reply once it is complete
pub const ACTIONS_HINT: &str = "Ctrl+R retry · Ctrl+Y copy";

/// Widget for displaying a list of chat messages
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
    show_actions: bool,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
            show_actions: false,
        }
    }

    /// Set scroll offset (in lines from the top)
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// Show the retry/copy hint under the latest assistant reply
    pub fn show_actions(mut self, show: bool) -> Self {
        self.show_actions = show;
        self
    }
}

/// Index of the entry that gets the retry/copy hint, if any
fn actions_target(messages: &[ChatMessage]) -> Option<usize> {
    let index = messages
        .iter()
        .rposition(|m| m.speaker != Speaker::Notice)?;
    let msg = &messages[index];
    (msg.speaker == Speaker::Assistant && !msg.is_streaming).then_some(index)
}

fn render_message(
    msg: &ChatMessage,
    theme: &Theme,
    width: usize,
    with_actions: bool,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, label_style, prefix) = match msg.speaker {
        Speaker::User => ("You", theme.accent_bold(), "▶ "),
        Speaker::Assistant => ("Assistant", theme.assistant_bold(), "◀ "),
        Speaker::Notice => ("quill", theme.dim_style(), "● "),
        Speaker::Error => ("Error", theme.error_style(), "✖ "),
    };

    let header = if msg.is_streaming {
        format!("{}{} ▌", prefix, label)
    } else {
        format!("{}{}", prefix, label)
    };
    lines.push(Line::from(Span::styled(header, label_style)));

    let content_style = match msg.speaker {
        Speaker::Error => theme.error_style(),
        Speaker::Notice => theme.dim_style(),
        _ => theme.base_style(),
    };

    let content_width = width.saturating_sub(2).max(1);
    if msg.content.is_empty() && msg.is_streaming {
        lines.push(Line::from(Span::styled("  …", theme.dim_style())));
    } else {
        for line in textwrap::wrap(&msg.content, content_width) {
            lines.push(Line::from(Span::styled(format!("  {}", line), content_style)));
        }
    }

    if with_actions {
        lines.push(Line::from(Span::styled(
            format!("  {}", ACTIONS_HINT),
            Style::default().fg(theme.dim),
        )));
    }

    lines.push(Line::from(""));
    lines
}

fn render_all(
    messages: &[ChatMessage],
    theme: &Theme,
    width: usize,
    show_actions: bool,
) -> Vec<Line<'static>> {
    let target = if show_actions {
        actions_target(messages)
    } else {
        None
    };
    messages
        .iter()
        .enumerate()
        .flat_map(|(i, msg)| render_message(msg, theme, width, target == Some(i)))
        .collect()
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let visible_lines: Vec<Line> = render_all(
            self.messages,
            self.theme,
            area.width as usize,
            self.show_actions,
        )
        .into_iter()
        .skip(self.scroll)
        .take(area.height as usize)
        .collect();

        Paragraph::new(visible_lines).render(area, buf);
    }
}

/// Total height in lines of the rendered messages
pub fn calculate_message_height(
    messages: &[ChatMessage],
    width: usize,
    show_actions: bool,
) -> usize {
    render_all(messages, &Theme::dark(), width, show_actions).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(buf: &Buffer) -> Vec<String> {
        let area = buf.area;
        (area.y..area.y + area.height)
            .map(|y| {
                (area.x..area.x + area.width)
                    .map(|x| buf[(x, y)].symbol())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    fn draw(list: MessageList, width: u16, height: u16) -> Vec<String> {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        list.render(area, &mut buf);
        rows(&buf)
    }

    #[test]
    fn test_renders_roles_and_content() {
        let theme = Theme::dark();
        let messages = vec![ChatMessage::user("hi"), ChatMessage::assistant("Hello")];
        let rows = draw(MessageList::new(&messages, &theme), 30, 6);

        assert_eq!(rows[0], "▶ You");
        assert_eq!(rows[1], "  hi");
        assert_eq!(rows[3], "◀ Assistant");
        assert_eq!(rows[4], "  Hello");
    }

    #[test]
    fn test_streaming_marker() {
        let theme = Theme::dark();
        let messages = vec![ChatMessage::assistant_streaming("")];
        let rows = draw(MessageList::new(&messages, &theme), 30, 3);
        assert_eq!(rows[0], "◀ Assistant ▌");
        assert_eq!(rows[1], "  …");
    }

    #[test]
    fn test_actions_only_on_finished_last_reply() {
        let mut messages = vec![
            ChatMessage::user("q"),
            ChatMessage::assistant("a"),
            ChatMessage::notice("Copied"),
        ];
        assert_eq!(actions_target(&messages), Some(1));

        messages.push(ChatMessage::user("again"));
        assert_eq!(actions_target(&messages), None);

        messages.push(ChatMessage::assistant_streaming("par"));
        assert_eq!(actions_target(&messages), None);
        messages.last_mut().unwrap().is_streaming = false;
        assert_eq!(actions_target(&messages), Some(4));
    }

    #[test]
    fn test_height_matches_rendered_lines() {
        let messages = vec![
            ChatMessage::user("a fairly long question that will need to wrap"),
            ChatMessage::assistant("line one\nline two"),
        ];
        // header + wrapped content + blank, per message
        let plain = calculate_message_height(&messages, 20, false);
        let with_actions = calculate_message_height(&messages, 20, true);
        assert_eq!(with_actions, plain + 1);
        assert_eq!(
            plain,
            (1 + textwrap::wrap(&messages[0].content, 18).len() + 1) + (1 + 2 + 1)
        );
    }

    #[test]
    fn test_scroll_skips_lines() {
        let theme = Theme::dark();
        let messages = vec![ChatMessage::user("one"), ChatMessage::user("two")];
        let rows = draw(MessageList::new(&messages, &theme).scroll(3), 20, 2);
        assert_eq!(rows[0], "▶ You");
        assert_eq!(rows[1], "  two");
    }
}
