//! TUI implementation for quill

use crossterm::event::EventStream;
use futures::StreamExt;
use quill_chat::{Attachment, ChatSession, ExchangeOutcome, SessionEvent, UserInput};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use std::time::{Duration, Instant};
use quill_tui::{
    Theme, Tui,
    input::{Action, event_to_action},
    widgets::{
        ChatMessage, InputBox, MessageList, Speaker, Spinner,
        message_list::calculate_message_height,
    },
};
use tokio::sync::broadcast::error::TryRecvError;

use crate::clipboard;
use crate::commands::{CommandResult, execute_command};
use crate::exchange::Exchange;

/// How long transient notices stay in the status bar
const NOTICE_TTL: Duration = Duration::from_secs(2);

/// Most rows the input box grows to
const MAX_INPUT_ROWS: u16 = 6;

/// Requests from the UI state to the event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    /// Start an exchange
    Send(Exchange),
    /// Stop the streaming reply
    Stop,
    /// Put text on the clipboard
    Copy(String),
    /// Clear the conversation
    Clear,
    /// Switch the model for new requests
    ChangeModel(String),
    /// Leave the TUI
    Quit,
}

/// TUI application state
pub struct TuiState {
    /// Displayed entries: conversation turns plus local notices
    messages: Vec<ChatMessage>,
    input: InputBox,
    /// First visible line of the message list
    scroll: usize,
    /// Keep the view pinned to the bottom
    follow: bool,
    /// An exchange is in flight
    busy: bool,
    /// Tokens are arriving (false while reconnecting)
    streaming: bool,
    status: String,
    /// Transient status text and when it was set
    notice: Option<(String, Instant)>,
    attachment: Option<Attachment>,
    model: String,
    theme: Theme,
    spinner_start: Instant,
}

impl TuiState {
    pub fn new(model: impl Into<String>, theme: Theme) -> Self {
        let mut input = InputBox::new().with_placeholder("Type a message...");
        input.set_focused(true);

        Self {
            messages: vec![],
            input,
            scroll: 0,
            follow: true,
            busy: false,
            streaming: false,
            status: "Ready".to_string(),
            notice: None,
            attachment: None,
            model: model.into(),
            theme,
            spinner_start: Instant::now(),
        }
    }

    pub fn set_attachment(&mut self, attachment: Option<Attachment>) {
        match &attachment {
            Some(a) => self.input.set_title(format!("attached: {}", a.name)),
            None => self.input.set_title(""),
        }
        self.attachment = attachment;
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    fn set_notice(&mut self, text: impl Into<String>) {
        self.notice = Some((text.into(), Instant::now()));
    }

    /// Show a local notice in the message list
    pub fn show_system_message(&mut self, content: &str) {
        self.messages.push(ChatMessage::notice(content));
        self.scroll_to_bottom();
    }

    pub fn show_error(&mut self, content: &str) {
        self.messages.push(ChatMessage::error(content));
        self.scroll_to_bottom();
    }

    fn scroll_to_bottom(&mut self) {
        self.follow = true;
    }

    /// Drop the conversation from the view
    pub fn clear(&mut self) {
        self.messages.clear();
        self.scroll = 0;
        self.follow = true;
        self.status = "Cleared".to_string();
    }

    /// Mark an exchange as started
    pub fn begin_exchange(&mut self) {
        self.busy = true;
        self.streaming = true;
        self.spinner_start = Instant::now();
        self.status = "Waiting for reply...".to_string();
        self.scroll_to_bottom();
    }

    /// Mark the exchange as over, even if no end event arrived
    pub fn end_exchange(&mut self) {
        self.busy = false;
        self.streaming = false;
        for msg in self.messages.iter_mut() {
            msg.is_streaming = false;
        }
    }

    /// Text of the latest finished assistant reply
    fn latest_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.speaker == Speaker::Assistant && !m.is_streaming)
            .map(|m| m.content.as_str())
    }

    /// Handle session events
    pub fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StreamingChanged { active } => {
                self.streaming = active;
                if active && self.busy {
                    self.status = "Streaming...".to_string();
                }
            }
            SessionEvent::MessageAppended { message } => {
                let entry = if message.is_user() {
                    ChatMessage::user(message.content)
                } else {
                    ChatMessage::assistant(message.content)
                };
                self.messages.push(entry);
                self.scroll_to_bottom();
            }
            SessionEvent::MessageRemoved { message } => {
                let speaker = if message.is_user() {
                    Speaker::User
                } else {
                    Speaker::Assistant
                };
                if let Some(index) = self.messages.iter().rposition(|m| m.speaker == speaker) {
                    self.messages.remove(index);
                }
            }
            SessionEvent::ReplyUpdated { content, .. } => {
                match self.messages.iter_mut().rev().find(|m| m.is_streaming) {
                    Some(entry) => entry.content = content,
                    None => self.messages.push(ChatMessage::assistant_streaming(content)),
                }
            }
            SessionEvent::Retrying {
                attempt,
                max_retries,
                error,
            } => {
                self.status = format!("Reconnecting ({}/{}): {}", attempt, max_retries, error);
            }
            SessionEvent::Cleared => self.clear(),
            SessionEvent::ExchangeEnd { outcome } => {
                self.end_exchange();
                self.status = outcome.describe();
                match outcome {
                    ExchangeOutcome::Failed { .. } | ExchangeOutcome::RetriesExhausted { .. } => {
                        self.show_error(&outcome.describe());
                    }
                    _ => {}
                }
            }
        }
    }

    /// Called on each tick
    pub fn tick(&mut self) {
        if let Some((_, since)) = &self.notice {
            if since.elapsed() >= NOTICE_TTL {
                self.notice = None;
            }
        }
    }

    fn run_command(&mut self, content: &str) -> Option<UiMessage> {
        let result = execute_command(content, &self.model)?;
        match result {
            CommandResult::Clear => Some(UiMessage::Clear),
            CommandResult::Regenerate => Some(UiMessage::Send(Exchange::Regenerate)),
            CommandResult::Copy => self.copy_latest(),
            CommandResult::Attach(attachment) => {
                self.set_notice(format!("Attached {}", attachment.name));
                self.set_attachment(Some(attachment));
                None
            }
            CommandResult::Detach => {
                self.set_attachment(None);
                self.set_notice("Attachment removed");
                None
            }
            CommandResult::ChangeModel(model) => {
                self.show_system_message(&format!("Switched to: {}", model));
                self.set_model(model.clone());
                Some(UiMessage::ChangeModel(model))
            }
            CommandResult::Message(msg) => {
                self.show_system_message(&msg);
                None
            }
            CommandResult::Error(msg) => {
                self.show_error(&msg);
                None
            }
            CommandResult::Exit => Some(UiMessage::Quit),
            CommandResult::Unknown(cmd) => {
                self.show_system_message(&format!(
                    "Unknown command: /{}\nType /help for available commands.",
                    cmd
                ));
                None
            }
        }
    }

    fn copy_latest(&mut self) -> Option<UiMessage> {
        match self.latest_reply() {
            Some(text) => Some(UiMessage::Copy(text.to_string())),
            None => {
                self.set_notice("Nothing to copy");
                None
            }
        }
    }

    /// Called by the loop once the clipboard request went out
    pub fn copied(&mut self) {
        self.set_notice("Copied");
    }

    fn submit(&mut self) -> Option<UiMessage> {
        if self.busy {
            self.set_notice("Wait for the reply to finish (Esc stops it)");
            return None;
        }

        if self.input.content().trim_start().starts_with('/') {
            let content = self.input.take();
            return self.run_command(&content);
        }

        let input = UserInput {
            text: self.input.content().to_string(),
            attachment: self.attachment.clone(),
        };
        if input.is_empty() {
            self.set_notice(quill_chat::Error::EmptyMessage.to_string());
            return None;
        }

        self.input.clear();
        self.set_attachment(None);
        Some(UiMessage::Send(Exchange::Submit(input)))
    }

    /// Handle keyboard action
    pub fn handle_action(&mut self, action: Action) -> Option<UiMessage> {
        match action {
            Action::Submit => self.submit(),
            Action::Quit => Some(UiMessage::Quit),
            Action::Interrupt => {
                if self.busy {
                    self.status = "Stopping...".to_string();
                    Some(UiMessage::Stop)
                } else {
                    Some(UiMessage::Quit)
                }
            }
            Action::Escape => {
                if self.busy {
                    self.status = "Stopping...".to_string();
                    Some(UiMessage::Stop)
                } else {
                    None
                }
            }
            Action::Eof if self.input.is_empty() && !self.busy => Some(UiMessage::Quit),
            Action::Copy => self.copy_latest(),
            Action::Regenerate => {
                if self.busy {
                    return None;
                }
                Some(UiMessage::Send(Exchange::Regenerate))
            }
            Action::Clear => {
                if self.busy {
                    self.set_notice("Wait for the reply to finish");
                    return None;
                }
                Some(UiMessage::Clear)
            }
            Action::PageUp => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(10);
                None
            }
            Action::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                None
            }
            Action::ScrollUp => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(3);
                None
            }
            Action::ScrollDown => {
                self.scroll = self.scroll.saturating_add(3);
                None
            }
            _ => {
                self.input.handle_action(&action);
                None
            }
        }
    }

    /// Render the UI
    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        // Layout: messages (flex), status bar (1), input (grows with content)
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(self.input.height(MAX_INPUT_ROWS)),
            ])
            .split(size);

        self.render_messages(frame, chunks[0]);
        self.render_status(frame, chunks[1]);
        self.input
            .render(chunks[2], frame.buffer_mut(), &self.theme);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!(" quill │ {} ", self.model);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(title);

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 || self.messages.is_empty() {
            frame.render_widget(self.welcome(), inner);
            return;
        }

        let show_actions = !self.busy;
        let content_height =
            calculate_message_height(&self.messages, inner.width as usize, show_actions);
        let max_scroll = content_height.saturating_sub(inner.height as usize);

        if self.follow {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
            if self.scroll == max_scroll {
                self.follow = true;
            }
        }

        let message_list = MessageList::new(&self.messages, &self.theme)
            .scroll(self.scroll)
            .show_actions(show_actions);
        frame.render_widget(message_list, inner);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(content_height)
                .position(self.scroll)
                .viewport_content_length(inner.height as usize);

            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn welcome(&self) -> Paragraph<'static> {
        let key = |k: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(k, Style::default().fg(Color::Cyan)),
                Span::styled(what, Style::default().fg(Color::White)),
            ])
        };

        Paragraph::new(vec![
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    "  quill",
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(" - streaming chat", Style::default().fg(Color::DarkGray)),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!("  Model: {}", self.model),
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(""),
            Line::from(Span::styled("  Keybindings", Style::default().fg(Color::Yellow))),
            Line::from(""),
            key("    Enter        ", "Send message"),
            key("    Shift+Enter  ", "New line"),
            key("    Esc          ", "Stop the reply"),
            key("    Ctrl+R       ", "Retry last reply"),
            key("    Ctrl+Y       ", "Copy last reply"),
            key("    Ctrl+L       ", "Clear conversation"),
            key("    Ctrl+C       ", "Stop / Quit"),
            key("    PgUp/Dn      ", "Scroll history"),
            Line::from(""),
            Line::from(Span::styled(
                "  Type a message, or /help for commands...",
                Style::default().fg(Color::DarkGray),
            )),
        ])
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some((notice, _)) = &self.notice {
            let line = Line::from(Span::styled(notice.as_str(), self.theme.notice_style()));
            frame.render_widget(Paragraph::new(line), area);
            return;
        }

        if self.busy && self.streaming {
            let spinner =
                Spinner::new(&self.status, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let left_content = format!("{} │ {}", self.model, self.status);
        let right_content = "Ctrl+R: retry │ Ctrl+Y: copy │ Ctrl+C: quit";

        let left_width = left_content.chars().count();
        let right_width = right_content.chars().count();
        let available = area.width as usize;

        let left_style = if self.busy {
            self.theme.notice_style()
        } else {
            self.theme.dim_style()
        };

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(left_content, left_style),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right_content, Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(Span::styled(left_content, left_style))
        };

        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Apply a request that needs no access to the session
fn apply_local(state: &mut TuiState, message: &UiMessage) {
    if let UiMessage::Copy(text) = message {
        match clipboard::copy(text) {
            Ok(()) => state.copied(),
            Err(e) => state.show_error(&format!("Copy failed: {}", e)),
        }
    }
}

/// Run the TUI application
pub async fn run_tui(
    session: &mut ChatSession,
    theme: Theme,
    attachment: Option<Attachment>,
) -> anyhow::Result<()> {
    let mut tui = Tui::enter()?;

    let mut state = TuiState::new(session.config().params.model.clone(), theme);
    state.set_attachment(attachment);

    let mut session_rx = session.subscribe();
    let handle = session.handle();

    let mut event_stream = EventStream::new();

    // Tick interval for animations (80ms for smooth spinner)
    let mut tick_interval = tokio::time::interval(Duration::from_millis(80));

    let mut pending: Option<Exchange> = None;

    let result = loop {
        if let Some(request) = pending.take() {
            state.begin_exchange();
            let mut quit = false;

            {
                // The exchange borrows the session; stop it through the handle
                let mut exchange = std::pin::pin!(request.run(session));

                loop {
                    tui.draw(|frame| state.render(frame))?;

                    tokio::select! {
                        biased;

                        result = &mut exchange => {
                            match result {
                                Err(e) if e.is_input_error() => state.set_notice(e.to_string()),
                                Err(e) => state.show_error(&e.to_string()),
                                Ok(None) => state.set_notice("Nothing to regenerate"),
                                Ok(Some(_)) => {}
                            }
                            break;
                        }

                        event = session_rx.recv() => {
                            if let Ok(event) = event {
                                state.handle_session_event(event);
                            }
                        }

                        event = event_stream.next() => {
                            match event {
                                Some(Ok(event)) => {
                                    let Some(action) = event_to_action(event) else { continue };
                                    match state.handle_action(action) {
                                        Some(UiMessage::Stop) => handle.stop(),
                                        Some(UiMessage::Quit) => {
                                            handle.stop();
                                            quit = true;
                                        }
                                        Some(message) => apply_local(&mut state, &message),
                                        None => {}
                                    }
                                }
                                Some(Err(_)) | None => {
                                    handle.stop();
                                    quit = true;
                                }
                            }
                        }

                        _ = tick_interval.tick() => state.tick(),
                    }
                }
            }

            // Drain events emitted after the last poll
            loop {
                match session_rx.try_recv() {
                    Ok(event) => state.handle_session_event(event),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            state.end_exchange();

            if quit {
                break Ok(());
            }
            continue;
        }

        tui.draw(|frame| state.render(frame))?;

        tokio::select! {
            event = session_rx.recv() => {
                if let Ok(event) = event {
                    state.handle_session_event(event);
                }
            }

            event = event_stream.next() => {
                match event {
                    Some(Ok(event)) => {
                        let Some(action) = event_to_action(event) else { continue };
                        match state.handle_action(action) {
                            Some(UiMessage::Send(request)) => pending = Some(request),
                            Some(UiMessage::Clear) => session.clear(),
                            Some(UiMessage::ChangeModel(model)) => session.set_model(model),
                            Some(UiMessage::Quit) => break Ok(()),
                            Some(message) => apply_local(&mut state, &message),
                            None => {}
                        }
                    }
                    Some(Err(e)) => break Err(anyhow::anyhow!("Event error: {}", e)),
                    None => break Ok(()),
                }
            }

            _ = tick_interval.tick() => state.tick(),
        }
    };

    drop(tui);
    result
}
