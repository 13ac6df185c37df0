//! Input handling

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Processed input action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Regular character input
    Char(char),
    /// Enter: send the message
    Submit,
    /// Shift+Enter, Alt+Enter or Ctrl+J: line break in the message
    Newline,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    /// Move to start of line
    Home,
    /// Move to end of line
    End,
    PageUp,
    PageDown,
    /// Escape: stop the streaming reply
    Escape,
    /// Ctrl+C: stop, or quit when idle
    Interrupt,
    /// Ctrl+D (EOF)
    Eof,
    /// Ctrl+L: clear the conversation
    Clear,
    /// Ctrl+U: clear the input
    ClearLine,
    /// Ctrl+W: delete the word before the cursor
    DeleteWord,
    /// Bracketed paste
    Paste(String),
    /// Ctrl+Y: copy the latest reply
    Copy,
    /// Ctrl+R: regenerate the latest reply
    Regenerate,
    /// Ctrl+Q
    Quit,
    /// Mouse wheel up
    ScrollUp,
    /// Mouse wheel down
    ScrollDown,
    Unknown,
}

/// Convert a crossterm key event to an action
pub fn key_to_action(event: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = event;

    if code == KeyCode::Enter {
        return if modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
            Action::Newline
        } else {
            Action::Submit
        };
    }

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Action::Interrupt,
            KeyCode::Char('d') => Action::Eof,
            KeyCode::Char('l') => Action::Clear,
            KeyCode::Char('u') => Action::ClearLine,
            KeyCode::Char('w') => Action::DeleteWord,
            KeyCode::Char('j') => Action::Newline,
            KeyCode::Char('y') => Action::Copy,
            KeyCode::Char('r') => Action::Regenerate,
            KeyCode::Char('q') => Action::Quit,
            _ => Action::Unknown,
        };
    }

    if modifiers.contains(KeyModifiers::ALT) {
        return Action::Unknown;
    }

    match code {
        KeyCode::Char(c) => Action::Char(c),
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Up => Action::Up,
        KeyCode::Down => Action::Down,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Esc => Action::Escape,
        _ => Action::Unknown,
    }
}

/// Convert a crossterm event to an action
///
/// Key releases (reported by terminals with enhanced keyboard support) are
/// dropped so each press acts once.
pub fn event_to_action(event: Event) -> Option<Action> {
    use crossterm::event::MouseEventKind;

    match event {
        Event::Key(key_event) if key_event.kind != KeyEventKind::Release => {
            Some(key_to_action(key_event))
        }
        Event::Paste(text) => Some(Action::Paste(text)),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => Some(Action::ScrollUp),
            MouseEventKind::ScrollDown => Some(Action::ScrollDown),
            _ => None,
        },
        _ => None,
    }
}
