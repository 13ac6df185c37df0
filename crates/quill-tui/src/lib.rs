//! quill-tui: terminal widgets for the chat client
//!
//! Built on ratatui and crossterm. The widgets hold no session state; the
//! binary owns the event loop and feeds them what to draw.

pub mod input;
pub mod terminal;
pub mod theme;
pub mod widgets;

pub use terminal::Tui;
pub use theme::Theme;
