//! Clipboard access through the terminal (OSC 52)

use crossterm::{clipboard::CopyToClipboard, execute};
use std::io::{self, Write};

/// Ask the terminal to put `text` on the system clipboard.
///
/// Terminals without OSC 52 support silently ignore the request.
pub fn copy(text: &str) -> io::Result<()> {
    copy_to(&mut io::stdout(), text)
}

/// Write the OSC 52 request to `out`
pub fn copy_to(out: &mut impl Write, text: &str) -> io::Result<()> {
    execute!(out, CopyToClipboard::to_clipboard_from(text))?;
    tracing::debug!(bytes = text.len(), "copied to clipboard");
    Ok(())
}
