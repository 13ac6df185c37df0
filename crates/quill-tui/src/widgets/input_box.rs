//! Multi-line text input widget

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::Line,
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Multi-line text input; Enter is left to the caller, `Action::Newline`
/// inserts a line break.
#[derive(Debug, Default)]
pub struct InputBox {
    content: String,
    /// Cursor position (character index, not byte index)
    cursor: usize,
    placeholder: String,
    title: String,
    focused: bool,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Text shown in the top border (e.g. the pending attachment)
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    /// Take the content out, leaving the box empty
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.content)
    }

    /// Rows needed to show the content (plus borders), capped at `max_rows`
    pub fn height(&self, max_rows: u16) -> u16 {
        let rows = self.content.split('\n').count() as u16;
        rows.clamp(1, max_rows.max(1)) + 2
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    /// (row, column in chars) of the cursor
    fn cursor_row_col(&self) -> (usize, usize) {
        let mut row = 0;
        let mut col = 0;
        for c in self.content.chars().take(self.cursor) {
            if c == '\n' {
                row += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (row, col)
    }

    /// Display width of the cursor's line up to the cursor
    fn cursor_display_col(&self) -> usize {
        let (row, col) = self.cursor_row_col();
        self.content
            .split('\n')
            .nth(row)
            .map(|line| line.chars().take(col).filter_map(|c| c.width()).sum())
            .unwrap_or(0)
    }

    /// Character index of (row, col), clamping col to the line length
    fn index_of(&self, row: usize, col: usize) -> usize {
        let mut index = 0;
        for (i, line) in self.content.split('\n').enumerate() {
            let len = line.chars().count();
            if i == row {
                return index + col.min(len);
            }
            index += len + 1;
        }
        self.content.chars().count()
    }

    fn line_count(&self) -> usize {
        self.content.split('\n').count()
    }

    fn insert_char(&mut self, c: char) {
        let offset = self.byte_offset(self.cursor);
        self.content.insert(offset, c);
        self.cursor += 1;
    }

    fn remove_range(&mut self, start: usize, end: usize) {
        let start_byte = self.byte_offset(start);
        let end_byte = self.byte_offset(end);
        self.content.drain(start_byte..end_byte);
    }

    /// Handle an editing action. Returns `true` if it was consumed.
    pub fn handle_action(&mut self, action: &Action) -> bool {
        let char_count = self.content.chars().count();

        match action {
            Action::Char(c) => {
                self.insert_char(*c);
                true
            }
            Action::Newline => {
                self.insert_char('\n');
                true
            }
            Action::Backspace => {
                if self.cursor == 0 {
                    return false;
                }
                self.remove_range(self.cursor - 1, self.cursor);
                self.cursor -= 1;
                true
            }
            Action::Delete => {
                if self.cursor >= char_count {
                    return false;
                }
                self.remove_range(self.cursor, self.cursor + 1);
                true
            }
            Action::Left => {
                if self.cursor == 0 {
                    return false;
                }
                self.cursor -= 1;
                true
            }
            Action::Right => {
                if self.cursor >= char_count {
                    return false;
                }
                self.cursor += 1;
                true
            }
            Action::Up => {
                let (row, col) = self.cursor_row_col();
                if row == 0 {
                    return false;
                }
                self.cursor = self.index_of(row - 1, col);
                true
            }
            Action::Down => {
                let (row, col) = self.cursor_row_col();
                if row + 1 >= self.line_count() {
                    return false;
                }
                self.cursor = self.index_of(row + 1, col);
                true
            }
            Action::Home => {
                let (row, _) = self.cursor_row_col();
                self.cursor = self.index_of(row, 0);
                true
            }
            Action::End => {
                let (row, _) = self.cursor_row_col();
                self.cursor = self.index_of(row, usize::MAX);
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord => {
                let chars: Vec<char> = self.content.chars().collect();
                let mut start = self.cursor;
                while start > 0 && chars[start - 1].is_whitespace() {
                    start -= 1;
                }
                while start > 0 && !chars[start - 1].is_whitespace() {
                    start -= 1;
                }
                self.remove_range(start, self.cursor);
                self.cursor = start;
                true
            }
            Action::Paste(text) => {
                for c in text.chars().filter(|c| *c != '\r') {
                    self.insert_char(c);
                }
                true
            }
            _ => false,
        }
    }

    /// Render the input box
    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(if self.focused {
                theme.accent_style()
            } else {
                theme.border_style()
            });
        if !self.title.is_empty() {
            block = block.title(format!(" {} ", self.title));
        }

        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        if self.content.is_empty() {
            Paragraph::new(self.placeholder.as_str())
                .style(theme.dim_style())
                .render(inner, buf);
        } else {
            let height = inner.height as usize;
            let width = inner.width as usize;
            let (row, _) = self.cursor_row_col();
            let col = self.cursor_display_col();
            let top = (row + 1).saturating_sub(height);
            let left = (col + 1).saturating_sub(width);

            let lines: Vec<Line> = self
                .content
                .split('\n')
                .skip(top)
                .take(height)
                .map(|line| Line::from(visible_slice(line, left, width)))
                .collect();
            Paragraph::new(lines)
                .style(theme.base_style())
                .render(inner, buf);
        }

        if self.focused {
            let (row, _) = self.cursor_row_col();
            let height = inner.height as usize;
            let width = inner.width as usize;
            let col = self.cursor_display_col();
            let y = row.min(height - 1);
            let x = col.min(width - 1);
            if let Some(cell) = buf.cell_mut((inner.x + x as u16, inner.y + y as u16)) {
                cell.set_style(Style::default().bg(theme.accent));
            }
        }
    }
}

/// The part of `line` starting `skip` columns in, at most `width` columns wide
fn visible_slice(line: &str, skip: usize, width: usize) -> String {
    let mut out = String::new();
    let mut col = 0;
    let mut used = 0;
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if col < skip {
            col += w;
            continue;
        }
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out
}
