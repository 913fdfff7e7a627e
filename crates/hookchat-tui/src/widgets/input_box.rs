//! Message input widget

use crate::input::Action;
use crate::theme::Theme;
use hookchat_core::InputControls;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Single-line message input.
///
/// Editing keeps working while a send is in flight; only submitting is
/// blocked, and the surface's placeholder is shown while the box is empty.
#[derive(Debug, Default)]
pub struct InputBox {
    /// Current input text
    content: String,
    /// Cursor position (character index, not byte index)
    cursor: usize,
    /// Horizontal scroll offset (in display width)
    scroll: usize,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Take the typed message, leaving the box empty
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        self.scroll = 0;
        std::mem::take(&mut self.content)
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn width_before(&self, char_index: usize) -> usize {
        self.content
            .chars()
            .take(char_index)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    /// Remove the characters in `start..end` (character indices)
    fn remove_range(&mut self, start: usize, end: usize) {
        let (from, to) = (self.byte_offset(start), self.byte_offset(end));
        self.content.drain(from..to);
    }

    fn insert(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    /// Apply an editing action. Returns whether anything changed.
    pub fn handle_action(&mut self, action: &Action, width: u16) -> bool {
        let changed = match action {
            Action::Char(c) => {
                self.insert(*c);
                true
            }
            Action::Backspace if self.cursor > 0 => {
                self.remove_range(self.cursor - 1, self.cursor);
                self.cursor -= 1;
                true
            }
            Action::Delete if self.cursor < self.char_count() => {
                self.remove_range(self.cursor, self.cursor + 1);
                true
            }
            Action::Left if self.cursor > 0 => {
                self.cursor -= 1;
                true
            }
            Action::Right if self.cursor < self.char_count() => {
                self.cursor += 1;
                true
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = self.char_count();
                true
            }
            Action::ClearLine => {
                self.take();
                true
            }
            Action::DeleteWord => {
                let chars: Vec<char> = self.content.chars().collect();
                let mut start = self.cursor;
                while start > 0 && chars[start - 1] == ' ' {
                    start -= 1;
                }
                while start > 0 && chars[start - 1] != ' ' {
                    start -= 1;
                }
                self.remove_range(start, self.cursor);
                self.cursor = start;
                true
            }
            Action::Paste(text) => {
                // single line: line breaks become one space
                for c in text.chars() {
                    if c == '\n' || c == '\r' {
                        if self.cursor > 0 && !self.content.ends_with(' ') {
                            self.insert(' ');
                        }
                    } else {
                        self.insert(c);
                    }
                }
                true
            }
            _ => false,
        };
        if changed {
            self.update_scroll(width as usize);
        }
        changed
    }

    fn update_scroll(&mut self, width: usize) {
        let visible_width = width.saturating_sub(4).max(1);
        let cursor_pos = self.width_before(self.cursor);

        if cursor_pos < self.scroll {
            self.scroll = cursor_pos;
        } else if cursor_pos >= self.scroll + visible_width {
            self.scroll = cursor_pos + 1 - visible_width;
        }
    }

    fn visible_text(&self, width: usize) -> String {
        let mut skipped = 0;
        let mut used = 0;
        let mut out = String::new();
        for c in self.content.chars() {
            let w = c.width().unwrap_or(0);
            if skipped < self.scroll {
                skipped += w;
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

    /// Render the input box with the surface's input state
    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme, controls: &InputControls) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(if controls.enabled {
                theme.primary_style()
            } else {
                theme.border_style()
            });

        let inner = block.inner(area);
        block.render(area, buf);

        let (text, style) = if self.content.is_empty() {
            let style = if controls.enabled {
                theme.dim_style()
            } else {
                theme.dim_style().add_modifier(Modifier::ITALIC)
            };
            (controls.placeholder.clone(), style)
        } else {
            (self.visible_text(inner.width as usize), theme.base_style())
        };
        Paragraph::new(text).style(style).render(inner, buf);

        if inner.width > 0 {
            let cursor_x = self.width_before(self.cursor).saturating_sub(self.scroll);
            if cursor_x < inner.width as usize {
                let position = (inner.x + cursor_x as u16, inner.y);
                if let Some(cell) = buf.cell_mut(position) {
                    cell.set_style(Style::default().bg(theme.primary));
                }
            }
        }
    }
}
