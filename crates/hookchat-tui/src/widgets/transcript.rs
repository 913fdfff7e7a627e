//! Transcript view of the chat surface

use crate::theme::Theme;
use crate::widgets::markdown::render_markdown;
use hookchat_core::{Entry, EntryKind};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};

const CURSOR: &str = "▌";
const INDENT: &str = "  ";

/// Transcript laid out at a fixed width.
///
/// Layout happens before rendering so the caller can report the content
/// height to the surface and read back the scroll offset to show.
pub struct Transcript<'a> {
    lines: Vec<Line<'static>>,
    offset: usize,
    theme: &'a Theme,
}

impl<'a> Transcript<'a> {
    /// Lay out `entries` for a pane `width` columns wide. `tick` drives the
    /// typing animation.
    pub fn layout(
        entries: &[Entry],
        theme: &'a Theme,
        bot_name: &str,
        width: u16,
        tick: u64,
    ) -> Self {
        // one column for the scrollbar
        let width = (width as usize).saturating_sub(1);
        let mut lines = Vec::new();
        for entry in entries {
            render_entry(&mut lines, entry, theme, bot_name, width, tick);
            lines.push(Line::from(""));
        }
        Self {
            lines,
            offset: 0,
            theme,
        }
    }

    /// Rows needed to show everything
    pub fn height(&self) -> usize {
        self.lines.len()
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[cfg(test)]
    fn text(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }
}

fn header(kind: EntryKind, theme: &Theme, bot_name: &str) -> Option<Line<'static>> {
    let (label, style) = match kind {
        EntryKind::User => ("You".to_string(), theme.primary_bold()),
        EntryKind::Bot | EntryKind::Typing => {
            let name = if bot_name.trim().is_empty() {
                "Assistant"
            } else {
                bot_name
            };
            (name.to_string(), theme.secondary_bold())
        }
        EntryKind::Error => return None,
    };
    Some(Line::from(Span::styled(label, style)))
}

fn render_entry(
    lines: &mut Vec<Line<'static>>,
    entry: &Entry,
    theme: &Theme,
    bot_name: &str,
    width: usize,
    tick: u64,
) {
    lines.extend(header(entry.kind, theme, bot_name));
    let content_width = width.saturating_sub(INDENT.len()).max(1);

    let mut body = match entry.kind {
        EntryKind::Bot => render_markdown(&entry.text, theme, content_width),
        EntryKind::Typing => {
            let dots = ".".repeat((tick % 3 + 1) as usize);
            let mut spans = vec![Span::styled(format!("{:<3}", dots), theme.secondary_bold())];
            if let Some(phrase) = &entry.phrase {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(phrase.text.clone(), theme.phrase_style(phrase.visible)));
            }
            vec![Line::from(spans)]
        }
        EntryKind::User | EntryKind::Error => {
            let style = if entry.kind == EntryKind::Error {
                theme.error_style()
            } else {
                theme.base_style()
            };
            textwrap::wrap(&entry.text, content_width)
                .into_iter()
                .map(|l| Line::from(Span::styled(l.into_owned(), style)))
                .collect()
        }
    };

    if entry.cursor {
        let cursor = Span::styled(CURSOR, theme.secondary_bold());
        match body.last_mut() {
            Some(line) => line.spans.push(cursor),
            None => body.push(Line::from(cursor)),
        }
    }

    for line in body {
        let mut spans = vec![Span::raw(INDENT)];
        spans.extend(line.spans);
        lines.push(Line::from(spans));
    }
}

impl Widget for Transcript<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let viewport = area.height as usize;
        let total = self.lines.len();
        let visible: Vec<Line> = self
            .lines
            .into_iter()
            .skip(self.offset)
            .take(viewport)
            .collect();
        Paragraph::new(visible)
            .style(self.theme.base_style())
            .render(area, buf);

        if total > viewport {
            let mut state = ScrollbarState::new(total.saturating_sub(viewport))
                .position(self.offset)
                .viewport_content_length(viewport);
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(None)
                .end_symbol(None)
                .thumb_style(self.theme.border_style())
                .render(area, buf, &mut state);
        }
    }
}
