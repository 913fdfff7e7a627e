//! Markdown rendering of bot messages for the terminal

use crate::theme::Theme;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthStr;

/// Convert markdown text to styled lines no wider than `width`
pub fn render_markdown(text: &str, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let mut renderer = Renderer::new(theme, width.max(1));
    for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH) {
        renderer.event(event);
    }
    renderer.finish()
}

struct Renderer<'t> {
    theme: &'t Theme,
    width: usize,
    lines: Vec<Line<'static>>,
    /// Spans of the line being built
    current: Vec<Span<'static>>,
    current_width: usize,
    styles: Vec<Style>,
    /// Prefix repeated on every line of the current block
    prefix: Vec<Span<'static>>,
    code_block: Option<String>,
    /// Next number of each open list; `None` for bullet lists
    lists: Vec<Option<u64>>,
}

impl<'t> Renderer<'t> {
    fn new(theme: &'t Theme, width: usize) -> Self {
        Self {
            theme,
            width,
            lines: Vec::new(),
            current: Vec::new(),
            current_width: 0,
            styles: vec![theme.base_style()],
            prefix: Vec::new(),
            code_block: None,
            lists: Vec::new(),
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let style = f(self.style());
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn prefix_width(&self) -> usize {
        self.prefix.iter().map(|s| s.content.width()).sum()
    }

    /// End the current line, if it has content
    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = self.prefix.clone();
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
        self.current_width = 0;
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::from(""));
        }
    }

    /// Add text, wrapping at word boundaries
    fn text(&mut self, text: &str, style: Style) {
        let available = self.width.saturating_sub(self.prefix_width()).max(1);
        for (i, word) in text.split(' ').enumerate() {
            let sep = usize::from(i > 0 && self.current_width > 0);
            let w = word.width();
            if self.current_width > 0 && self.current_width + sep + w > available {
                self.flush();
            } else if sep == 1 {
                self.current.push(Span::styled(" ", style));
                self.current_width += 1;
            }
            if word.is_empty() {
                continue;
            }
            if w > available {
                for piece in textwrap::wrap(word, available) {
                    if self.current_width > 0 {
                        self.flush();
                    }
                    self.current_width = piece.width();
                    self.current.push(Span::styled(piece.into_owned(), style));
                }
            } else {
                self.current.push(Span::styled(word.to_string(), style));
                self.current_width += w;
            }
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some(code) = self.code_block.as_mut() {
                    code.push_str(&text);
                } else {
                    let style = self.style();
                    self.text(&text, style);
                }
            }
            Event::Code(code) => {
                let style = self.theme.code_style().add_modifier(Modifier::BOLD);
                self.text(&code, style);
            }
            Event::SoftBreak => {
                let style = self.style();
                self.text(" ", style);
            }
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.blank();
                let rule = "─".repeat(self.width.min(40));
                self.lines.push(Line::from(Span::styled(rule, self.theme.dim_style())));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.blank();
                let style = match level {
                    HeadingLevel::H1 => self
                        .theme
                        .primary_bold()
                        .add_modifier(Modifier::UNDERLINED),
                    HeadingLevel::H2 => self.theme.primary_bold(),
                    _ => self.theme.primary_style(),
                };
                self.styles.push(style);
            }
            // loose list items keep their marker on the first line
            Tag::Paragraph if !self.lists.is_empty() => {}
            Tag::Paragraph => self.flush(),
            Tag::BlockQuote(_) => {
                self.flush();
                self.prefix.push(Span::styled("│ ", self.theme.dim_style()));
                self.push_style(|s| s.add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.code_block = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                let indent = "  ".repeat(depth);
                self.current
                    .push(Span::styled(format!("{}{}", indent, marker), self.theme.dim_style()));
                self.current_width += indent.len() + marker.width();
            }
            Tag::Emphasis => self.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => {
                let link = self.theme.link;
                self.push_style(|s| s.fg(link).add_modifier(Modifier::UNDERLINED));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.flush();
                self.pop_style();
            }
            TagEnd::Paragraph => self.blank(),
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.prefix.pop();
                self.pop_style();
                self.blank();
            }
            TagEnd::CodeBlock => {
                let code = self.code_block.take().unwrap_or_default();
                let style = self.theme.code_style().add_modifier(Modifier::DIM);
                let room = self.width.saturating_sub(2).max(1);
                for code_line in code.lines() {
                    // code is clipped, never wrapped
                    let clipped: String = if code_line.width() > room {
                        let mut out = String::new();
                        for c in code_line.chars() {
                            if out.width() + 1 >= room {
                                break;
                            }
                            out.push(c);
                        }
                        out.push('…');
                        out
                    } else {
                        code_line.to_string()
                    };
                    self.lines
                        .push(Line::from(Span::styled(format!("  {}", clipped), style)));
                }
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style()
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        // unterminated fences still show while streaming
        if let Some(code) = self.code_block.take() {
            let style = self.theme.code_style().add_modifier(Modifier::DIM);
            for code_line in code.lines() {
                self.lines
                    .push(Line::from(Span::styled(format!("  {}", code_line), style)));
            }
        }
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}
