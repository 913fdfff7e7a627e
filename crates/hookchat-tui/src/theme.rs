//! Color theme support

use hookchat_core::StyleConfig;
use ratatui::style::{Color, Modifier, Style};

/// Color theme for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    /// Background color
    pub bg: Color,
    /// Primary text color
    pub fg: Color,
    /// Dimmed/secondary text
    pub dim: Color,
    /// Widget primary color (user header, focus, cursor)
    pub primary: Color,
    /// Widget secondary color (bot header)
    pub secondary: Color,
    /// Error color
    pub error: Color,
    /// Loading phrase color
    pub phrase: Color,
    /// Border color
    pub border: Color,
    /// Code/preformatted text color
    pub code: Color,
    /// Link color
    pub link: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_style(&StyleConfig::default())
    }
}

impl Theme {
    /// Dark theme using the widget colours. Colours that are not valid
    /// `#rrggbb` fall back to terminal defaults.
    pub fn from_style(style: &StyleConfig) -> Self {
        Self {
            bg: Color::Reset,
            fg: Color::White,
            dim: Color::DarkGray,
            primary: parse_hex(&style.primary_color).unwrap_or(Color::Magenta),
            secondary: parse_hex(&style.secondary_color).unwrap_or(Color::Cyan),
            error: Color::Red,
            phrase: Color::Yellow,
            border: Color::DarkGray,
            code: Color::Magenta,
            link: Color::Blue,
        }
    }

    /// Get base style
    pub fn base_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Get dimmed style
    pub fn dim_style(&self) -> Style {
        Style::default().fg(self.dim)
    }

    pub fn primary_style(&self) -> Style {
        Style::default().fg(self.primary)
    }

    pub fn primary_bold(&self) -> Style {
        self.primary_style().add_modifier(Modifier::BOLD)
    }

    pub fn secondary_bold(&self) -> Style {
        Style::default()
            .fg(self.secondary)
            .add_modifier(Modifier::BOLD)
    }

    /// Get error style
    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    /// Style of a loading phrase; faded ones are dimmed
    pub fn phrase_style(&self, visible: bool) -> Style {
        if visible {
            Style::default().fg(self.phrase).add_modifier(Modifier::ITALIC)
        } else {
            Style::default().fg(self.dim).add_modifier(Modifier::DIM)
        }
    }

    /// Get code/preformatted style
    pub fn code_style(&self) -> Style {
        Style::default().fg(self.code)
    }

    /// Get border style
    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }
}

/// Parse `#rrggbb` (or `rrggbb`)
pub fn parse_hex(value: &str) -> Option<Color> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#854fff"), Some(Color::Rgb(0x85, 0x4f, 0xff)));
        assert_eq!(parse_hex("6b3fd4"), Some(Color::Rgb(0x6b, 0x3f, 0xd4)));
        assert_eq!(parse_hex("#fff"), None);
        assert_eq!(parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_invalid_style_falls_back() {
        let theme = Theme::from_style(&StyleConfig {
            primary_color: "purple".into(),
            secondary_color: "#000000".into(),
        });
        assert_eq!(theme.primary, Color::Magenta);
        assert_eq!(theme.secondary, Color::Rgb(0, 0, 0));
    }
}
