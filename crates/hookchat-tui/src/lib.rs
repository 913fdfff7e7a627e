//! hookchat-tui: terminal front end for the chat widget
//!
//! Draws a [`hookchat_core::Surface`] with ratatui and maps crossterm input
//! to widget actions.

pub mod input;
pub mod terminal;
pub mod theme;
pub mod widgets;

pub use terminal::TerminalSession;
pub use theme::Theme;
