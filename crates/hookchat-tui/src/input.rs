//! Input handling

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

/// Rows moved by one mouse wheel notch
pub const WHEEL_STEP: isize = 3;

/// Processed input action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Regular character input
    Char(char),
    /// Enter/submit
    Submit,
    /// Backspace
    Backspace,
    /// Delete
    Delete,
    /// Move cursor left
    Left,
    /// Move cursor right
    Right,
    /// Move to start of line
    Home,
    /// Move to end of line
    End,
    /// Scroll the transcript by a page
    PageUp,
    PageDown,
    /// Scroll the transcript by some rows (negative is up)
    Scroll(isize),
    /// Esc: abort the in-flight answer
    Escape,
    /// Ctrl+C: abort, or quit when idle
    Interrupt,
    /// Ctrl+L: clear history and start a new session
    ClearHistory,
    /// Ctrl+U (clear line)
    ClearLine,
    /// Ctrl+W (delete word)
    DeleteWord,
    /// Paste (bracketed paste)
    Paste(String),
    /// Quit application
    Quit,
    /// Unknown/unhandled
    Unknown,
}

/// Convert a crossterm key event to an action
pub fn key_to_action(event: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Action::Interrupt,
            KeyCode::Char('d') | KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('l') => Action::ClearHistory,
            KeyCode::Char('u') => Action::ClearLine,
            KeyCode::Char('w') => Action::DeleteWord,
            _ => Action::Unknown,
        };
    }

    if modifiers.contains(KeyModifiers::ALT) {
        return Action::Unknown;
    }

    match code {
        KeyCode::Char(c) => Action::Char(c),
        KeyCode::Enter => Action::Submit,
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Up => Action::Scroll(-1),
        KeyCode::Down => Action::Scroll(1),
        KeyCode::Esc => Action::Escape,
        _ => Action::Unknown,
    }
}

/// Mouse wheel turns into transcript scrolling; everything else is ignored
pub fn mouse_to_action(event: MouseEvent) -> Option<Action> {
    match event.kind {
        MouseEventKind::ScrollUp => Some(Action::Scroll(-WHEEL_STEP)),
        MouseEventKind::ScrollDown => Some(Action::Scroll(WHEEL_STEP)),
        _ => None,
    }
}

/// Convert a crossterm event to an action
pub fn event_to_action(event: Event) -> Option<Action> {
    match event {
        Event::Key(key_event) => Some(key_to_action(key_event)),
        Event::Mouse(mouse_event) => mouse_to_action(mouse_event),
        Event::Paste(text) => Some(Action::Paste(text)),
        _ => None,
    }
}
