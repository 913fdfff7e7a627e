//! Widget event types

use serde::{Deserialize, Serialize};

/// Events emitted while the widget talks to the webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    /// A user message was submitted
    SendStart { message: String },

    /// A content fragment was rendered
    Fragment { text: String },

    /// The answer is complete
    Completed { text: String },

    /// The session failed; `label` is what the user was shown
    Failed { label: String, timeout: bool },

    /// Stored or replayed history was put on the surface
    HistoryRestored { entries: usize },
}

impl WidgetEvent {
    /// Check if this event ends a send
    pub fn is_terminal(&self) -> bool {
        matches!(self, WidgetEvent::Completed { .. } | WidgetEvent::Failed { .. })
    }
}
