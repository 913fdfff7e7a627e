//! hookchat-core: the chat widget runtime
//!
//! Turns webhook responses into an incrementally rendered transcript on a
//! headless [`Surface`]: content fragments are sequenced, rendered with a
//! streaming cursor and followed by autoscroll, while rotating loading
//! phrases cover long waits. History and session ids are persisted locally.

pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod handle;
pub mod history;
pub mod loading;
pub mod renderer;
pub mod sequencer;
pub mod session_id;
pub mod surface;
pub mod widget;

pub use config::{
    Branding, InitialMessage, Labels, LoadingMessage, StyleConfig, WebhookConfig, WidgetConfig,
};
pub use error::{Error, Result};
pub use events::WidgetEvent;
pub use format::{FormatError, Formatter, MarkupFormatter, PlainFormatter, render_with};
pub use handle::WidgetHandle;
pub use history::{FileHistory, HistoryEntry, HistoryStore, MemoryHistory, Role};
pub use loading::{LoadingPhase, LoadingScheduler};
pub use renderer::StreamingRenderer;
pub use sequencer::{ChunkSequencer, FragmentSink};
pub use session_id::{FileSessionId, FixedSessionId, SessionIdProvider};
pub use surface::{
    Entry, EntryId, EntryKind, InputControls, PhraseView, ScrollOrigin, ScrollState,
    SharedSurface, Surface,
};
pub use widget::ChatWidget;
