//! hookchat-wire: webhook chat wire protocol
//!
//! This crate knows how to talk to a chat webhook: the outgoing request body,
//! the transport that posts it, and the tolerant decoding of whatever comes
//! back (SSE, NDJSON, a single JSON object or plain text).

pub mod decoder;
pub mod error;
pub mod frame;
pub mod previous;
pub mod request;
pub mod transport;

pub use decoder::{FrameDecoder, FrameStream, decode_body, frame_stream};
pub use error::{Error, Result};
pub use frame::{ControlKind, Frame, classify, classify_value, summary_text};
pub use previous::{PreviousMessage, PreviousRole, PreviousSession, parse_previous_session};
pub use request::{ChatAction, ChatRequest, RequestMetadata, STREAM_ACCEPT};
pub use transport::{ByteStream, HttpTransport, ResponseBody, WebhookTransport};
