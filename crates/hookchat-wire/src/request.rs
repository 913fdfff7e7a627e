//! Outgoing webhook request body

use serde::{Deserialize, Serialize};

/// `Accept` header sent with streaming requests
pub const STREAM_ACCEPT: &str = "text/event-stream, application/x-ndjson, application/json";

/// What the webhook is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatAction {
    SendMessage,
    LoadPreviousSession,
}

/// Request metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub user_id: String,
    pub streaming: bool,
}

/// JSON body POSTed to the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub action: ChatAction,
    pub session_id: String,
    pub route: String,
    pub chat_input: String,
    pub metadata: RequestMetadata,
}

impl ChatRequest {
    /// A user message
    pub fn send_message(
        session_id: impl Into<String>,
        route: impl Into<String>,
        chat_input: impl Into<String>,
        streaming: bool,
    ) -> Self {
        Self {
            action: ChatAction::SendMessage,
            session_id: session_id.into(),
            route: route.into(),
            chat_input: chat_input.into(),
            metadata: RequestMetadata {
                user_id: String::new(),
                streaming,
            },
        }
    }

    /// Ask the webhook to replay an earlier conversation. Never streamed.
    pub fn load_previous_session(session_id: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            action: ChatAction::LoadPreviousSession,
            session_id: session_id.into(),
            route: route.into(),
            chat_input: String::new(),
            metadata: RequestMetadata::default(),
        }
    }

    /// Whether the response should be read as a stream
    pub fn is_streaming(&self) -> bool {
        self.metadata.streaming
    }
}
