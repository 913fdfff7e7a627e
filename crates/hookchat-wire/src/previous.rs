//! Parsing of `loadPreviousSession` responses

use serde_json::Value;

/// Who said a replayed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousRole {
    User,
    Agent,
}

/// One message of a replayed conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousMessage {
    pub role: PreviousRole,
    pub content: String,
}

/// What the webhook sent back for a previous session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousSession {
    /// LangChain message list, oldest first
    Transcript(Vec<PreviousMessage>),
    /// A single greeting-style message
    Single(String),
    /// Nothing worth showing
    Empty,
}

/// Interpret a `loadPreviousSession` response body.
///
/// `{"data": [{"id": [.., .., "HumanMessage"], "kwargs": {"content": ..}}]}`
/// is a transcript; otherwise `{output}`, `[{output}]` or `{content}` carry
/// a single message. Webhook errors (`{"type": "error", "content": ..}`) are
/// never shown.
pub fn parse_previous_session(value: &Value) -> PreviousSession {
    if let Some(data) = value.get("data").and_then(Value::as_array) {
        let messages = data.iter().filter_map(langchain_message).collect();
        return PreviousSession::Transcript(messages);
    }

    let text = match value {
        Value::Array(items) => items.first().and_then(|i| i.get("output")),
        _ => value.get("output").or_else(|| {
            if value.get("type").and_then(Value::as_str) == Some("error") {
                tracing::warn!(content = ?value.get("content"), "webhook returned an error for previous session");
                None
            } else {
                value.get("content")
            }
        }),
    };

    match text.and_then(Value::as_str).map(str::trim) {
        Some(text) if !text.is_empty() => PreviousSession::Single(text.to_string()),
        _ => PreviousSession::Empty,
    }
}

fn langchain_message(msg: &Value) -> Option<PreviousMessage> {
    let content = msg
        .get("kwargs")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())?;
    let kind = msg.get("id")?.as_array()?.get(2).and_then(Value::as_str);
    let role = if kind == Some("HumanMessage") {
        PreviousRole::User
    } else {
        PreviousRole::Agent
    };
    Some(PreviousMessage {
        role,
        content: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_langchain_transcript() {
        let value = json!({
            "data": [
                {"id": ["langchain", "schema", "HumanMessage"], "kwargs": {"content": "Hi"}},
                {"id": ["langchain", "schema", "AIMessage"], "kwargs": {"content": "Hello!"}},
                {"id": ["langchain", "schema", "AIMessage"], "kwargs": {}},
                {"kwargs": {"content": "no id"}}
            ]
        });
        assert_eq!(
            parse_previous_session(&value),
            PreviousSession::Transcript(vec![
                PreviousMessage {
                    role: PreviousRole::User,
                    content: "Hi".into()
                },
                PreviousMessage {
                    role: PreviousRole::Agent,
                    content: "Hello!".into()
                },
            ])
        );
    }

    #[test]
    fn test_single_message_shapes() {
        assert_eq!(
            parse_previous_session(&json!({"output": "Welcome back"})),
            PreviousSession::Single("Welcome back".into())
        );
        assert_eq!(
            parse_previous_session(&json!([{"output": "Welcome back"}])),
            PreviousSession::Single("Welcome back".into())
        );
        assert_eq!(
            parse_previous_session(&json!({"content": "Hey"})),
            PreviousSession::Single("Hey".into())
        );
    }

    #[test]
    fn test_error_payload_is_not_shown() {
        assert_eq!(
            parse_previous_session(&json!({"type": "error", "content": "no session"})),
            PreviousSession::Empty
        );
    }

    #[test]
    fn test_blank_output_is_empty() {
        assert_eq!(
            parse_previous_session(&json!({"output": "   "})),
            PreviousSession::Empty
        );
        assert_eq!(parse_previous_session(&json!({})), PreviousSession::Empty);
    }
}
