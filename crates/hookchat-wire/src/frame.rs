//! Frame classification
//!
//! Every line the webhook sends, whatever its framing, ends up here. This is
//! the single place that sniffs JSON shapes; the decoder only splits lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of an SSE data line
pub const SSE_PREFIX: &str = "data:";

/// SSE payload that terminates a stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Stream control signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// `{"type":"begin"}`
    Begin,
    /// `{"type":"end"}`
    End,
    /// `data: [DONE]`
    Done,
}

/// One classified unit of webhook output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// Incremental piece of the answer
    Content { text: String },
    /// Complete, non-streamed answer object. Only meaningful when no content
    /// frames were seen.
    FinalSummary { payload: Value },
    /// Begin/end/done marker
    Control { signal: ControlKind },
    /// Anything else; callers drop these
    Unparseable { raw: String },
}

impl Frame {
    /// Build a content frame
    pub fn content(text: impl Into<String>) -> Self {
        Frame::Content { text: text.into() }
    }

    /// Build a control frame
    pub fn control(signal: ControlKind) -> Self {
        Frame::Control { signal }
    }

    fn unparseable(raw: impl Into<String>) -> Self {
        Frame::Unparseable { raw: raw.into() }
    }

    /// Check if this is the SSE done sentinel
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            Frame::Control {
                signal: ControlKind::Done
            }
        )
    }

    /// Whether the classifier recognised this frame at all
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Frame::Unparseable { .. })
    }
}

/// Which framing a JSON value arrived in. SSE payloads accept bare
/// `chunk`/`content` fields, NDJSON lines need `type == "item"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Sse,
    Ndjson,
}

/// Classify one decoded line (NDJSON line or SSE `data:` line)
pub fn classify(line: &str) -> Frame {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if let Some(payload) = sse_payload(line) {
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            return Frame::control(ControlKind::Done);
        }
        return match serde_json::from_str::<Value>(payload) {
            Ok(value) => classify_json(line, value, Shape::Sse),
            Err(_) => Frame::unparseable(line),
        };
    }

    let trimmed = line.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => classify_json(line, value, Shape::Ndjson),
        Err(_) => Frame::unparseable(line),
    }
}

/// Classify an already parsed JSON value, as found in a whole response body
pub fn classify_value(value: Value) -> Frame {
    let raw = value.to_string();
    classify_json(&raw, value, Shape::Ndjson)
}

fn sse_payload(line: &str) -> Option<&str> {
    line.strip_prefix(SSE_PREFIX)
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

fn classify_json(raw: &str, value: Value, shape: Shape) -> Frame {
    if is_final_summary(&value) {
        return Frame::FinalSummary { payload: value };
    }

    let Some(object) = value.as_object() else {
        return Frame::unparseable(raw);
    };

    let kind = object.get("type").and_then(Value::as_str);
    let content = match shape {
        Shape::Ndjson if kind == Some("item") => non_empty_str(object.get("content")),
        Shape::Ndjson => None,
        Shape::Sse => non_empty_str(object.get("chunk")).or_else(|| non_empty_str(object.get("content"))),
    };

    if let Some(text) = content {
        // Some backends push the final answer object through the chunk channel
        if let Some(payload) = embedded_summary(text) {
            return Frame::FinalSummary { payload };
        }
        return Frame::content(text);
    }

    match kind {
        Some("begin") => Frame::control(ControlKind::Begin),
        Some("end") => Frame::control(ControlKind::End),
        _ => Frame::unparseable(raw),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn is_final_summary(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("output") || map.contains_key("intermediateSteps"),
        Value::Array(items) => items.first().is_some_and(is_final_summary),
        _ => false,
    }
}

fn embedded_summary(text: &str) -> Option<Value> {
    if !text.trim_start().starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(is_final_summary)
}

/// Extract the displayable answer from a final-summary payload.
///
/// Accepts `{"output": ..}` and `[{"output": ..}]`. Strings are returned
/// verbatim, other JSON values serialized; `null` or a missing `output`
/// (e.g. an `intermediateSteps`-only object) yields `None`.
pub fn summary_text(payload: &Value) -> Option<String> {
    let output = match payload {
        Value::Array(items) => items.first()?.get("output")?,
        other => other.get("output")?,
    };
    match output {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
