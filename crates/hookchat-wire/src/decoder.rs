//! Incremental line framing for webhook responses

use async_stream::stream;
use futures::StreamExt;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::{
    error::Result,
    frame::{Frame, classify, classify_value},
    transport::ResponseBody,
};

/// A stream of classified frames
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// Splits arriving byte buffers into lines and classifies them.
///
/// Lines are split on the `\n` byte before any UTF-8 decoding, so a
/// multi-byte character cut in half by a network read stays intact in the
/// pending buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read, returning the frames of every line it completed
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(bytes);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        classify_batch(&complete)
    }

    /// Flush whatever is still buffered as a final line
    pub fn finish(&mut self) -> Vec<Frame> {
        let rest = std::mem::take(&mut self.pending);
        classify_batch(&rest)
    }

    /// Number of buffered bytes not yet terminated by a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Classify every non-blank line of a batch. A done sentinel ends the batch.
fn classify_batch(bytes: &[u8]) -> Vec<Frame> {
    let text = String::from_utf8_lossy(bytes);
    let mut frames = Vec::new();

    for line in text.split('\n') {
        if line.trim().is_empty() {
            continue;
        }
        let frame = classify(line);
        let done = frame.is_done();
        frames.push(frame);
        if done {
            tracing::debug!("received done sentinel, dropping rest of batch");
            break;
        }
    }

    frames
}

/// Decode a complete response body (transport without a readable stream, or
/// non-streaming mode).
///
/// Multi-line bodies are treated as NDJSON/SSE; a single body is parsed as
/// one JSON value; anything that is not JSON becomes one plain-text content
/// frame.
pub fn decode_body(body: &str) -> Vec<Frame> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let lines: Vec<&str> = trimmed.lines().filter(|l| !l.trim().is_empty()).collect();

    if lines.len() > 1 {
        let frames = classify_batch(trimmed.as_bytes());
        if frames.iter().any(Frame::is_recognized) {
            tracing::debug!(lines = lines.len(), "decoded body as line-delimited frames");
            return frames;
        }
    } else {
        let frame = classify(trimmed);
        if frame.is_recognized() {
            return vec![frame];
        }
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => vec![classify_value(value)],
        Err(_) => {
            tracing::debug!("body is not JSON, treating it as plain text");
            vec![Frame::content(trimmed)]
        }
    }
}

/// Turn a response body into a stream of frames
pub fn frame_stream(body: ResponseBody) -> FrameStream {
    match body {
        ResponseBody::Text(text) => {
            Box::pin(futures::stream::iter(decode_body(&text).into_iter().map(Ok)))
        }
        ResponseBody::Stream(mut bytes) => Box::pin(stream! {
            let mut decoder = FrameDecoder::new();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for frame in decoder.push(&chunk) {
                            yield Ok(frame);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            tracing::debug!(pending = decoder.pending_len(), "response stream ended");
            for frame in decoder.finish() {
                yield Ok(frame);
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::frame::ControlKind;
    use serde_json::json;

    fn content_texts(frames: &[Frame]) -> Vec<String> {
        frames
            .iter()
            .filter_map(|f| match f {
                Frame::Content { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_line_split_across_reads_yields_one_frame() {
        let line = "{\"type\":\"item\",\"content\":\"héllo wörld\"}\n".as_bytes();

        for split in 0..=line.len() {
            let mut decoder = FrameDecoder::new();
            let mut frames = decoder.push(&line[..split]);
            frames.extend(decoder.push(&line[split..]));
            frames.extend(decoder.finish());
            assert_eq!(
                frames,
                vec![Frame::content("héllo wörld")],
                "split at byte {}",
                split
            );
        }
    }

    #[test]
    fn test_partial_line_stays_buffered() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"{\"type\":\"item\",").is_empty());
        assert_eq!(decoder.pending_len(), 15);
        let frames = decoder.push(b"\"content\":\"x\"}\n{\"type\":");
        assert_eq!(frames, vec![Frame::content("x")]);
        assert_eq!(decoder.pending_len(), 8);
    }

    #[test]
    fn test_finish_flushes_line_without_newline() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(br#"{"output":"Hi"}"#).is_empty());
        let frames = decoder.finish();
        assert!(matches!(frames.as_slice(), [Frame::FinalSummary { .. }]));
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"\n\r\n   \n{\"type\":\"begin\"}\n\n");
        assert_eq!(frames, vec![Frame::control(ControlKind::Begin)]);
    }

    #[test]
    fn test_sse_stream_accumulates_in_order() {
        let mut decoder = FrameDecoder::new();
        let mut frames = decoder.push(b"data: {\"content\":\"A\"}\ndata: {\"con");
        frames.extend(decoder.push(b"tent\":\"B\"}\ndata: [DONE]\n"));
        frames.extend(decoder.finish());

        assert_eq!(content_texts(&frames).concat(), "AB");
        assert!(frames.last().is_some_and(Frame::is_done));
    }

    #[test]
    fn test_done_stops_the_rest_of_the_batch() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: {\"content\":\"A\"}\ndata: [DONE]\ndata: {\"content\":\"late\"}\n");
        assert_eq!(content_texts(&frames), vec!["A".to_string()]);
        assert!(frames.last().is_some_and(Frame::is_done));
    }

    #[test]
    fn test_malformed_lines_are_not_fatal() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"garbage\n{\"type\":\"item\",\"content\":\"ok\"}\n{broken\n");
        assert_eq!(frames.len(), 3);
        assert_eq!(content_texts(&frames), vec!["ok".to_string()]);
    }

    #[test]
    fn test_decode_body_ndjson() {
        let body = "{\"type\":\"begin\"}\n{\"type\":\"item\",\"content\":\"Hi\"}\n{\"type\":\"item\",\"content\":\" there\"}\n{\"type\":\"end\"}\n";
        let frames = decode_body(body);
        assert_eq!(content_texts(&frames).concat(), "Hi there");
    }

    #[test]
    fn test_decode_body_single_json() {
        assert_eq!(
            decode_body("{\"output\":\"Done\"}"),
            vec![Frame::FinalSummary {
                payload: json!({"output": "Done"})
            }]
        );
    }

    #[test]
    fn test_decode_body_pretty_printed_json() {
        let body = "{\n  \"output\": \"Done\"\n}\n";
        assert!(matches!(
            decode_body(body).as_slice(),
            [Frame::FinalSummary { .. }]
        ));
    }

    #[test]
    fn test_decode_body_plain_text() {
        assert_eq!(decode_body("Just text"), vec![Frame::content("Just text")]);
        assert_eq!(
            decode_body("line one\nline two\n"),
            vec![Frame::content("line one\nline two")]
        );
    }

    #[test]
    fn test_decode_body_empty() {
        assert!(decode_body("  \n ").is_empty());
    }

    #[test]
    fn test_decode_body_unknown_json_renders_nothing() {
        let frames = decode_body("{\"status\":\"ok\"}");
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].is_recognized());
    }

    #[tokio::test]
    async fn test_frame_stream_over_byte_chunks() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"{\"type\":\"item\",\"con".to_vec()),
            Ok(b"tent\":\"Hi\"}\n{\"output\":".to_vec()),
            Ok(b"\"Hi\"}".to_vec()),
        ];
        let body = ResponseBody::Stream(Box::pin(futures::stream::iter(chunks)));

        let frames: Vec<Frame> = frame_stream(body)
            .map(|r| r.expect("frame"))
            .collect()
            .await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], Frame::content("Hi"));
        assert!(matches!(frames[1], Frame::FinalSummary { .. }));
    }

    #[tokio::test]
    async fn test_frame_stream_propagates_transport_error() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"{\"type\":\"item\",\"content\":\"A\"}\n".to_vec()),
            Err(Error::Aborted),
            Ok(b"{\"type\":\"item\",\"content\":\"B\"}\n".to_vec()),
        ];
        let body = ResponseBody::Stream(Box::pin(futures::stream::iter(chunks)));

        let results: Vec<Result<Frame>> = frame_stream(body).collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Aborted)));
    }

    #[tokio::test]
    async fn test_frame_stream_over_text_body() {
        let body = ResponseBody::Text("[{\"output\":\"Done\"}]".into());
        let frames: Vec<Result<Frame>> = frame_stream(body).collect().await;
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Ok(Frame::FinalSummary { .. })));
    }
}
