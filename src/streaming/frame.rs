//! Event-stream frame classification and chunk payloads
//!
//! Each line of the response body is one of:
//! - `data: [DONE]`  end of stream
//! - `data: <json>`  a chunk `{choices: [{delta: {content?}}]}`
//! - anything else   keep-alives, `: comment` lines, blank separators

use crate::errors::{ChatError, Result};
use serde::Deserialize;

/// Literal prefix of a data line
pub const DATA_PREFIX: &str = "data: ";

/// Sentinel payload that ends the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// A classified line of the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFrame<'a> {
    /// Not a data line; has no effect on the response
    Ignored,

    /// End-of-stream sentinel
    Done,

    /// JSON payload, not yet parsed
    Data(&'a str),
}

impl<'a> StreamFrame<'a> {
    /// Classify one decoded line
    pub fn classify(line: &'a str) -> Self {
        match line.strip_prefix(DATA_PREFIX) {
            None => StreamFrame::Ignored,
            Some(payload) if payload.trim() == DONE_SENTINEL => StreamFrame::Done,
            Some(payload) => StreamFrame::Data(payload),
        }
    }
}

/// One streamed chat-completion chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeltaPayload {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

impl DeltaPayload {
    /// Parse the JSON after `data: `
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| ChatError::FrameParse(format!("{}: {}", e, truncate(payload, 80))))
    }

    /// `choices[0].delta.content`, if present and non-empty
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_data_line() {
        let line = r#"data: {"choices":[]}"#;
        assert_eq!(StreamFrame::classify(line), StreamFrame::Data(r#"{"choices":[]}"#));
    }

    #[test]
    fn test_classify_done() {
        assert_eq!(StreamFrame::classify("data: [DONE]"), StreamFrame::Done);
    }

    #[test]
    fn test_classify_ignored_lines() {
        assert_eq!(StreamFrame::classify(""), StreamFrame::Ignored);
        assert_eq!(StreamFrame::classify(": keep-alive"), StreamFrame::Ignored);
        assert_eq!(StreamFrame::classify("event: message"), StreamFrame::Ignored);
        // prefix is exact, including the space
        assert_eq!(StreamFrame::classify("data:{\"x\":1}"), StreamFrame::Ignored);
    }

    #[test]
    fn test_payload_content() {
        let payload = DeltaPayload::parse(
            r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(payload.content(), Some("Hel"));
        assert_eq!(payload.finish_reason(), None);
    }

    #[test]
    fn test_payload_without_content() {
        let role_only = DeltaPayload::parse(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(role_only.content(), None);

        let empty = DeltaPayload::parse(r#"{"choices":[{"delta":{"content":""}}]}"#).unwrap();
        assert_eq!(empty.content(), None);

        let no_choices = DeltaPayload::parse(r#"{"choices":[]}"#).unwrap();
        assert_eq!(no_choices.content(), None);

        let usage_only = DeltaPayload::parse(r#"{"usage":{"total_tokens":3}}"#).unwrap();
        assert_eq!(usage_only.content(), None);
    }

    #[test]
    fn test_payload_finish_reason() {
        let payload = DeltaPayload::parse(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(payload.finish_reason(), Some("stop"));
    }

    #[test]
    fn test_malformed_payload() {
        let result = DeltaPayload::parse("{bad json");
        assert!(matches!(result, Err(ChatError::FrameParse(_))));
    }

    #[test]
    fn test_truncate_long_payload() {
        let long = "x".repeat(200);
        let short = truncate(&long, 80);
        assert_eq!(short.len(), 83);
        assert_eq!(truncate("abc", 80), "abc");
    }
}
