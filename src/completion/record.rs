//! Decoding of individual event-stream lines
//!
//! Every non-empty line of a chat-completion event stream is decoded into a
//! [`Record`]. Decoding never fails: malformed input becomes
//! [`Record::Malformed`] so the caller can log it and keep reading.

use serde_json::Value;

use super::types::{ApiErrorDetail, ChatChunk};

/// Terminator payload sent after the last chunk
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event-stream line
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A completion chunk carrying a delta and/or metadata
    Chunk(ChatChunk),
    /// The `data: [DONE]` terminator
    Done,
    /// An error object embedded in an otherwise successful stream
    UpstreamError(ApiErrorDetail),
    /// Payload that is not valid JSON or not a chunk
    Malformed(String),
    /// Blank lines, comments and non-data fields (`event:`, `id:`, `retry:`)
    Ignored,
}

/// Decode a single line of a chat-completion event stream
///
/// # Examples
///
/// ```
/// use bodhi_chat::completion::{decode_line, Record};
///
/// assert_eq!(decode_line("data: [DONE]"), Record::Done);
/// assert!(matches!(decode_line("data: {\"choices\":[]}"), Record::Chunk(_)));
/// assert!(matches!(decode_line("data: not-json"), Record::Malformed(_)));
/// ```
pub fn decode_line(line: &str) -> Record {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Record::Ignored;
    }
    if line.starts_with("event:") || line.starts_with("id:") || line.starts_with("retry:") {
        return Record::Ignored;
    }

    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        None => line,
    };
    if payload == DONE_SENTINEL {
        return Record::Done;
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => return Record::Malformed(format!("invalid JSON: {}", e)),
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return Record::UpstreamError(decode_error(error));
    }

    match serde_json::from_value::<ChatChunk>(value) {
        Ok(chunk) => Record::Chunk(chunk),
        Err(e) => Record::Malformed(format!("unexpected chunk shape: {}", e)),
    }
}

fn decode_error(error: &Value) -> ApiErrorDetail {
    match error {
        Value::String(message) => ApiErrorDetail {
            message: Some(message.clone()),
            ..Default::default()
        },
        other => serde_json::from_value(other.clone()).unwrap_or_else(|_| ApiErrorDetail {
            message: Some(other.to_string()),
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_sentinel_with_whitespace() {
        assert_eq!(decode_line("  data: [DONE]\r"), Record::Done);
        assert_eq!(decode_line("data:[DONE]"), Record::Done);
    }

    #[test]
    fn test_delta_chunk_decoded() {
        match decode_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#) {
            Record::Chunk(chunk) => assert_eq!(chunk.delta_content(), Some("Hel")),
            other => panic!("expected chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_line_without_prefix_is_parsed() {
        assert!(matches!(
            decode_line(r#"{"choices":[{"delta":{"content":"X"}}]}"#),
            Record::Chunk(_)
        ));
    }

    #[test]
    fn test_bad_json_is_malformed() {
        assert!(matches!(decode_line("bad-json"), Record::Malformed(_)));
        assert!(matches!(decode_line("data: {\"choices\":"), Record::Malformed(_)));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        assert!(matches!(
            decode_line(r#"data: {"choices":"nope"}"#),
            Record::Malformed(_)
        ));
    }

    #[test]
    fn test_blank_comment_and_fields_ignored() {
        assert_eq!(decode_line(""), Record::Ignored);
        assert_eq!(decode_line("   "), Record::Ignored);
        assert_eq!(decode_line(": keep-alive"), Record::Ignored);
        assert_eq!(decode_line("event: message"), Record::Ignored);
        assert_eq!(decode_line("id: 42"), Record::Ignored);
    }

    #[test]
    fn test_embedded_error_object() {
        match decode_line(r#"data: {"error":{"message":"context full","type":"server_error"}}"#) {
            Record::UpstreamError(detail) => {
                assert_eq!(detail.message.as_deref(), Some("context full"));
                assert_eq!(detail.error_type.as_deref(), Some("server_error"));
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[test]
    fn test_embedded_error_string() {
        match decode_line(r#"data: {"error":"boom"}"#) {
            Record::UpstreamError(detail) => assert_eq!(detail.message.as_deref(), Some("boom")),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[test]
    fn test_null_error_is_a_chunk() {
        assert!(matches!(
            decode_line(r#"data: {"error":null,"choices":[]}"#),
            Record::Chunk(_)
        ));
    }
}
