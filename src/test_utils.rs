//! Test utilities for bodhi-chat
//!
//! Builders for event-stream payloads and assertion helpers shared by the
//! unit tests.

use crate::config::Config;
use crate::error::Result;

/// One `data:` line carrying a content delta, followed by the blank separator line
///
/// # Examples
///
/// ```ignore
/// let line = delta_line("Hi");
/// assert!(line.starts_with("data: {"));
/// ```
pub fn delta_line(content: &str) -> String {
    let chunk = serde_json::json!({
        "choices": [{ "delta": { "content": content } }]
    });
    format!("data: {}\n\n", chunk)
}

/// The stream terminator line
pub fn done_line() -> String {
    "data: [DONE]\n\n".to_string()
}

/// A complete event-stream body with one line per delta and the terminator
pub fn sse_body(deltas: &[&str]) -> String {
    let mut body: String = deltas.iter().map(|d| delta_line(d)).collect();
    body.push_str(&done_line());
    body
}

/// Assert that a result failed with a message containing `expected`
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T: std::fmt::Debug>(result: Result<T>, expected: &str) {
    match result {
        Ok(value) => panic!(
            "Expected error containing '{}' but got Ok({:?})",
            expected, value
        ),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Configuration pointing at `base_url` with short timeouts
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.server.base_url = base_url.to_string();
    config.server.request_timeout_seconds = Some(5);
    config.server.connect_timeout_seconds = 1;
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{decode_line, Record};
    use crate::error::ChatError;

    #[test]
    fn test_delta_line_decodes_as_chunk() {
        let line = delta_line("quote \" and newline \n");
        match decode_line(line.trim()) {
            Record::Chunk(chunk) => {
                assert_eq!(chunk.delta_content(), Some("quote \" and newline \n"))
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_sse_body_ends_with_done() {
        let body = sse_body(&["a", "b"]);
        assert_eq!(body.matches("data: ").count(), 3);
        assert!(body.ends_with("data: [DONE]\n\n"));
    }

    #[test]
    fn test_assert_error_contains() {
        let result: Result<()> = Err(ChatError::Config("invalid".to_string()).into());
        assert_error_contains(result, "invalid");
    }

    #[test]
    fn test_test_config_is_valid() {
        assert!(test_config("http://127.0.0.1:9").validate().is_ok());
    }
}
