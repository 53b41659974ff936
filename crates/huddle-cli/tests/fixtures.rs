//! SSE fixture helpers for integration tests.

#![allow(dead_code)]

use serde_json::json;
use wiremock::ResponseTemplate;

// Load fixture templates at compile time
pub const SSE_ANSWER: &str = include_str!("fixtures/answer_stream.sse");
pub const SSE_STREAM_ERROR: &str = include_str!("fixtures/stream_error.sse");

/// Planning, two answer fragments, one tool source, end.
pub fn answer_sse(first: &str, second: &str) -> String {
    SSE_ANSWER
        .replace("{{FIRST}}", &escape_json(first))
        .replace("{{SECOND}}", &escape_json(second))
}

/// Planning followed by an `error` frame.
pub fn stream_error_sse(message: &str) -> String {
    SSE_STREAM_ERROR.replace("{{MESSAGE}}", &escape_json(message))
}

/// Planning, one answer frame per fragment, end.
pub fn fragments_sse(fragments: &[String]) -> String {
    let mut body = String::from("data: {\"status\":\"planning\"}\n\n");
    for fragment in fragments {
        body.push_str(&format!("data: {{\"token\":\"{}\"}}\n\n", escape_json(fragment)));
    }
    body.push_str("event: end\ndata:\n\n");
    body
}

/// Wrap SSE body string in a ResponseTemplate.
pub fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

/// Synchronous endpoint success body.
pub fn answer_response(answer: &str, sources: &serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "answer": answer, "sources": sources }))
}

/// Escape special characters for JSON string embedding.
fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_sse_substitution() {
        let result = answer_sse("Start \"Allen\"", ".");
        assert!(result.contains(r#"{"token":"Start \"Allen\""}"#));
        assert!(result.contains("event: sources"));
        assert!(result.ends_with("event: end\ndata:\n\n"));
    }

    #[test]
    fn test_stream_error_substitution() {
        let result = stream_error_sse("upstream timeout");
        assert!(result.contains(r#"data: {"error":"upstream timeout"}"#));
    }
}
