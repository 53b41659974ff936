use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of wire errors for consistent handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout, request timeout or stream idle timeout
    Timeout,
    /// Could not reach the server
    Connect,
    /// Failed to parse a response body or the SSE framing
    Parse,
    /// Stream ended or broke before a terminal frame
    Disconnected,
    /// The server reported an error frame mid-stream
    Api,
    /// Caller closed the transport
    Cancelled,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryErrorKind::HttpStatus => write!(f, "http_status"),
            QueryErrorKind::Timeout => write!(f, "timeout"),
            QueryErrorKind::Connect => write!(f, "connect"),
            QueryErrorKind::Parse => write!(f, "parse"),
            QueryErrorKind::Disconnected => write!(f, "disconnected"),
            QueryErrorKind::Api => write!(f, "api"),
            QueryErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured error from the query endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error.
    ///
    /// The server reports failures as `{"error": "..."}`; when that field is
    /// present it becomes the message verbatim.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        if let Ok(json) = serde_json::from_str::<Value>(body)
            && let Some(msg) = json.get("error").and_then(Value::as_str)
            && !msg.trim().is_empty()
        {
            return Self {
                kind: QueryErrorKind::HttpStatus,
                message: msg.to_string(),
                details,
            };
        }
        Self {
            kind: QueryErrorKind::HttpStatus,
            message: format!("Request failed (HTTP {status})"),
            details,
        }
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(QueryErrorKind::Disconnected, message)
    }

    pub fn cancelled() -> Self {
        Self::new(QueryErrorKind::Cancelled, "cancelled")
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for QueryError {}

/// Maps a transport failure from reqwest onto a `QueryError`.
pub(crate) fn classify_reqwest_error(err: &reqwest::Error) -> QueryError {
    if err.is_timeout() {
        QueryError::new(QueryErrorKind::Timeout, format!("Request timed out: {err}"))
    } else if err.is_connect() {
        QueryError::new(
            QueryErrorKind::Connect,
            format!("Could not connect to server: {err}"),
        )
    } else if err.is_decode() {
        QueryError::new(QueryErrorKind::Parse, format!("Invalid response: {err}"))
    } else {
        QueryError::new(QueryErrorKind::Disconnected, format!("Request failed: {err}"))
    }
}

/// Result type for wire operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;
