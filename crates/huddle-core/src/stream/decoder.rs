//! Frame → session event decoding.
//!
//! Decoding never fails. Default frames that are not JSON degrade to
//! [`Event::RawText`], malformed `sources` frames are dropped, and `error`/`end`
//! frames always produce an event whatever their payload.

use serde::Deserialize;
use serde_json::Value;

use super::Frame;

/// Fallback message for `error` frames without a usable `error` field.
pub const STREAM_ERROR_MESSAGE: &str = "stream error";

const PLANNING_STATUS: &str = "planning";

/// A decoded session event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The agent is planning; no tokens yet.
    Planning,
    /// An answer fragment.
    Token(String),
    /// Raw source descriptors, normalized by the session.
    Sources(Vec<Value>),
    /// Stream-level error reported by the server.
    Error(String),
    /// Stream finished.
    End,
    /// Default frame payload that was not JSON; appended verbatim.
    RawText(String),
}

/// Non-fatal decode counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub frames: u64,
    pub raw_text: u64,
    /// Frames that decoded to nothing (unknown event, JSON without fields).
    pub ignored: u64,
    /// `sources` frames whose payload was not a JSON array.
    pub dropped_sources: u64,
}

/// Stateless per-frame decoder that keeps running counters.
#[derive(Debug, Default)]
pub struct Decoder {
    stats: DecodeStats,
}

#[derive(Debug, Deserialize)]
struct DefaultPayload {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    token: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<Value>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Decodes one frame. `None` means the frame carries nothing for the session.
    pub fn decode(&mut self, frame: &Frame) -> Option<Event> {
        self.stats.frames += 1;
        if frame.is_default() {
            return self.decode_default(&frame.data);
        }
        match frame.event.as_str() {
            "sources" => self.decode_sources(&frame.data),
            "error" => Some(decode_error(&frame.data)),
            "end" => Some(Event::End),
            other => {
                tracing::debug!(event = other, "ignoring frame with unknown event name");
                self.stats.ignored += 1;
                None
            }
        }
    }

    fn decode_default(&mut self, data: &str) -> Option<Event> {
        let Ok(value) = serde_json::from_str::<Value>(data) else {
            self.stats.raw_text += 1;
            return Some(Event::RawText(data.to_string()));
        };

        // Valid JSON that is not an object carries neither field.
        let payload = value
            .is_object()
            .then(|| DefaultPayload::deserialize(&value).ok())
            .flatten();
        let event = payload.and_then(|payload| {
            if payload.status.as_ref().and_then(Value::as_str) == Some(PLANNING_STATUS) {
                return Some(Event::Planning);
            }
            payload.token.and_then(token_text).map(Event::Token)
        });
        if event.is_none() {
            self.stats.ignored += 1;
        }
        event
    }

    fn decode_sources(&mut self, data: &str) -> Option<Event> {
        match serde_json::from_str::<Vec<Value>>(data) {
            Ok(sources) => Some(Event::Sources(sources)),
            Err(err) => {
                tracing::debug!(error = %err, "dropping malformed sources frame");
                self.stats.dropped_sources += 1;
                None
            }
        }
    }
}

/// Text of a `token` field. Non-empty strings, non-zero numbers and `true`
/// are appended; anything else carries no text.
fn token_text(token: Value) -> Option<String> {
    match token {
        Value::String(text) => (!text.is_empty()).then_some(text),
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|f| f.abs() > 0.0)
            .then(|| n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn decode_error(data: &str) -> Event {
    let message = serde_json::from_str::<ErrorPayload>(data)
        .ok()
        .and_then(|p| p.error)
        .and_then(|e| e.as_str().map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| STREAM_ERROR_MESSAGE.to_string());
    Event::Error(message)
}
