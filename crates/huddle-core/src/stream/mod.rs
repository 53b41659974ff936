//! Streaming transport: SSE framing and frame decoding.

pub mod decoder;
mod sse;

use futures_util::stream::BoxStream;

pub use decoder::{DecodeStats, Decoder, Event};
pub use sse::SseParser;

use crate::client::QueryResult;

/// Event name the SSE transport assigns to frames without an explicit `event:`.
pub const DEFAULT_EVENT: &str = "message";

/// One discrete unit of the streaming transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Event name; `"message"` (or empty) for default frames.
    pub event: String,
    /// Raw UTF-8 payload.
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// A default frame with no explicit event name.
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(DEFAULT_EVENT, data)
    }

    pub fn is_default(&self) -> bool {
        self.event.is_empty() || self.event == DEFAULT_EVENT
    }
}

/// Boxed stream of transport frames.
pub type FrameStream = BoxStream<'static, QueryResult<Frame>>;
