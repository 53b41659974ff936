//! One question/answer exchange and its state machine.
//!
//! A `Session` is mutated only through [`Session::begin`], [`Session::apply`]
//! and the fallback/termination methods. Every method reports what changed as
//! a [`Transition`] so the driver can forward it to the renderer.
//!
//! ```text
//! Idle --begin--> Planning --Token--> Answering --End--> Completed
//!                    |                    |
//!                    +------Error---------+--> Error --fallback ok--> Completed
//!                                                 \--fallback failed--> Error (terminal)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::citation::{Citation, normalize_sources};
use crate::config::Transport;
use crate::stream::Event;

/// Transient status text shown before the first answer token.
pub const PLANNING_PLACEHOLDER: &str = "Planning…";

/// Message recorded when the stream ends without `end` or `error`.
pub const DISCONNECT_MESSAGE: &str = "stream disconnected before completion";

/// Message recorded when the caller closes the transport.
pub const CANCELLED_MESSAGE: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Planning,
    Answering,
    Error,
    Completed,
}

/// Observable effect of feeding something into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The session is not accepting this input (idle, failed or completed).
    Ignored,
    /// Accepted, nothing changed.
    Unchanged,
    /// Entered or confirmed the planning phase; placeholder is showing.
    Planning,
    /// A fragment was appended to the answer.
    Appended {
        text: String,
        /// The planning placeholder was removed before appending.
        cleared_placeholder: bool,
    },
    /// Citations were appended.
    Cited(Vec<Citation>),
    /// The answer is final.
    Completed,
    /// Streaming failed.
    Failed {
        message: String,
        /// A fallback attempt is still available.
        fallback: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    question: String,
    transport: Transport,
    state: SessionState,
    answer_buffer: Vec<String>,
    citations: Vec<Citation>,
    error_message: Option<String>,
    fallback_attempted: bool,
    terminal: bool,
    placeholder: Option<&'static str>,
    dropped_citations: usize,
}

impl Session {
    /// Creates an idle session for an already validated question.
    pub fn new(question: impl Into<String>, transport: Transport) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            transport,
            state: SessionState::Idle,
            answer_buffer: Vec::new(),
            citations: Vec::new(),
            error_message: None,
            fallback_attempted: false,
            terminal: false,
            placeholder: None,
            dropped_citations: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Received answer fragments in arrival order.
    pub fn fragments(&self) -> &[String] {
        &self.answer_buffer
    }

    /// Concatenation of all fragments received so far.
    pub fn answer(&self) -> String {
        self.answer_buffer.concat()
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    /// Present only in the `Error` state.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn fallback_attempted(&self) -> bool {
        self.fallback_attempted
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        self.placeholder
    }

    /// Source descriptors dropped as malformed.
    pub fn dropped_citations(&self) -> usize {
        self.dropped_citations
    }

    /// True once the session reached `Completed` or a terminal `Error`.
    pub fn is_finished(&self) -> bool {
        self.terminal
    }

    /// True while the session consumes stream events.
    pub fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Planning | SessionState::Answering)
    }

    /// Submits the question: `Idle` → `Planning`.
    pub fn begin(&mut self) -> Transition {
        if self.state != SessionState::Idle {
            return Transition::Ignored;
        }
        self.answer_buffer.clear();
        self.citations.clear();
        self.state = SessionState::Planning;
        Transition::Unchanged
    }

    /// Applies one decoded stream event.
    pub fn apply(&mut self, event: Event) -> Transition {
        if !self.is_live() {
            return Transition::Ignored;
        }

        match event {
            Event::Planning => {
                if self.state == SessionState::Planning {
                    self.placeholder = Some(PLANNING_PLACEHOLDER);
                    Transition::Planning
                } else {
                    Transition::Unchanged
                }
            }
            Event::Token(text) | Event::RawText(text) => {
                let cleared_placeholder = self.placeholder.take().is_some();
                self.state = SessionState::Answering;
                self.answer_buffer.push(text.clone());
                Transition::Appended {
                    text,
                    cleared_placeholder,
                }
            }
            Event::Sources(raw) => {
                let normalized = normalize_sources(&raw);
                self.dropped_citations += normalized.dropped;
                if normalized.citations.is_empty() {
                    return Transition::Unchanged;
                }
                self.citations.extend(normalized.citations.iter().cloned());
                Transition::Cited(normalized.citations)
            }
            Event::Error(message) => self.stream_failed(message),
            Event::End => {
                self.placeholder = None;
                self.state = SessionState::Completed;
                self.terminal = true;
                Transition::Completed
            }
        }
    }

    /// The transport broke or ended before a terminal frame.
    pub fn disconnect(&mut self, message: impl Into<String>) -> Transition {
        if !self.is_live() {
            return Transition::Ignored;
        }
        self.stream_failed(message.into())
    }

    fn stream_failed(&mut self, message: String) -> Transition {
        self.placeholder = None;
        self.state = SessionState::Error;
        self.error_message = Some(message.clone());
        let fallback = !self.fallback_attempted;
        self.terminal = !fallback;
        Transition::Failed { message, fallback }
    }

    /// Claims the single fallback attempt.
    ///
    /// Returns `false` when the attempt was already used or the session is
    /// finished. The flag flips before any request is made.
    pub fn begin_fallback(&mut self) -> bool {
        if self.terminal || self.fallback_attempted || self.state == SessionState::Idle {
            return false;
        }
        self.fallback_attempted = true;
        true
    }

    /// Completes the session with a synchronous answer, replacing anything
    /// streamed so far.
    pub fn complete_with(&mut self, answer: String, sources: &[Value]) -> Transition {
        if self.terminal || self.state == SessionState::Idle {
            return Transition::Ignored;
        }
        let normalized = normalize_sources(sources);
        self.dropped_citations += normalized.dropped;
        self.answer_buffer = vec![answer];
        self.citations = normalized.citations;
        self.error_message = None;
        self.placeholder = None;
        self.state = SessionState::Completed;
        self.terminal = true;
        Transition::Completed
    }

    /// Moves to terminal `Error`.
    pub fn fail(&mut self, message: impl Into<String>) -> Transition {
        if self.terminal {
            return Transition::Ignored;
        }
        let message = message.into();
        self.placeholder = None;
        self.state = SessionState::Error;
        self.error_message = Some(message.clone());
        self.terminal = true;
        Transition::Failed {
            message,
            fallback: false,
        }
    }

    /// Caller closed the transport.
    pub fn cancel(&mut self) -> Transition {
        self.fail(CANCELLED_MESSAGE)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            question: self.question.clone(),
            state: self.state,
            transport: self.transport,
            answer: (self.state == SessionState::Completed).then(|| self.answer()),
            citations: self.citations.clone(),
            error: self.error_message.clone(),
            fallback_attempted: self.fallback_attempted,
        }
    }
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub question: String,
    pub state: SessionState,
    pub transport: Transport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fallback_attempted: bool,
}
