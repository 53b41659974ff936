//! Session update types for renderers.
//!
//! This module defines the contract between the transport selector and
//! whatever paints the session (the CLI, tests). Updates are serializable so
//! they can be emitted as JSON lines.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::citation::Citation;
use crate::config::Transport;

/// Updates emitted while a session runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// The question was accepted and a session created.
    Started {
        session_id: String,
        question: String,
        transport: Transport,
    },

    /// The agent is planning; show the placeholder.
    Planning { placeholder: String },

    /// Incremental answer text.
    AnswerDelta {
        text: String,
        /// The planning placeholder must be removed before painting `text`.
        cleared_placeholder: bool,
    },

    /// Citations attached to the answer so far.
    Sources { citations: Vec<Citation> },

    /// The stream failed; a synchronous retry follows.
    StreamFailed { message: String },

    /// The synchronous retry is in flight.
    FallbackStarted,

    /// Final answer. Replaces anything streamed before when a fallback ran.
    Completed {
        answer: String,
        citations: Vec<Citation>,
        /// The answer came from the synchronous endpoint.
        via_fallback: bool,
    },

    /// Terminal failure.
    Failed { message: String },
}

impl SessionUpdate {
    /// Returns true for the single terminal update of a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionUpdate::Completed { .. } | SessionUpdate::Failed { .. }
        )
    }
}

/// Channel-based update sender (async, bounded).
pub type SessionUpdateTx = mpsc::Sender<Arc<SessionUpdate>>;

/// Channel-based update receiver (async, bounded).
pub type SessionUpdateRx = mpsc::Receiver<Arc<SessionUpdate>>;

/// Default channel capacity for update streams.
///
/// A full channel makes the session wait for the renderer.
pub const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Creates a bounded update channel with the default capacity.
pub fn create_update_channel() -> (SessionUpdateTx, SessionUpdateRx) {
    mpsc::channel(DEFAULT_UPDATE_CHANNEL_CAPACITY)
}

/// Update sender wrapper.
///
/// Every update is delivered, answer deltas included: the renderer paints
/// stdout from them, so a dropped delta would leave a hole in the answer.
#[derive(Clone, Debug)]
pub struct UpdateSender {
    tx: Option<SessionUpdateTx>,
}

impl UpdateSender {
    pub fn new(tx: SessionUpdateTx) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sender that discards every update.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Awaits room in the channel. A closed receiver is ignored.
    pub async fn send(&self, update: SessionUpdate) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Arc::new(update)).await;
        }
    }
}
