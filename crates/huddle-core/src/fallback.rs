//! Synchronous retry for sessions whose stream could not complete.

use tokio_util::sync::CancellationToken;

use crate::client::{AskRequest, QueryClient, QueryError, QueryErrorKind, QueryResult};
use crate::events::{SessionUpdate, UpdateSender};
use crate::session::{Session, Transition};

/// Message used when a session asks for a second fallback.
pub const FALLBACK_EXHAUSTED_MESSAGE: &str = "fallback already attempted";

/// Runs the single synchronous attempt for `session`.
///
/// On success the session completes with the synchronous answer. On failure
/// it moves to terminal `Error` and the wire error is returned. Emits exactly
/// one terminal update either way.
///
/// # Errors
/// Returns the failure that ended the session.
pub async fn run_fallback(
    session: &mut Session,
    client: &QueryClient,
    request: &AskRequest,
    sender: &UpdateSender,
    cancel: &CancellationToken,
) -> QueryResult<()> {
    if !session.begin_fallback() {
        let message = session
            .error_message()
            .unwrap_or(FALLBACK_EXHAUSTED_MESSAGE)
            .to_string();
        tracing::warn!(session_id = session.id(), %message, "no fallback attempt left");
        fail(session, sender, &message).await;
        return Err(QueryError::new(QueryErrorKind::Disconnected, message));
    }

    tracing::info!(session_id = session.id(), "asking synchronously");
    sender.send(SessionUpdate::FallbackStarted).await;

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(QueryError::cancelled()),
        result = client.ask_json(request) => result,
    };

    match result {
        Ok(response) => {
            let transition = session.complete_with(response.answer, &response.sources);
            if transition == Transition::Completed {
                sender
                    .send(SessionUpdate::Completed {
                        answer: session.answer(),
                        citations: session.citations().to_vec(),
                        via_fallback: true,
                    })
                    .await;
            }
            Ok(())
        }
        Err(err) => {
            tracing::warn!(
                session_id = session.id(),
                kind = %err.kind,
                error = %err,
                "fallback failed"
            );
            fail(session, sender, &err.message).await;
            Err(err)
        }
    }
}

async fn fail(session: &mut Session, sender: &UpdateSender, message: &str) {
    if let Transition::Failed { message, .. } = session.fail(message) {
        sender.send(SessionUpdate::Failed { message }).await;
    }
}
