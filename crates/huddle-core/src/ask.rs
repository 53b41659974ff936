//! Transport selection: drives one question to exactly one terminal outcome.
//!
//! With the `stream` transport the answer is streamed and decoded frame by
//! frame; a stream that fails before `end` gets one synchronous retry. With
//! the `json` transport the synchronous endpoint is used directly.
//!
//! The stream is owned by [`Asker::stream_phase`] and dropped on every exit
//! path, which closes the connection.

use std::fmt;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::client::{
    AskRequest, ClientConfig, QueryClient, QueryError, QueryErrorKind, QueryResult, RoutingParams,
};
use crate::config::{Config, Transport};
use crate::events::{SessionUpdate, UpdateSender};
use crate::fallback;
use crate::session::{DISCONNECT_MESSAGE, Session, SessionState, Transition};
use crate::stream::{Decoder, Frame, FrameStream};

/// Routing parameter carrying the league (context) identifier.
pub const LEAGUE_PARAM: &str = "league_id";

/// Errors that reach the caller.
#[derive(Debug)]
pub enum AskError {
    /// Empty or whitespace-only question; nothing was sent.
    InvalidInput,
    /// The session ended in terminal `Error`.
    Failed {
        session: Box<Session>,
        error: QueryError,
    },
}

impl AskError {
    /// True when the caller closed the transport.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AskError::Failed { error, .. } if error.kind == QueryErrorKind::Cancelled)
    }
}

impl fmt::Display for AskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AskError::InvalidInput => write!(f, "Question must not be empty"),
            AskError::Failed { session, error } => {
                write!(f, "{}", session.error_message().unwrap_or(&error.message))
            }
        }
    }
}

impl std::error::Error for AskError {}

/// A question that is non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// # Errors
    /// Returns `AskError::InvalidInput` for empty or whitespace-only input.
    pub fn parse(raw: &str) -> Result<Self, AskError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AskError::InvalidInput);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

enum StreamOutcome {
    Completed,
    Failed(QueryError),
    Cancelled,
}

/// Entry point for asking questions.
#[derive(Debug, Clone)]
pub struct Asker {
    client: QueryClient,
    transport: Transport,
    default_params: RoutingParams,
    idle_timeout: Option<Duration>,
}

impl Asker {
    pub fn new(client: QueryClient, transport: Transport) -> Self {
        Self {
            client,
            transport,
            default_params: RoutingParams::new(),
            idle_timeout: None,
        }
    }

    /// Builds an asker from configuration: endpoints, transport preference,
    /// idle timeout and the default league.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::with_endpoints(ClientConfig::from_config(config)?, config)
    }

    /// Like [`Asker::from_config`] but with already resolved endpoints.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_endpoints(endpoints: ClientConfig, config: &Config) -> anyhow::Result<Self> {
        let client = QueryClient::new(endpoints)?;
        let mut asker = Self::new(client, config.transport)
            .with_idle_timeout(config.stream_idle_timeout());
        if let Some(league_id) = config.league_id.as_deref().map(str::trim)
            && !league_id.is_empty()
        {
            asker
                .default_params
                .insert(LEAGUE_PARAM.to_string(), league_id.to_string());
        }
        Ok(asker)
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn endpoints(&self) -> &ClientConfig {
        self.client.config()
    }

    pub fn default_params(&self) -> &RoutingParams {
        &self.default_params
    }

    /// Asks one question and drives its session to a terminal state.
    ///
    /// Caller-supplied `params` override the configured defaults. Cancelling
    /// `cancel` closes the transport and fails the session with
    /// `"cancelled"`.
    ///
    /// # Errors
    /// `AskError::InvalidInput` before any network call for an empty
    /// question; `AskError::Failed` when the session ends in `Error`.
    pub async fn ask(
        &self,
        question: &str,
        params: RoutingParams,
        sender: &UpdateSender,
        cancel: &CancellationToken,
    ) -> Result<Session, AskError> {
        let question = Question::parse(question)?;

        let mut merged = self.default_params.clone();
        merged.extend(params);
        let request = AskRequest::new(question.as_str(), merged);

        let mut session = Session::new(question.into_inner(), self.transport);
        session.begin();
        tracing::info!(
            session_id = session.id(),
            transport = %self.transport,
            "session started"
        );
        sender
            .send(SessionUpdate::Started {
                session_id: session.id().to_string(),
                question: session.question().to_string(),
                transport: self.transport,
            })
            .await;

        if self.transport == Transport::Stream {
            match self.stream_phase(&mut session, &request, sender, cancel).await {
                StreamOutcome::Completed => {
                    tracing::info!(session_id = session.id(), "session completed");
                    return Ok(session);
                }
                StreamOutcome::Cancelled => {
                    tracing::info!(session_id = session.id(), "session cancelled");
                    let transition = session.cancel();
                    report(&session, sender, transition).await;
                    return Err(AskError::Failed {
                        session: Box::new(session),
                        error: QueryError::cancelled(),
                    });
                }
                StreamOutcome::Failed(err) => {
                    tracing::warn!(
                        session_id = session.id(),
                        kind = %err.kind,
                        error = %err,
                        "stream failed, falling back"
                    );
                }
            }
        }

        match fallback::run_fallback(&mut session, &self.client, &request, sender, cancel).await {
            Ok(()) => {
                tracing::info!(session_id = session.id(), "session completed via fallback");
                Ok(session)
            }
            Err(error) => Err(AskError::Failed {
                session: Box::new(session),
                error,
            }),
        }
    }

    /// Streams the answer until the session completes or the stream fails.
    async fn stream_phase(
        &self,
        session: &mut Session,
        request: &AskRequest,
        sender: &UpdateSender,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamOutcome::Cancelled,
            opened = self.client.open_stream(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                let transition = session.disconnect(err.message.clone());
                report(session, sender, transition).await;
                return StreamOutcome::Failed(err);
            }
        };

        let mut decoder = Decoder::new();
        let outcome = loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break StreamOutcome::Cancelled,
                next = next_frame(&mut stream, self.idle_timeout) => next,
            };

            let (transition, failure) = match next {
                Ok(Some(frame)) => {
                    let Some(event) = decoder.decode(&frame) else {
                        continue;
                    };
                    (session.apply(event), None)
                }
                Ok(None) => (
                    session.disconnect(DISCONNECT_MESSAGE),
                    Some(QueryError::disconnected(DISCONNECT_MESSAGE)),
                ),
                Err(err) => (session.disconnect(err.message.clone()), Some(err)),
            };
            report(session, sender, transition).await;

            match session.state() {
                SessionState::Completed => break StreamOutcome::Completed,
                SessionState::Error => {
                    let err = failure.unwrap_or_else(|| {
                        QueryError::new(
                            QueryErrorKind::Api,
                            session.error_message().unwrap_or_default(),
                        )
                    });
                    break StreamOutcome::Failed(err);
                }
                SessionState::Idle | SessionState::Planning | SessionState::Answering => {}
            }
        };

        drop(stream);
        tracing::debug!(session_id = session.id(), stats = ?decoder.stats(), "stream closed");
        outcome
    }
}

async fn next_frame(
    stream: &mut FrameStream,
    idle_timeout: Option<Duration>,
) -> QueryResult<Option<Frame>> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|elapsed| {
                QueryError::new(
                    QueryErrorKind::Timeout,
                    format!("no stream frame for {}s: {elapsed}", limit.as_secs()),
                )
            })?,
        None => stream.next().await,
    };
    next.transpose()
}

/// Forwards a transition to the renderer.
async fn report(session: &Session, sender: &UpdateSender, transition: Transition) {
    match transition {
        Transition::Ignored | Transition::Unchanged => {}
        Transition::Planning => {
            sender
                .send(SessionUpdate::Planning {
                    placeholder: session.placeholder().unwrap_or_default().to_string(),
                })
                .await;
        }
        Transition::Appended {
            text,
            cleared_placeholder,
        } => {
            sender
                .send(SessionUpdate::AnswerDelta {
                    text,
                    cleared_placeholder,
                })
                .await;
        }
        Transition::Cited(citations) => {
            sender
                .send(SessionUpdate::Sources { citations })
                .await;
        }
        Transition::Completed => {
            sender
                .send(SessionUpdate::Completed {
                    answer: session.answer(),
                    citations: session.citations().to_vec(),
                    via_fallback: false,
                })
                .await;
        }
        Transition::Failed {
            message,
            fallback: true,
        } => {
            sender
                .send(SessionUpdate::StreamFailed { message })
                .await;
        }
        Transition::Failed {
            message,
            fallback: false,
        } => {
            sender.send(SessionUpdate::Failed { message }).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    #[test]
    fn test_question_rejects_blank_input() {
        assert!(matches!(Question::parse("   "), Err(AskError::InvalidInput)));
        assert!(matches!(Question::parse(""), Err(AskError::InvalidInput)));
        assert!(matches!(Question::parse("\n\t"), Err(AskError::InvalidInput)));
    }

    #[test]
    fn test_question_is_trimmed() {
        let question = Question::parse("  Who should I start?\n").unwrap();
        assert_eq!(question.as_str(), "Who should I start?");
    }

    #[test]
    fn test_from_config_inserts_league() {
        let config = Config {
            league_id: Some(" 1180244317552857088 ".to_string()),
            ..Config::default()
        };
        let asker = Asker::from_config(&config).unwrap();
        assert_eq!(
            asker.default_params().get(LEAGUE_PARAM).map(String::as_str),
            Some("1180244317552857088")
        );
        assert_eq!(asker.transport(), Transport::Stream);
    }

    #[test]
    fn test_from_config_skips_blank_league() {
        let config = Config {
            league_id: Some("  ".to_string()),
            transport: Transport::Json,
            ..Config::default()
        };
        let asker = Asker::from_config(&config).unwrap();
        assert!(asker.default_params().is_empty());
        assert_eq!(asker.transport(), Transport::Json);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_times_out() {
        let mut frames: FrameStream = stream::pending().boxed();
        let err = next_frame(&mut frames, Some(Duration::from_secs(300)))
            .await
            .unwrap_err();
        assert_eq!(err.kind, QueryErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_next_frame_passes_through() {
        let mut frames: FrameStream =
            stream::iter(vec![Ok(Frame::message("{\"token\":\"hi\"}"))]).boxed();
        let frame = next_frame(&mut frames, None).await.unwrap();
        assert_eq!(frame, Some(Frame::message("{\"token\":\"hi\"}")));
        assert_eq!(next_frame(&mut frames, None).await.unwrap(), None);
    }
}
