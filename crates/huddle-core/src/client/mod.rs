//! HTTP client for the research agent's query endpoints.
//!
//! - `GET {stream_path}?question=..&<params>` answers with server-sent events.
//! - `POST {ask_path}` with `{"question": .., <params>}` answers with
//!   `{"answer": .., "sources": [..]}`.

mod error;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::{QueryError, QueryErrorKind, QueryResult};
pub(crate) use error::classify_reqwest_error;

use crate::config::{Config, normalize_base_url};
use crate::stream::{FrameStream, SseParser};

/// Standard User-Agent header for huddle requests.
pub const USER_AGENT: &str = concat!("huddle/", env!("CARGO_PKG_VERSION"));

/// Answer text used when the synchronous endpoint returns none.
pub const NO_ANSWER: &str = "No answer.";

/// Opaque routing parameters (league/context id and friends).
pub type RoutingParams = BTreeMap<String, String>;

/// A validated question plus its routing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(flatten)]
    pub params: RoutingParams,
}

impl AskRequest {
    /// A `question` entry in `params` is discarded; the question always wins.
    pub fn new(question: impl Into<String>, mut params: RoutingParams) -> Self {
        params.remove("question");
        Self {
            question: question.into(),
            params,
        }
    }

    /// Query string pairs for the streaming endpoint.
    fn query_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.push(("question", self.question.as_str()));
        pairs
    }
}

/// Successful synchronous answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskResponse {
    pub answer: String,
    /// Raw source descriptors, normalized by the session.
    pub sources: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct AskResponseBody {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    sources: Option<Vec<Value>>,
}

/// Endpoint settings resolved from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub stream_path: String,
    pub ask_path: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Resolves endpoint settings, applying the `HUDDLE_BASE_URL` override.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_base_url(config, None)
    }

    /// Like [`Self::from_config`], but an explicit `base_url` wins and the
    /// env and config values are not consulted at all.
    ///
    /// # Errors
    /// Returns an error if the chosen base URL is invalid.
    pub fn from_config_with_base_url(config: &Config, base_url: Option<&str>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => normalize_base_url(url)?,
            None => config.effective_base_url()?,
        };
        Ok(Self {
            base_url,
            stream_path: config.stream_path.clone(),
            ask_path: config.ask_path.clone(),
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Query endpoint client.
#[derive(Debug, Clone)]
pub struct QueryClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl QueryClient {
    /// Creates a new client with the given endpoint settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Opens the event stream for a question.
    ///
    /// The returned stream owns the connection; dropping it closes the
    /// transport.
    ///
    /// # Errors
    /// Returns an error if the request fails or the server answers non-2xx.
    pub async fn open_stream(&self, request: &AskRequest) -> QueryResult<FrameStream> {
        let url = self.config.url(&self.config.stream_path);
        tracing::debug!(%url, "opening answer stream");

        let response = self
            .http
            .get(&url)
            .query(&request.query_pairs())
            .header("accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(QueryError::http_status(status.as_u16(), &error_body));
        }

        Ok(SseParser::new(Box::pin(response.bytes_stream())).boxed())
    }

    /// Asks synchronously.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-2xx status or an
    /// unparseable success body.
    pub async fn ask_json(&self, request: &AskRequest) -> QueryResult<AskResponse> {
        let url = self.config.url(&self.config.ask_path);
        tracing::debug!(%url, "sending synchronous ask");

        let response = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .header("accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        if !status.is_success() {
            return Err(QueryError::http_status(status.as_u16(), &body));
        }

        let parsed: AskResponseBody = serde_json::from_str(&body).map_err(|err| QueryError {
            kind: QueryErrorKind::Parse,
            message: format!("Failed to parse answer: {err}"),
            details: Some(body.clone()),
        })?;

        Ok(AskResponse {
            answer: parsed
                .answer
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| NO_ANSWER.to_string()),
            sources: parsed.sources.unwrap_or_default(),
        })
    }
}
