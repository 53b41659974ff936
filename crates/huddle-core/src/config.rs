//! Configuration management for huddle.
//!
//! Loads configuration from ${HUDDLE_HOME}/config.toml with sensible defaults.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `base_url`.
pub const BASE_URL_ENV: &str = "HUDDLE_BASE_URL";

/// How an ask reaches the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Server-sent events from the streaming endpoint, synchronous fallback on failure.
    #[default]
    Stream,
    /// A single synchronous request.
    Json,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Stream => "stream",
            Transport::Json => "json",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "stream" | "sse" => Ok(Transport::Stream),
            "json" | "sync" => Ok(Transport::Json),
            other => Err(format!(
                "Invalid transport '{other}'. Valid options: stream, json"
            )),
        }
    }
}

pub mod paths {
    //! Path resolution for huddle configuration.
    //!
    //! HUDDLE_HOME resolution order:
    //! 1. HUDDLE_HOME environment variable (if set)
    //! 2. ~/.config/huddle (default)

    use std::path::PathBuf;

    /// Returns the huddle home directory.
    pub fn huddle_home() -> PathBuf {
        if let Ok(home) = std::env::var("HUDDLE_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map_or_else(|| PathBuf::from(".huddle"), |h| h.join(".config").join("huddle"))
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        huddle_home().join("config.toml")
    }
}

fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the research agent server
    pub base_url: String,

    /// Preferred transport for asks
    pub transport: Transport,

    /// League (context) identifier sent with every ask
    #[serde(skip_serializing_if = "Option::is_none")]
    pub league_id: Option<String>,

    /// Path of the streaming endpoint
    pub stream_path: String,

    /// Path of the synchronous endpoint
    pub ask_path: String,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Timeout for the synchronous request in seconds
    pub request_timeout_secs: u64,

    /// Maximum silence between stream frames in seconds (0 disables)
    pub stream_idle_timeout_secs: u64,

    /// Optional file to write logs to instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            transport: Transport::default(),
            league_id: None,
            stream_path: Self::DEFAULT_STREAM_PATH.to_string(),
            ask_path: Self::DEFAULT_ASK_PATH.to_string(),
            connect_timeout_secs: Self::DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            stream_idle_timeout_secs: Self::DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
            log_file: None,
        }
    }
}

impl Config {
    pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
    const DEFAULT_STREAM_PATH: &str = "/api/ask/stream";
    const DEFAULT_ASK_PATH: &str = "/api/ask";
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
    const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 300;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Returns the effective base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is not a valid URL.
    pub fn effective_base_url(&self) -> Result<String> {
        resolve_base_url(Some(&self.base_url), BASE_URL_ENV, Self::DEFAULT_BASE_URL)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns `None` when the idle timeout is disabled.
    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.stream_idle_timeout_secs))
    }
}

/// Resolves a base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the env or config value is not a valid URL.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var)
        && !env_url.trim().is_empty()
    {
        return normalize_base_url(&env_url);
    }

    if let Some(config_url) = config_base_url
        && !config_url.trim().is_empty()
    {
        return normalize_base_url(config_url);
    }

    Ok(default_url.to_string())
}

/// Trims and validates a base URL, dropping any trailing slash.
///
/// # Errors
/// Returns an error if `url` does not parse.
pub fn normalize_base_url(url: &str) -> Result<String> {
    let trimmed = url.trim();
    url::Url::parse(trimmed).with_context(|| format!("Invalid base URL: {trimmed}"))?;
    Ok(trimmed.trim_end_matches('/').to_string())
}
