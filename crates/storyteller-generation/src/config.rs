//! Generation client configuration.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration could not be assembled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `OPENAI_API_KEY` is unset or blank.
    #[error("OPENAI_API_KEY must be set")]
    CredentialMissing,

    /// A variable was present but could not be parsed.
    #[error("{key} has an invalid value: {value:?}")]
    Invalid {
        /// The offending variable.
        key: &'static str,
        /// What it contained.
        value: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

/// Connection and sampling settings for the chat completions endpoint.
#[derive(Clone)]
pub struct GenerationConfig {
    /// Bearer credential.
    pub api_key: String,
    /// Base URL; `/chat/completions` is appended.
    pub api_base: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature for paragraphs.
    pub paragraph_temperature: f32,
    /// Sampling temperature for genre and suggestion lists.
    pub list_temperature: f32,
    /// Optional presence penalty, omitted from requests when unset.
    pub presence_penalty: Option<f32>,
    /// Optional frequency penalty, omitted from requests when unset.
    pub frequency_penalty: Option<f32>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("paragraph_temperature", &self.paragraph_temperature)
            .field("list_temperature", &self.list_temperature)
            .field("presence_penalty", &self.presence_penalty)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GenerationConfig {
    /// Default settings for `api_key`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CredentialMissing` if `api_key` is blank.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::CredentialMissing);
        }
        Ok(Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            paragraph_temperature: 0.5,
            list_temperature: 0.0,
            presence_penalty: None,
            frequency_penalty: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Reads the configuration from process environment.
    ///
    /// # Errors
    ///
    /// See [`GenerationConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`:
    ///
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_API_BASE`
    /// - `STORY_MODEL`
    /// - `STORY_REQUEST_TIMEOUT_SECS`
    /// - `STORY_PRESENCE_PENALTY`, `STORY_FREQUENCY_PENALTY`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CredentialMissing` without a key and
    /// `ConfigError::Invalid` for unparseable numbers.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(lookup("OPENAI_API_KEY").unwrap_or_default())?;

        if let Some(base) = lookup("OPENAI_API_BASE") {
            config.api_base = base;
        }
        if let Some(model) = lookup("STORY_MODEL") {
            config.model = model;
        }
        if let Some(secs) = parse(&lookup, "STORY_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        config.presence_penalty = parse(&lookup, "STORY_PRESENCE_PENALTY")?;
        config.frequency_penalty = parse(&lookup, "STORY_FREQUENCY_PENALTY")?;

        Ok(config)
    }

    /// Full URL of the chat completions endpoint.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
