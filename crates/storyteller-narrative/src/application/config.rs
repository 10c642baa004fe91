//! Engine tunables.

use std::time::Duration;

use thiserror::Error;

use crate::domain::aggregates::SessionSettings;

const DEFAULT_REVEAL_TICK_MS: u64 = 175;

/// An engine setting was present but unusable.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{key} has an invalid value: {value:?}")]
pub struct EngineConfigError {
    /// The offending variable.
    pub key: &'static str,
    /// What it contained.
    pub value: String,
}

/// Settings for one [`crate::application::engine::StoryEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Settings handed to every session the engine creates, resets included.
    pub session: SessionSettings,
    /// Interval between reveal ticks.
    pub reveal_tick: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            reveal_tick: Duration::from_millis(DEFAULT_REVEAL_TICK_MS),
        }
    }
}

impl EngineConfig {
    /// Reads overrides from process environment.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_lookup`].
    pub fn from_env() -> Result<Self, EngineConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, starting from the defaults:
    ///
    /// - `STORY_REVEAL_TICK_MS`
    /// - `STORY_SETTLE_DELAY_MS`
    /// - `STORY_GENRE_COUNT`
    /// - `STORY_SUGGESTION_COUNT` (clamped to the supported range)
    ///
    /// # Errors
    ///
    /// Returns `EngineConfigError` for unparseable numbers or a zero tick.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_u64(&lookup, "STORY_REVEAL_TICK_MS")? {
            if ms == 0 {
                return Err(EngineConfigError {
                    key: "STORY_REVEAL_TICK_MS",
                    value: ms.to_string(),
                });
            }
            config.reveal_tick = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_u64(&lookup, "STORY_SETTLE_DELAY_MS")? {
            config.session = config.session.with_settle_delay(Duration::from_millis(ms));
        }
        if let Some(count) = parse_u64(&lookup, "STORY_GENRE_COUNT")? {
            config.session.genre_count = usize::try_from(count.max(1)).unwrap_or(usize::MAX);
        }
        if let Some(count) = parse_u64(&lookup, "STORY_SUGGESTION_COUNT")? {
            let count = usize::try_from(count).unwrap_or(usize::MAX);
            config.session = config.session.with_suggestion_count(count);
        }

        Ok(config)
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, EngineConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EngineConfigError { key, value }),
    }
}
