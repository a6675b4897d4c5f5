//! Configuration for the data-access layer.
//!
//! Loaded from `FORUM_*` environment variables with defaults suited to a
//! single-instance development setup.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// One week, the TTL of most cached entities.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 7;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;
pub const DEFAULT_INVALIDATION_QUEUE: usize = 1024;
pub const DEFAULT_INVALIDATION_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INVALIDATION_BACKOFF_MS: u64 = 50;

/// Which error a batch fetch reports when several of its fetches fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSelection {
    /// The failure that arrived first. Can differ between runs.
    #[default]
    FirstReceived,
    /// The failure for the earliest position in the input.
    LowestSequence,
}

impl FromStr for ErrorSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first_received" | "first-received" => Ok(ErrorSelection::FirstReceived),
            "lowest_sequence" | "lowest-sequence" => Ok(ErrorSelection::LowestSequence),
            other => Err(ConfigError::InvalidValue {
                field: "FORUM_FETCH_ERROR_SELECTION".to_string(),
                value: other.to_string(),
                reason: "expected first_received or lowest_sequence".to_string(),
            }),
        }
    }
}

/// Data-access layer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    /// Upper bound on concurrent fetches within one batch.
    pub max_in_flight: usize,
    pub error_selection: ErrorSelection,
    /// TTL used for registry entries that don't set their own.
    pub default_ttl: Duration,
    /// Shared cache store; `None` selects the process-local store.
    pub redis_url: Option<String>,
    /// Capacity of the background invalidation queue.
    pub invalidation_queue: usize,
    pub invalidation_max_attempts: u32,
    /// Backoff before the first retry; doubles on each further attempt.
    pub invalidation_backoff: Duration,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            error_selection: ErrorSelection::default(),
            default_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            redis_url: None,
            invalidation_queue: DEFAULT_INVALIDATION_QUEUE,
            invalidation_max_attempts: DEFAULT_INVALIDATION_MAX_ATTEMPTS,
            invalidation_backoff: Duration::from_millis(DEFAULT_INVALIDATION_BACKOFF_MS),
        }
    }
}

impl DataConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config from environment variables.
    ///
    /// Environment variables:
    /// - `FORUM_FETCH_MAX_IN_FLIGHT`: concurrent fetches per batch (default: 32)
    /// - `FORUM_FETCH_ERROR_SELECTION`: `first_received` or `lowest_sequence`
    /// - `FORUM_CACHE_DEFAULT_TTL_SECS`: default TTL (default: one week)
    /// - `FORUM_REDIS_URL`: shared cache store URL (default: process-local)
    /// - `FORUM_INVALIDATION_QUEUE`: invalidation queue capacity (default: 1024)
    /// - `FORUM_INVALIDATION_MAX_ATTEMPTS`: attempts per purge (default: 3)
    /// - `FORUM_INVALIDATION_BACKOFF_MS`: first retry backoff (default: 50)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset keys take their
    /// defaults; malformed or out-of-range values are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let error_selection = match lookup("FORUM_FETCH_ERROR_SELECTION") {
            Some(value) => value.parse()?,
            None => ErrorSelection::default(),
        };

        let config = Self {
            max_in_flight: parse_var(&lookup, "FORUM_FETCH_MAX_IN_FLIGHT", DEFAULT_MAX_IN_FLIGHT)?,
            error_selection,
            default_ttl: Duration::from_secs(parse_var(
                &lookup,
                "FORUM_CACHE_DEFAULT_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
            redis_url: lookup("FORUM_REDIS_URL").filter(|s| !s.trim().is_empty()),
            invalidation_queue: parse_var(
                &lookup,
                "FORUM_INVALIDATION_QUEUE",
                DEFAULT_INVALIDATION_QUEUE,
            )?,
            invalidation_max_attempts: parse_var(
                &lookup,
                "FORUM_INVALIDATION_MAX_ATTEMPTS",
                DEFAULT_INVALIDATION_MAX_ATTEMPTS,
            )?,
            invalidation_backoff: Duration::from_millis(parse_var(
                &lookup,
                "FORUM_INVALIDATION_BACKOFF_MS",
                DEFAULT_INVALIDATION_BACKOFF_MS,
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the layer relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "default_ttl".to_string(),
                value: "0".to_string(),
                reason: "cache entries need a positive TTL".to_string(),
            });
        }
        if self.invalidation_queue == 0 {
            return Err(ConfigError::InvalidValue {
                field: "invalidation_queue".to_string(),
                value: "0".to_string(),
                reason: "queue capacity must be at least 1".to_string(),
            });
        }
        if self.invalidation_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "invalidation_max_attempts".to_string(),
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }

    /// Effective fan-out cap; zero means sequential.
    pub fn effective_max_in_flight(&self) -> usize {
        self.max_in_flight.max(1)
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    pub fn with_error_selection(mut self, selection: ErrorSelection) -> Self {
        self.error_selection = selection;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn with_invalidation_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.invalidation_max_attempts = max_attempts;
        self.invalidation_backoff = backoff;
        self
    }
}

/// Parse `key` as `T`, or return `default` when it is unset.
fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
