//! Client configuration model.
//!
//! The request layer receives a [`ClientConfig`] at construction time instead of
//! reading a process-wide token or base URL, so several isolated clients can
//! coexist (tests, multiple backends).

use crate::error::{FoundryError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Poll loop and content-writer tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Delay between successful polls.
    pub interval_ms: u64,
    /// Delay after a failed poll fetch.
    pub error_backoff_ms: u64,
    /// Poll budget for one loop run, counted in intervals. A failed fetch
    /// is charged for every interval its backoff spans.
    pub max_attempts: u32,
    /// How many times a conflicting content write is rebased and retried.
    pub max_conflict_retries: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            error_backoff_ms: 10_000,
            // 900 * 2s = 30 minutes of wall clock at the nominal cadence
            max_attempts: 900,
            max_conflict_retries: 3,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

/// Connection settings for the backend REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL including the API prefix, e.g. `https://host/api`.
    pub api_url: String,
    /// Bearer token attached to every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Optional per-request transport timeout. The poll budget is the
    /// operational timeout; this only guards against hung connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    pub poll: PollSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            request_timeout_secs: None,
            poll: PollSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Checks the invariants the client relies on.
    pub fn validate(&self) -> Result<()> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(FoundryError::config("api_url must not be empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FoundryError::config(format!(
                "api_url must start with http:// or https:// (got '{url}')"
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(FoundryError::config("poll.interval_ms must be greater than 0"));
        }
        if self.poll.max_attempts == 0 {
            return Err(FoundryError::config("poll.max_attempts must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll.interval(), Duration::from_secs(2));
        assert!(config.poll.error_backoff() > config.poll.interval());
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let config = ClientConfig::new("https://example.com/api/");
        assert_eq!(config.base_url(), "https://example.com/api");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::new("").validate().unwrap_err().to_string().contains("api_url"));
        assert!(ClientConfig::new("ftp://host").validate().is_err());

        let mut config = ClientConfig::default();
        config.poll.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            api_url = "https://factory.example/api"

            [poll]
            interval_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.api_url, "https://factory.example/api");
        assert_eq!(config.poll.interval_ms, 500);
        assert_eq!(config.poll.max_attempts, 900);
        assert!(config.token.is_none());
    }
}
