// config.rs — Audit client configuration.
//
// Values come from, lowest precedence first: built-in defaults, an optional
// TOML file, then the environment. Durations are stored as fractional
// seconds so the file stays human-editable (`flush_interval_secs = 0.5`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Environment variable overriding `api_url`.
pub const API_URL_ENV: &str = "WARDEN_API_URL";

/// Shortest background flush interval; anything smaller busy-loops the worker.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Shortest request and close timeout.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Upper bound for every configured duration (one week).
const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for [`crate::AuditClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Base URL of the audit ingest service.
    pub api_url: String,
    /// Events held in memory before a capture forces a flush.
    pub buffer_size: usize,
    /// Seconds between background flushes.
    pub flush_interval_secs: f64,
    /// Delivery attempts per event before it is dropped.
    pub max_retries: u32,
    /// Backoff before the second attempt; doubles after each failure.
    pub retry_backoff_secs: f64,
    /// Per-request timeout for the HTTP transport.
    pub request_timeout_secs: f64,
    /// Upper bound on how long `close()` waits for the worker thread.
    pub close_timeout_secs: f64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            buffer_size: 100,
            flush_interval_secs: 5.0,
            max_retries: 3,
            retry_backoff_secs: 1.0,
            request_timeout_secs: 5.0,
            close_timeout_secs: 10.0,
        }
    }
}

impl AuditConfig {
    /// Load a TOML config file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| AuditError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AuditConfig =
            toml::from_str(&data).map_err(|source| AuditError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `WARDEN_API_URL` if it is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = url;
            }
        }
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Reject values the delivery worker cannot run with.
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.buffer_size == 0 {
            return Err(invalid("buffer_size must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries must be at least 1"));
        }
        check_secs(
            "flush_interval_secs",
            self.flush_interval_secs,
            MIN_FLUSH_INTERVAL,
        )?;
        check_secs(
            "request_timeout_secs",
            self.request_timeout_secs,
            MIN_TIMEOUT,
        )?;
        check_secs("close_timeout_secs", self.close_timeout_secs, MIN_TIMEOUT)?;
        check_secs("retry_backoff_secs", self.retry_backoff_secs, Duration::ZERO)?;
        Ok(())
    }

    /// The full ingest endpoint, `<api_url>/v1/events`.
    pub fn events_endpoint(&self) -> String {
        format!("{}/v1/events", self.api_url.trim_end_matches('/'))
    }

    pub fn flush_interval(&self) -> Duration {
        to_duration(self.flush_interval_secs, Self::default().flush_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        to_duration(self.retry_backoff_secs, Self::default().retry_backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        to_duration(self.request_timeout_secs, Self::default().request_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        to_duration(self.close_timeout_secs, Self::default().close_timeout_secs)
    }
}

/// Default config file location under a project root.
pub fn default_config_path(project_root: impl AsRef<Path>) -> PathBuf {
    project_root.as_ref().join(".warden").join("audit.toml")
}

fn check_secs(name: &str, secs: f64, min: Duration) -> Result<(), AuditError> {
    let duration = Duration::try_from_secs_f64(secs)
        .map_err(|_| invalid(format!("{} = {} is not a usable duration", name, secs)))?;
    if duration < min || duration > MAX_DURATION {
        return Err(invalid(format!(
            "{} must be between {:?} and {:?}, got {}",
            name, min, MAX_DURATION, secs
        )));
    }
    Ok(())
}

/// Convert seconds to a Duration, falling back for values `validate` rejects.
fn to_duration(secs: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| *d <= MAX_DURATION)
        .unwrap_or_else(|| Duration::from_secs_f64(fallback))
}

fn invalid(reason: impl Into<String>) -> AuditError {
    AuditError::InvalidConfig {
        reason: reason.into(),
    }
}
