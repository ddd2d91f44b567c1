// error.rs — Error types for the audit subsystem.
//
// `DeliveryError` covers a single failed send and never reaches the code
// that captured the event: the worker retries it and logs the outcome.
// `AuditError` is returned only from setup paths (config, client start,
// reading a local log back).

use std::path::PathBuf;
use thiserror::Error;

/// A single failed attempt to hand an event to a transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request never produced a response (connect error, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The sink answered with a non-2xx status.
    #[error("sink rejected event with HTTP {status}")]
    Status { status: u16 },

    /// Writing to a local sink failed.
    #[error("failed to write event: {0}")]
    Io(#[from] std::io::Error),

    /// The event could not be encoded.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => DeliveryError::Status {
                status: status.as_u16(),
            },
            None => DeliveryError::Transport(err.to_string()),
        }
    }
}

/// Errors from setting up or inspecting the audit pipeline.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The configuration has an out-of-range value.
    #[error("invalid audit config: {reason}")]
    InvalidConfig { reason: String },

    /// The config file could not be read.
    #[error("failed to read audit config at {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML.
    #[error("failed to parse audit config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// The background delivery thread could not be started.
    #[error("failed to spawn delivery worker: {0}")]
    SpawnFailed(std::io::Error),

    /// Failed to open a local audit log.
    #[error("failed to open audit log at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A local audit log line is not a valid event.
    #[error("malformed event at line {line}: {source}")]
    MalformedEvent {
        line: usize,
        source: serde_json::Error,
    },
}
