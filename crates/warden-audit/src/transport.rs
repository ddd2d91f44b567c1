// transport.rs — Where delivered events go.
//
// The delivery worker hands each event to an `AuditTransport` one at a
// time. Any error is treated as retryable; the worker owns the retry
// policy, transports just report success or failure of a single attempt.
//
// Two transports ship with the crate:
// - HttpTransport: POST <api_url>/v1/events with a JSON body
// - JsonlTransport: append one JSON line per event to a local file

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::blocking::Client;

use crate::config::AuditConfig;
use crate::error::{AuditError, DeliveryError};
use crate::event::AuditEvent;

/// A destination for audit events.
///
/// Called from the delivery worker thread and, when the buffer overflows,
/// from the capturing thread, so implementations must be `Send + Sync`.
pub trait AuditTransport: Send + Sync {
    /// Deliver one event. Errors are retried by the caller.
    fn send(&self, event: &AuditEvent) -> Result<(), DeliveryError>;
}

impl<T: AuditTransport + ?Sized> AuditTransport for Arc<T> {
    fn send(&self, event: &AuditEvent) -> Result<(), DeliveryError> {
        (**self).send(event)
    }
}

/// Sends events to the ingest service over HTTP.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Build a transport for `config.events_endpoint()` with the configured timeout.
    pub fn new(config: &AuditConfig) -> Result<Self, AuditError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.events_endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AuditTransport for HttpTransport {
    fn send(&self, event: &AuditEvent) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.endpoint).json(event).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Appends events to a JSONL file: one JSON object per line.
///
/// Useful when no ingest service is reachable (CI runners, local runs);
/// the file can be replayed or inspected with standard tools.
pub struct JsonlTransport {
    file: Mutex<File>,
    path: PathBuf,
}

impl JsonlTransport {
    /// Open (or create) a log file in append mode. Parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all events from a log file, oldest first. Blank lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, AuditError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| AuditError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|source| {
                AuditError::MalformedEvent {
                    line: index + 1,
                    source,
                }
            })?;
            events.push(event);
        }
        Ok(events)
    }
}

impl AuditTransport for JsonlTransport {
    fn send(&self, event: &AuditEvent) -> Result<(), DeliveryError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        // One write per line keeps lines whole even with concurrent senders.
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
