//! # warden-audit
//!
//! Buffered, non-blocking capture and delivery of agent audit events.
//!
//! Agents build an [`AuditEvent`] for each decision or action and hand it to
//! an [`AuditClient`]. Capture only touches an in-memory buffer; a background
//! thread drains the buffer on an interval and delivers events through an
//! [`AuditTransport`] with bounded exponential-backoff retries.
//!
//! ## Delivery guarantees
//!
//! - Each captured event is attempted at least once unless the process dies
//!   before the next flush.
//! - No event is delivered twice by the pipeline itself: a flush drains the
//!   buffer atomically and flushes never overlap.
//! - Delivery failures are logged through `tracing` and counted in
//!   [`DeliveryStats`]; they never reach the capturing code.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use warden_audit::{ActionKind, Actor, AuditClient, AuditConfig, AuditEvent, EventStatus};
//!
//! let client = AuditClient::new(AuditConfig::default().with_env_overrides())?;
//! client.capture(
//!     AuditEvent::new("agent-1", "trace-1", Actor::Agent, ActionKind::ToolCall,
//!                     "web_search", EventStatus::Success)
//!         .with_latency_ms(120),
//! );
//! client.close();
//! # Ok::<(), warden_audit::AuditError>(())
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod transport;
pub mod worker;

pub use buffer::EventBuffer;
pub use client::AuditClient;
pub use config::{default_config_path, AuditConfig, API_URL_ENV};
pub use error::{AuditError, DeliveryError};
pub use event::{ActionKind, Actor, AuditEvent, EventStatus};
pub use transport::{AuditTransport, HttpTransport, JsonlTransport};
pub use worker::{DeliveryStats, DeliveryWorker, RetryPolicy, WorkerHandle};
