// client.rs — AuditClient: the facade agents talk to.
//
// capture() only ever touches the in-memory buffer, except when the buffer
// is full, in which case the caller pays for one inline drain-and-deliver
// pass instead of losing the event. Delivery failures never surface here;
// the worker logs them and counts drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::transport::{AuditTransport, HttpTransport};
use crate::worker::{DeliveryStats, DeliveryWorker, RetryPolicy, WorkerHandle};

const OVERFLOW_FLUSH_ATTEMPTS: usize = 3;

/// Buffered, non-blocking audit event capture with background delivery.
pub struct AuditClient {
    worker: Arc<DeliveryWorker>,
    handle: Mutex<Option<WorkerHandle>>,
    closed: AtomicBool,
    close_timeout: Duration,
}

impl AuditClient {
    /// Start a client that POSTs events to `config.events_endpoint()`.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        tracing::info!(endpoint = %transport.endpoint(), "audit client started");
        Self::with_transport(config, Box::new(transport))
    }

    /// Start a client delivering through an arbitrary transport.
    pub fn with_transport(
        config: AuditConfig,
        transport: Box<dyn AuditTransport>,
    ) -> Result<Self, AuditError> {
        config.validate()?;
        let worker = Arc::new(DeliveryWorker::new(
            config.buffer_size,
            transport,
            RetryPolicy::from_config(&config),
        ));
        let handle = DeliveryWorker::spawn(&worker, config.flush_interval())
            .map_err(AuditError::SpawnFailed)?;
        Ok(Self {
            worker,
            handle: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
            close_timeout: config.close_timeout(),
        })
    }

    /// Queue an event for delivery. Never fails and never blocks on the
    /// network unless the buffer is full.
    pub fn capture(&self, event: AuditEvent) {
        if self.is_closed() {
            tracing::error!(
                event_id = %event.event_id,
                "audit event captured after close; discarding"
            );
            return;
        }

        let mut event = match self.worker.buffer().try_push(event) {
            Ok(()) => return,
            Err(event) => event,
        };

        tracing::warn!(
            capacity = self.worker.buffer().capacity(),
            "audit buffer full, flushing inline"
        );
        // Other producers may refill the buffer between our flush and push.
        for _ in 0..OVERFLOW_FLUSH_ATTEMPTS {
            self.worker.flush();
            event = match self.worker.buffer().try_push(event) {
                Ok(()) => return,
                Err(event) => event,
            };
        }
        self.worker
            .record_drop(&event, "buffer still full after inline flush");
    }

    /// Deliver everything buffered right now, on this thread. Returns the
    /// number of events drained (delivered or dropped).
    pub fn flush(&self) -> usize {
        self.worker.flush()
    }

    /// Stop the background worker after a final flush. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.worker.shutdown().trigger();
        let remaining = self.worker.flush();
        tracing::debug!(remaining, "final audit flush complete");

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if !handle.join_timeout(self.close_timeout) {
                tracing::warn!(
                    "audit delivery worker did not stop within {:?}",
                    self.close_timeout
                );
            }
        }

        let stats = self.stats();
        tracing::info!(
            delivered = stats.delivered,
            dropped = stats.dropped,
            "audit client closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> DeliveryStats {
        self.worker.stats()
    }

    /// Events currently waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.worker.buffer().len()
    }
}

impl Drop for AuditClient {
    fn drop(&mut self) {
        self.close();
    }
}
