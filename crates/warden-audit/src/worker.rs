// worker.rs — Background delivery of buffered events.
//
// Event lifecycle: Buffered → Delivering → Delivered | Dropped.
//
// A single background thread wakes every flush interval, drains the whole
// buffer, and delivers each event in order with bounded retries. Manual
// flushes and overflow flushes run the same drain-and-deliver routine on the
// caller's thread. All of them serialize on one lock, so a tick and a manual
// flush never overlap and an event is never delivered twice.
//
// An event that exhausts its retries is logged and discarded. It is not
// requeued, and a later flush will not see it again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::buffer::EventBuffer;
use crate::config::AuditConfig;
use crate::event::AuditEvent;
use crate::transport::AuditTransport;

/// How many times to try an event and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per event (at least one is always made).
    pub max_retries: u32,
    /// Wait after the first failure; doubles after each subsequent one.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.retry_backoff(),
        }
    }

    /// Backoff after the failed attempt with 0-based index `attempt`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Counters describing what the pipeline has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Events accepted by the transport.
    pub delivered: u64,
    /// Events discarded after exhausting retries (or lost to overflow).
    pub dropped: u64,
    /// Individual failed send attempts.
    pub failed_attempts: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed_attempts: AtomicU64,
}

/// Stop flag that sleeping threads can wait on.
#[derive(Debug, Default)]
pub(crate) struct Shutdown {
    stopped: Mutex<bool>,
    signal: Condvar,
}

impl Shutdown {
    pub(crate) fn trigger(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.signal.notify_all();
    }

    pub(crate) fn is_triggered(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`, returning early (with `true`) on shutdown.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = self
            .signal
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// Owns the buffer and transport and performs delivery.
pub struct DeliveryWorker {
    buffer: EventBuffer,
    transport: Box<dyn AuditTransport>,
    retry: RetryPolicy,
    drain_lock: Mutex<()>,
    shutdown: Shutdown,
    counters: Counters,
}

impl DeliveryWorker {
    pub fn new(capacity: usize, transport: Box<dyn AuditTransport>, retry: RetryPolicy) -> Self {
        Self {
            buffer: EventBuffer::new(capacity),
            transport,
            retry,
            drain_lock: Mutex::new(()),
            shutdown: Shutdown::default(),
            counters: Counters::default(),
        }
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub(crate) fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Drain the buffer and deliver every drained event. Returns how many were drained.
    pub fn flush(&self) -> usize {
        let _drain = self.drain_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let batch = self.buffer.drain();
        if batch.is_empty() {
            return 0;
        }
        tracing::debug!(count = batch.len(), "flushing audit events");
        for event in &batch {
            self.deliver(event);
        }
        batch.len()
    }

    /// Deliver one event with retries. Returns whether it was delivered.
    fn deliver(&self, event: &AuditEvent) -> bool {
        let attempts = self.retry.max_retries.max(1);
        for attempt in 0..attempts {
            match self.transport.send(event) {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(event_id = %event.event_id, "audit event delivered");
                    return true;
                }
                Err(e) => {
                    self.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        event_id = %event.event_id,
                        "failed to send audit event (attempt {}/{}): {}",
                        attempt + 1,
                        attempts,
                        e
                    );
                    if attempt + 1 < attempts {
                        // Returns immediately once shutdown has been requested.
                        self.shutdown.wait(self.retry.backoff_for(attempt));
                    }
                }
            }
        }
        self.record_drop(event, &format!("gave up after {} attempt(s)", attempts));
        false
    }

    pub(crate) fn record_drop(&self, event: &AuditEvent, reason: &str) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            event_id = %event.event_id,
            trace_id = %event.trace_id,
            action_type = %event.action_type,
            "dropping audit event: {}",
            reason
        );
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed_attempts: self.counters.failed_attempts.load(Ordering::Relaxed),
        }
    }

    /// Start the periodic flush thread.
    pub fn spawn(worker: &Arc<Self>, interval: Duration) -> std::io::Result<WorkerHandle> {
        let worker = Arc::clone(worker);
        let (done_tx, done_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("warden-audit-delivery".to_string())
            .spawn(move || {
                tracing::debug!("audit delivery worker started");
                while !worker.shutdown.wait(interval) {
                    worker.flush();
                }
                tracing::debug!("audit delivery worker stopped");
                let _ = done_tx.send(());
            })?;
        Ok(WorkerHandle {
            thread,
            done: done_rx,
        })
    }
}

/// Handle to the running flush thread.
pub struct WorkerHandle {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

impl WorkerHandle {
    /// Wait up to `timeout` for the thread to finish. Returns false on timeout,
    /// in which case the thread is left to exit on its own.
    pub fn join_timeout(self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    tracing::error!("audit delivery worker panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}
