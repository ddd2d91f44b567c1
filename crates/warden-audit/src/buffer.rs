// buffer.rs — Bounded in-memory event queue.
//
// Producers push; the delivery path drains everything in one step under the
// same lock, so an event pushed concurrently with a drain lands either in
// that batch or the next one, never both and never neither.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::event::AuditEvent;

/// A bounded, thread-safe FIFO of events awaiting delivery.
#[derive(Debug)]
pub struct EventBuffer {
    queue: Mutex<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueue an event, handing it back if the buffer is full.
    pub fn try_push(&self, event: AuditEvent) -> Result<(), AuditEvent> {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            return Err(event);
        }
        queue.push_back(event);
        Ok(())
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&self) -> Vec<AuditEvent> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock().len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEvent>> {
        // A panicking producer must not take auditing down with it.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ActionKind, Actor, EventStatus};

    fn event(resource: &str) -> AuditEvent {
        AuditEvent::new(
            "agent",
            "trace",
            Actor::Agent,
            ActionKind::ToolCall,
            resource,
            EventStatus::Success,
        )
    }

    #[test]
    fn push_until_full_then_reject() {
        let buffer = EventBuffer::new(2);
        assert!(buffer.try_push(event("a")).is_ok());
        assert!(buffer.try_push(event("b")).is_ok());
        assert!(buffer.is_full());

        let rejected = buffer.try_push(event("c")).unwrap_err();
        assert_eq!(rejected.resource, "c");
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn drain_empties_in_fifo_order() {
        let buffer = EventBuffer::new(10);
        for name in ["a", "b", "c"] {
            buffer.try_push(event(name)).unwrap();
        }
        let drained: Vec<String> = buffer.drain().into_iter().map(|e| e.resource).collect();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let buffer = EventBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.try_push(event("a")).is_ok());
        assert!(buffer.try_push(event("b")).is_err());
    }
}
