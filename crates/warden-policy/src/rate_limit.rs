// rate_limit.rs — Rate-limit counter storage.
//
// Counters are keyed by the literal action type that was allowed, not by the
// limit's pattern: two action types matched by one wildcard limit each get
// their own budget. Counters only grow until an explicit reset.
//
// The store sits behind a trait so an external counter service can replace
// the in-memory map without changing `PolicyEnforcer::check()`.

use std::collections::HashMap;

/// Storage for per-action-type usage counters.
///
/// The enforcer serializes all access behind its own lock, so
/// implementations never see concurrent calls.
pub trait RateLimitStore: Send {
    /// Current count for an action type (0 if never recorded).
    fn count(&self, action_type: &str) -> u64;

    /// Record one allowed use of an action type.
    fn record(&mut self, action_type: &str);

    /// Clear every counter.
    fn reset(&mut self);
}

/// Process-local counters. Lost on restart, not shared across processes.
#[derive(Debug, Default)]
pub struct InMemoryRateLimits {
    counts: HashMap<String, u64>,
}

impl InMemoryRateLimits {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimits {
    fn count(&self, action_type: &str) -> u64 {
        self.counts.get(action_type).copied().unwrap_or(0)
    }

    fn record(&mut self, action_type: &str) {
        *self.counts.entry(action_type.to_string()).or_insert(0) += 1;
    }

    fn reset(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_start_at_zero_and_grow() {
        let mut store = InMemoryRateLimits::new();
        assert_eq!(store.count("s3:PutObject"), 0);
        store.record("s3:PutObject");
        store.record("s3:PutObject");
        store.record("s3:GetObject");
        assert_eq!(store.count("s3:PutObject"), 2);
        assert_eq!(store.count("s3:GetObject"), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = InMemoryRateLimits::new();
        store.record("a");
        store.record("b");
        store.reset();
        assert_eq!(store.count("a"), 0);
        assert_eq!(store.count("b"), 0);
    }
}
