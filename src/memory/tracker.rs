use std::sync::atomic::{AtomicI64, Ordering};

/// Approximate byte usage against a soft limit.
/// Callers apply signed deltas; the counter reflects only resident payloads.
pub struct SizeTracker {
    pub usage: AtomicI64,
    pub limit: i64,
}

impl SizeTracker {
    pub fn new(limit: i64) -> Self {
        SizeTracker {
            usage: AtomicI64::new(0),
            limit,
        }
    }

    /// Apply `delta` and report whether usage is now at or over the limit
    pub fn adjust(&self, delta: i64) -> bool {
        if delta == 0 {
            return false;
        }
        let new_usage = self.usage.fetch_add(delta, Ordering::SeqCst) + delta;
        delta > 0 && new_usage >= self.limit
    }

    pub fn release(&self, size: i64) {
        if size > 0 {
            self.usage.fetch_sub(size, Ordering::SeqCst);
        }
    }

    pub fn current_usage(&self) -> i64 {
        self.usage.load(Ordering::Acquire)
    }
}
