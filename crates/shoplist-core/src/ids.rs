//! Item id generation
//!
//! Ids are never computed as `max(id) + 1` over a table read: two concurrent
//! appenders reading the same snapshot would hand out the same id. Instead
//! ids come from a monotonic source that needs no read at all.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::ItemId;

/// Source of fresh, strictly increasing item ids
pub trait IdGenerator: Send + Sync {
    /// Issue the next id
    fn next_id(&self) -> ItemId;
}

/// Millisecond wall-clock ids, strictly increasing within this process.
///
/// Each id is `max(now_ms, previous + 1)`, so a burst of appends inside one
/// millisecond (or a clock stepping backwards) still yields distinct,
/// increasing ids. Two processes writing the same ledger can still collide
/// within one millisecond; run a single writer process per ledger.
#[derive(Debug, Default)]
pub struct ClockIdGenerator {
    last: AtomicI64,
}

impl ClockIdGenerator {
    /// Create a generator with no history
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Issue an id given the current time in milliseconds
    fn next_at(&self, now_ms: i64) -> ItemId {
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now_ms.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return ItemId::new(candidate),
                Err(observed) => current = observed,
            }
        }
    }
}

impl IdGenerator for ClockIdGenerator {
    fn next_id(&self) -> ItemId {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }
}
