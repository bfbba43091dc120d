// Path: crates/plan/src/lamport.rs

//! Process-wide logical clock.
//!
//! Constructed once at startup and passed by handle; there is no global
//! instance. `observe` applies the classic Lamport receive rule:
//! `counter = max(counter, peer) + 1`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LamportClock {
    counter: AtomicU64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a known counter value (fast-sync, restart).
    pub fn starting_at(value: u64) -> Self {
        Self {
            counter: AtomicU64::new(value),
        }
    }

    /// Advance for a local event; returns the new value (always > 0).
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Merge a peer's value on receive: `max(local, peer) + 1`.
    pub fn observe(&self, peer: u64) -> u64 {
        loop {
            let current = self.counter.load(Ordering::SeqCst);
            let next = current.max(peer) + 1;
            if self
                .counter
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return next;
            }
        }
    }

    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}
