//! Fixed-window request rate limiting keyed by (service, client).
//!
//! This is the gateway's principal shared mutable state: one counter per
//! `(service name, client identity)` pair, shared by every concurrent request
//! for that pair. The increment-and-compare runs under scc's per-bucket
//! exclusive entry guard, so two racing requests can never both observe the
//! same resulting count.
//!
//! The client identity is the request's observed remote address. Behind an
//! intermediary proxy every caller collapses into one key; that matches the
//! source system's behavior and is a documented limitation, not something
//! this layer tries to paper over with forwarded headers.
use std::time::Duration;

use scc::HashMap;
use tokio::time::Instant;

/// One window's counter. The deadline is fixed at creation and never
/// extended by subsequent increments.
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u64,
    deadline: Instant,
}

/// Outcome of a single increment-and-compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The counter value this request observed after its own increment.
    pub count: u64,
    /// The configured ceiling.
    pub limit: u64,
}

/// Fixed-window limiter over a concurrent map.
pub struct FixedWindowLimiter {
    entries: HashMap<String, WindowEntry>,
    limit: u64,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            limit,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Atomically increment the counter for `(service, client)` and compare
    /// it against the ceiling.
    ///
    /// A request arriving over the ceiling is rejected but its increment
    /// stands — it still consumes a slot in the exhausted window. A counter
    /// whose window has elapsed restarts at 1 with a fresh deadline.
    pub async fn check(&self, service: &str, client: &str) -> RateDecision {
        let key = format!("{service}:{client}");
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry_async(key)
            .await
            .or_insert_with(|| WindowEntry {
                count: 0,
                deadline: now + self.window,
            });
        let window = entry.get_mut();

        if now >= window.deadline {
            window.count = 1;
            window.deadline = now + self.window;
        } else {
            window.count += 1;
        }

        let count = window.count;
        RateDecision {
            allowed: count <= self.limit,
            count,
            limit: self.limit,
        }
    }

    /// Drop entries whose window has elapsed. Expired entries are already
    /// reset lazily on access; this sweep bounds the map's size for keys
    /// that never return.
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        self.entries
            .retain_async(|_, entry| entry.deadline > now)
            .await;
    }

    /// Number of live (not yet swept) counters, for diagnostics.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}
