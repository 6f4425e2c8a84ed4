use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::time::Instant;

/// Statistics regarding the pool
#[derive(Debug, Default)]
#[must_use]
pub struct PoolMetrics {
    /// The total time leases were held, in microseconds.
    pub total_active: AtomicU64,
    /// The total time callers waited in [`Pool::get()`], in microseconds.
    ///
    /// [`Pool::get()`]: super::Pool::get
    pub total_waiting: AtomicU64,
    /// The number of times a connection request failed
    pub failure_count: AtomicUsize,
    /// The number of connections created by the manager
    pub created: AtomicUsize,
    /// The number of connections destroyed by the pool
    pub destroyed: AtomicUsize,
    /// The number of abandoned leases harvested
    pub harvested: AtomicUsize,
    /// The number of successful normalizations
    pub normalized: AtomicUsize,
    /// The number of connections that failed a liveness probe
    pub probe_failures: AtomicUsize,
}

// 64bit microseconds is 580000 years - really not important
#[allow(clippy::cast_possible_truncation)]
impl PoolMetrics {
    pub(crate) fn record_waiting(&self, start: Instant) {
        let waiting = start.elapsed().as_micros() as u64;
        let _ = self.total_waiting.fetch_add(waiting, Ordering::Relaxed);
    }

    pub(crate) fn record_active(&self, start: Instant) {
        let active = start.elapsed().as_micros() as u64;
        let _ = self.total_active.fetch_add(active, Ordering::Relaxed);
    }
}

impl PoolMetrics {
    pub(crate) fn incr(counter: &AtomicUsize) {
        let _ = counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of microseconds that leases were held
    pub fn microseconds_active(&self) -> u64 {
        self.total_active.load(Ordering::Relaxed)
    }
    /// Get the total number of microseconds that tasks were waiting for a connection
    pub fn microseconds_waiting(&self) -> u64 {
        self.total_waiting.load(Ordering::Relaxed)
    }
    /// Get the total number of failures to retrieve a connection from the pool
    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::Relaxed)
    }
    /// Get the number of connections created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
    /// Get the number of connections destroyed so far
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Relaxed)
    }
    /// Get the number of abandoned leases recovered by harvesting
    pub fn harvested(&self) -> usize {
        self.harvested.load(Ordering::Relaxed)
    }
    /// Get the number of times a connection was normalized for reuse
    pub fn normalized(&self) -> usize {
        self.normalized.load(Ordering::Relaxed)
    }
    /// Get the number of connections that failed a liveness probe
    pub fn probe_failures(&self) -> usize {
        self.probe_failures.load(Ordering::Relaxed)
    }
}
