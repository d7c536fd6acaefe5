//! Metrics and observability for rcp_utils

use crate::mutex::MutexId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use serde::{Deserialize, Serialize};

/// Shared counters for the utility layer
#[derive(Default)]
pub struct Metrics {
    // Named locks
    pub connection_locks: AtomicU64,
    pub discovery_locks: AtomicU64,
    pub contended_locks: AtomicU64,
    pub lock_wait_ms: AtomicU64,
    pub ignored_mutex_ids: AtomicU64,

    // Clock / generator / allocator
    pub timestamp_queries: AtomicU64,
    pub random_draws: AtomicU64,
    pub allocations: AtomicU64,
    pub allocation_failures: AtomicU64,

    // Organ requests
    pub total_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record one acquisition of a named lock.
    ///
    /// `waited_ms` is only accumulated when the acquisition had to block.
    pub fn record_lock(&self, id: MutexId, contended: bool, waited_ms: u64) {
        match id {
            MutexId::Connection => self.connection_locks.fetch_add(1, Ordering::Relaxed),
            MutexId::Discovery => self.discovery_locks.fetch_add(1, Ordering::Relaxed),
        };

        if contended {
            self.contended_locks.fetch_add(1, Ordering::Relaxed);
            self.lock_wait_ms.fetch_add(waited_ms, Ordering::Relaxed);
        }
    }

    pub fn record_ignored_id(&self) {
        self.ignored_mutex_ids.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timestamp(&self) {
        self.timestamp_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_random(&self, draws: u64) {
        self.random_draws.fetch_add(draws, Ordering::Relaxed);
    }

    pub fn record_allocation(&self, success: bool) {
        if success {
            self.allocations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.allocation_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_request(&self, success: bool, latency_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            locks: LockMetrics {
                connection: self.connection_locks.load(Ordering::Relaxed),
                discovery: self.discovery_locks.load(Ordering::Relaxed),
                contended: self.contended_locks.load(Ordering::Relaxed),
                wait_ms: self.lock_wait_ms.load(Ordering::Relaxed),
                ignored_ids: self.ignored_mutex_ids.load(Ordering::Relaxed),
            },
            timestamp_queries: self.timestamp_queries.load(Ordering::Relaxed),
            random_draws: self.random_draws.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            total_requests: total,
            failed_requests: failed,
            error_rate: if total > 0 { failed as f64 / total as f64 } else { 0.0 },
            avg_latency_ms: if total > 0 { total_latency / total } else { 0 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub locks: LockMetrics,
    pub timestamp_queries: u64,
    pub random_draws: u64,
    pub allocations: u64,
    pub allocation_failures: u64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub avg_latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetrics {
    pub connection: u64,
    pub discovery: u64,
    pub contended: u64,
    pub wait_ms: u64,
    pub ignored_ids: u64,
}

/// Timer for tracking operation latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
