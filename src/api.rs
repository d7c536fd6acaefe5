//! Process-wide procedural entry points.
//!
//! Thin wrappers over lazily created global instances, for callers that cannot
//! thread an explicit [`MutexRegistry`], [`TimeSource`] or [`RandomSource`]
//! through. The global clock runs in [`ClockMode::Frozen`].

use crate::clock::{ClockMode, TimeSource};
use crate::memory::{self, RcpBuffer};
use crate::metrics::Metrics;
use crate::mutex::{MutexId, MutexRegistry};
use crate::random::RandomSource;
use std::sync::{Arc, OnceLock};

static METRICS: OnceLock<Arc<Metrics>> = OnceLock::new();
static REGISTRY: OnceLock<Arc<MutexRegistry>> = OnceLock::new();
static RANDOM: OnceLock<RandomSource> = OnceLock::new();
static CLOCK: TimeSource = TimeSource::new(ClockMode::Frozen);

/// Counters shared by every global entry point
pub fn metrics() -> Arc<Metrics> {
    Arc::clone(METRICS.get_or_init(Metrics::new))
}

pub fn registry() -> Arc<MutexRegistry> {
    Arc::clone(REGISTRY.get_or_init(|| Arc::new(MutexRegistry::with_metrics(metrics()))))
}

pub fn clock() -> &'static TimeSource {
    &CLOCK
}

pub fn random() -> &'static RandomSource {
    RANDOM.get_or_init(RandomSource::new)
}

pub fn allocate(bytes: usize) -> Option<RcpBuffer> {
    let buffer = memory::allocate(bytes);
    metrics().record_allocation(buffer.is_some());
    buffer
}

pub fn release(buffer: RcpBuffer) {
    memory::release(buffer);
}

pub fn lock(id: MutexId) {
    registry().lock(id);
}

pub fn unlock(id: MutexId) {
    registry().unlock(id);
}

/// Lock by raw identifier; unknown identifiers are ignored.
pub fn lock_raw(raw: i32) {
    registry().lock_raw(raw);
}

/// Unlock by raw identifier; unknown identifiers are ignored.
pub fn unlock_raw(raw: i32) {
    registry().unlock_raw(raw);
}

pub fn elapsed_millis() -> u32 {
    metrics().record_timestamp();
    CLOCK.elapsed_millis()
}

pub fn next_random() -> i32 {
    metrics().record_random(1);
    random().next()
}
