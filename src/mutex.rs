//! Named Mutex Registry
//!
//! Coarse-grained mutual exclusion for the two pieces of RCP client state that
//! live outside this crate: the camera connection table and the device
//! discovery table.
//!
//! ## Contract
//!
//! - `lock` blocks until the named lock is acquired. No timeout, no
//!   cancellation, no FIFO guarantee.
//! - `unlock` releases it. The registry does not track which thread holds a
//!   lock; unlocking a lock you do not hold is a caller bug that is neither
//!   detected nor reported.
//! - Raw identifiers outside the known set are ignored by `lock_raw` and
//!   `unlock_raw`.
//!
//! The registry is an ordinary value. Share it with `Arc` between the
//! components that need it; `crate::api` keeps one process-wide instance for
//! the procedural entry points.
//!
//! ## Example
//!
//! ```rust
//! use rcp_utils::{MutexId, MutexRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(MutexRegistry::new());
//!
//! registry.lock(MutexId::Connection);
//! // ... touch the connection table ...
//! registry.unlock(MutexId::Connection);
//!
//! {
//!     let _guard = registry.guard(MutexId::Discovery);
//!     // ... touch the discovery table ...
//! }
//! assert!(!registry.is_locked(MutexId::Discovery));
//! ```

use crate::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::trace;

/// Raw identifier of the connection lock
pub const MUTEX_CONNECTION: i32 = 0;
/// Raw identifier of the discovery lock
pub const MUTEX_DISCOVERY: i32 = 1;

/// Identifier of a named lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutexId {
    /// Guards the camera connection table
    Connection,
    /// Guards the device discovery table
    Discovery,
}

impl MutexId {
    pub const ALL: [MutexId; 2] = [MutexId::Connection, MutexId::Discovery];

    /// Map a raw identifier onto a known lock, `None` for anything else.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            MUTEX_CONNECTION => Some(MutexId::Connection),
            MUTEX_DISCOVERY => Some(MutexId::Discovery),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            MutexId::Connection => MUTEX_CONNECTION,
            MutexId::Discovery => MUTEX_DISCOVERY,
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "connection" => Some(MutexId::Connection),
            "discovery" => Some(MutexId::Discovery),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MutexId::Connection => "connection",
            MutexId::Discovery => "discovery",
        }
    }
}

impl fmt::Display for MutexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exclusive lock that can be released from a different call than the one
/// that acquired it.
struct NamedLock {
    locked: Mutex<bool>,
    released: Condvar,
}

impl NamedLock {
    fn new() -> Self {
        Self {
            locked: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    // The inner critical sections never panic, so a poisoned flag is still valid.
    fn state(&self) -> MutexGuard<'_, bool> {
        self.locked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until acquired. Returns whether the call had to wait.
    fn acquire(&self) -> bool {
        let mut locked = self.state();
        let contended = *locked;
        while *locked {
            locked = self
                .released
                .wait(locked)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *locked = true;
        contended
    }

    fn try_acquire(&self) -> bool {
        let mut locked = self.state();
        if *locked {
            false
        } else {
            *locked = true;
            true
        }
    }

    fn release(&self) {
        *self.state() = false;
        self.released.notify_one();
    }

    fn is_held(&self) -> bool {
        *self.state()
    }
}

/// Fixed registry holding exactly one lock per [`MutexId`]
pub struct MutexRegistry {
    connection: NamedLock,
    discovery: NamedLock,
    metrics: Option<Arc<Metrics>>,
}

impl MutexRegistry {
    pub fn new() -> Self {
        Self {
            connection: NamedLock::new(),
            discovery: NamedLock::new(),
            metrics: None,
        }
    }

    /// Registry that reports acquisitions and ignored identifiers to `metrics`
    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new()
        }
    }

    fn named(&self, id: MutexId) -> &NamedLock {
        match id {
            MutexId::Connection => &self.connection,
            MutexId::Discovery => &self.discovery,
        }
    }

    /// Block the calling thread until the lock for `id` is acquired.
    pub fn lock(&self, id: MutexId) {
        let start = Instant::now();
        let contended = self.named(id).acquire();

        if let Some(metrics) = &self.metrics {
            metrics.record_lock(id, contended, start.elapsed().as_millis() as u64);
        }
        trace!(mutex = %id, contended, "locked");
    }

    /// Release the lock for `id`.
    pub fn unlock(&self, id: MutexId) {
        self.named(id).release();
        trace!(mutex = %id, "unlocked");
    }

    /// Acquire the lock for `id` if it is free, without blocking.
    pub fn try_lock(&self, id: MutexId) -> bool {
        let acquired = self.named(id).try_acquire();
        if acquired {
            if let Some(metrics) = &self.metrics {
                metrics.record_lock(id, false, 0);
            }
        }
        acquired
    }

    /// Whether the lock for `id` is currently held by anyone
    pub fn is_locked(&self, id: MutexId) -> bool {
        self.named(id).is_held()
    }

    /// Lock by raw identifier. Unknown identifiers return immediately.
    pub fn lock_raw(&self, raw: i32) {
        match MutexId::from_raw(raw) {
            Some(id) => self.lock(id),
            None => self.ignore(raw),
        }
    }

    /// Unlock by raw identifier. Unknown identifiers return immediately.
    pub fn unlock_raw(&self, raw: i32) {
        match MutexId::from_raw(raw) {
            Some(id) => self.unlock(id),
            None => self.ignore(raw),
        }
    }

    fn ignore(&self, raw: i32) {
        if let Some(metrics) = &self.metrics {
            metrics.record_ignored_id();
        }
        trace!(raw, "ignoring unknown mutex id");
    }

    /// Acquire the lock for `id` and release it when the guard drops.
    pub fn guard(&self, id: MutexId) -> NamedLockGuard<'_> {
        self.lock(id);
        NamedLockGuard { registry: self, id }
    }
}

impl Default for MutexRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a named lock until dropped
pub struct NamedLockGuard<'a> {
    registry: &'a MutexRegistry,
    id: MutexId,
}

impl NamedLockGuard<'_> {
    pub fn id(&self) -> MutexId {
        self.id
    }
}

impl Drop for NamedLockGuard<'_> {
    fn drop(&mut self) {
        self.registry.unlock(self.id);
    }
}
