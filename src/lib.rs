//! rcp_utils - shared utility layer for RED RCP camera clients
//!
//! Named locks for the connection and discovery tables, a lazily started
//! millisecond clock, a lazily seeded random source and pass-through
//! allocation. The debayer/decoder SDK these clients drive is not part of
//! this crate.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod mutex;
pub mod organ;
pub mod random;
pub mod server;

pub use clock::{ClockMode, TimeSource};
pub use config::UtilsConfig;
pub use error::{RcpError, Result};
pub use memory::{allocate, release, RcpBuffer};
pub use metrics::{Metrics, MetricsSnapshot};
pub use mutex::{MutexId, MutexRegistry, NamedLockGuard};
pub use organ::{Organ, OrganCard, Response, Stimulus, UtilsOrgan};
pub use random::{FixedSeeder, RandomSource, Seeder, WallClockSeeder};
