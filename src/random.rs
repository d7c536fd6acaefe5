//! Lazily seeded pseudo-random integers.
//!
//! Not cryptographically secure. The default seed is the wall-clock time in
//! whole seconds, so two processes started within the same second produce the
//! same sequence. Good enough for jitter and request identifiers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::debug;

/// Supplies the seed for a [`RandomSource`]
pub trait Seeder: Send + Sync {
    fn seed(&self) -> u64;
}

/// Seeds from the current wall-clock time in seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClockSeeder;

impl Seeder for WallClockSeeder {
    fn seed(&self) -> u64 {
        chrono::Utc::now().timestamp() as u64
    }
}

/// Always returns the same seed
#[derive(Debug, Clone, Copy)]
pub struct FixedSeeder(pub u64);

impl Seeder for FixedSeeder {
    fn seed(&self) -> u64 {
        self.0
    }
}

/// Generator seeded exactly once, on the first draw
pub struct RandomSource {
    seeder: Arc<dyn Seeder>,
    rng: OnceLock<Mutex<StdRng>>,
}

impl RandomSource {
    pub fn new() -> Self {
        Self::with_seeder(Arc::new(WallClockSeeder))
    }

    pub fn with_seeder(seeder: Arc<dyn Seeder>) -> Self {
        Self {
            seeder,
            rng: OnceLock::new(),
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.rng.get().is_some()
    }

    /// Next value in `0..=i32::MAX`
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> i32 {
        let rng = self.rng.get_or_init(|| {
            let seed = self.seeder.seed();
            debug!(seed, "Seeding random source");
            Mutex::new(StdRng::seed_from_u64(seed))
        });

        rng.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..=i32::MAX)
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}
