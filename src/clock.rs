//! Monotonic millisecond timestamps relative to a lazily captured epoch.
//!
//! The epoch is taken on the first call to [`TimeSource::elapsed_millis`].
//! In [`ClockMode::Frozen`] the "now" reference is captured once as well,
//! immediately after the epoch, and never refreshed: every call returns the
//! same value. That is the behavior RCP clients have always observed from
//! `rcp_timestamp`, so it stays the process-wide default. [`ClockMode::Live`]
//! reads the clock on every call and is what timeout logic should use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use crate::error::RcpError;

/// How the "now" reference point is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// "now" captured once on first use
    #[default]
    Frozen,
    /// "now" read on every call
    Live,
}

impl ClockMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ClockMode::Frozen => "frozen",
            ClockMode::Live => "live",
        }
    }
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClockMode {
    type Err = RcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frozen" => Ok(ClockMode::Frozen),
            "live" => Ok(ClockMode::Live),
            other => Err(RcpError::InvalidInput(format!("Unknown clock mode: {}", other))),
        }
    }
}

/// Elapsed-time source with a once-only epoch
#[derive(Debug)]
pub struct TimeSource {
    mode: ClockMode,
    epoch: OnceLock<Instant>,
    frozen_now: OnceLock<Instant>,
}

impl TimeSource {
    pub const fn new(mode: ClockMode) -> Self {
        Self {
            mode,
            epoch: OnceLock::new(),
            frozen_now: OnceLock::new(),
        }
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Whether the epoch has been captured yet
    pub fn is_started(&self) -> bool {
        self.epoch.get().is_some()
    }

    /// Milliseconds between the epoch and "now", wrapping at `u32::MAX`.
    pub fn elapsed_millis(&self) -> u32 {
        let epoch = *self.epoch.get_or_init(Instant::now);
        let now = match self.mode {
            ClockMode::Frozen => *self.frozen_now.get_or_init(Instant::now),
            ClockMode::Live => Instant::now(),
        };

        // Truncating cast is the modulo-2^32 wrap.
        now.saturating_duration_since(epoch).as_millis() as u32
    }
}

impl Default for TimeSource {
    fn default() -> Self {
        Self::new(ClockMode::default())
    }
}
