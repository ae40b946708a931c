//! Wall-clock source for session expiry.
//!
//! Expiry instants are absolute wall-clock times because they outlive the
//! process (they're persisted). Timers, on the other hand, run on Tokio's
//! monotonic clock. [`Clock`] is the seam between the two.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Supplies "now" as a wall-clock instant.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A wall clock that advances with Tokio's clock.
///
/// Captures the system time once, then adds however much Tokio time has
/// passed since. Under `tokio::time::pause()` this clock freezes and
/// jumps with `tokio::time::advance`, which keeps wall-clock expiry and
/// timer deadlines in lockstep in tests.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin_wall: DateTime<Utc>,
    origin: Instant,
}

impl TokioClock {
    /// Anchors the clock at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Anchors the clock at a fixed wall-clock instant.
    pub fn starting_at(origin_wall: DateTime<Utc>) -> Self {
        Self {
            origin_wall,
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        // An elapsed span too large for chrono would be centuries of uptime.
        match chrono::TimeDelta::from_std(elapsed) {
            Ok(delta) => self.origin_wall + delta,
            Err(_) => DateTime::<Utc>::MAX_UTC,
        }
    }
}
