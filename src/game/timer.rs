//! Tick Timers
//!
//! Deferred expiry measured in simulation ticks, never wall-clock time.
//! A timer is just a target tick, so it is `Copy`, replicates by value and
//! gives the same answer no matter how often a tick is re-run.
//!
//! ```text
//!   start(T, D)          target = T + max(D, 1)
//!   ──┬──────────────────────┬──────────────►  tick
//!     T   running ...        target   expired
//! ```

use serde::{Serialize, Deserialize};

use crate::core::fixed::{Fixed, ticks_from_seconds};

/// Simulation step id.
pub type Tick = u32;

/// A deferred transition expressed as a target tick.
///
/// The default value is "not running" and stays that way until started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickTimer {
    target_tick: Option<Tick>,
}

impl TickTimer {
    /// A timer that was never started.
    pub const NONE: Self = Self { target_tick: None };

    /// Start a timer at `current` that expires `duration` ticks later.
    ///
    /// A zero duration expires on the next tick, never on the creation tick.
    #[inline]
    pub fn start(current: Tick, duration: u32) -> Self {
        Self {
            target_tick: Some(current.saturating_add(duration.max(1))),
        }
    }

    /// Start a timer from a duration in seconds (rounded up to whole ticks).
    #[inline]
    pub fn from_seconds(current: Tick, seconds: Fixed, tick_rate: u32) -> Self {
        Self::start(current, ticks_from_seconds(seconds, tick_rate))
    }

    /// Tick at which the timer expires, if started.
    #[inline]
    pub fn target_tick(&self) -> Option<Tick> {
        self.target_tick
    }

    /// Started and not yet expired.
    #[inline]
    pub fn is_running(&self, current: Tick) -> bool {
        matches!(self.target_tick, Some(target) if current < target)
    }

    /// Started and reached its target.
    #[inline]
    pub fn is_expired(&self, current: Tick) -> bool {
        matches!(self.target_tick, Some(target) if current >= target)
    }

    /// True for a never-started timer as well as an expired one.
    #[inline]
    pub fn expired_or_not_running(&self, current: Tick) -> bool {
        !self.is_running(current)
    }

    /// Ticks left before expiry; `None` when not started.
    #[inline]
    pub fn remaining_ticks(&self, current: Tick) -> Option<u32> {
        self.target_tick.map(|target| target.saturating_sub(current))
    }

    /// Cancel the timer.
    #[inline]
    pub fn reset(&mut self) {
        self.target_tick = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================
