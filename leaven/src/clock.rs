//! Tick sources for the engine.
//!
//! The UI loop polls a [`TickSource`] every pass and feeds the due ticks to
//! the engine while it is running. Whenever the engine is not running the
//! loop re-arms the source, so paused or idle time is never counted.

use serde::Deserialize;
use std::time::{Duration, Instant};

/// What to do with seconds that passed while the loop was not polling
/// (suspended laptop, stalled terminal).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// At most one tick per poll; missed seconds are dropped.
    #[default]
    Discrete,
    /// Every whole second of monotonic time since the last tick is delivered.
    CatchUp,
}

pub trait TickSource {
    /// Number of ticks due since the previous call.
    fn due_ticks(&mut self) -> u32;

    /// Forget any partial period and start counting from now.
    fn rearm(&mut self);
}

/// Monotonic 1 Hz clock.
#[derive(Debug)]
pub struct IntervalClock {
    period: Duration,
    anchor: Instant,
    policy: TickPolicy,
}

impl IntervalClock {
    pub fn new(policy: TickPolicy) -> Self {
        Self::with_period(Duration::from_secs(1), policy)
    }

    pub fn with_period(period: Duration, policy: TickPolicy) -> Self {
        Self {
            period,
            anchor: Instant::now(),
            policy,
        }
    }

    pub fn policy(&self) -> TickPolicy {
        self.policy
    }

    /// Time left until the next tick falls due, for sizing the event poll.
    pub fn until_next(&self, now: Instant) -> Duration {
        (self.anchor + self.period).saturating_duration_since(now)
    }

    pub fn due_ticks_at(&mut self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.anchor);
        let whole = (elapsed.as_nanos() / self.period.as_nanos().max(1)) as u32;
        if whole == 0 {
            return 0;
        }
        match self.policy {
            TickPolicy::CatchUp => {
                self.anchor += self.period * whole;
                whole
            }
            TickPolicy::Discrete => {
                if whole == 1 {
                    self.anchor += self.period;
                } else {
                    tracing::debug!(dropped = whole - 1, "clock stalled, dropping missed ticks");
                    self.anchor = now;
                }
                1
            }
        }
    }

    pub fn rearm_at(&mut self, now: Instant) {
        self.anchor = now;
    }
}

impl TickSource for IntervalClock {
    fn due_ticks(&mut self) -> u32 {
        self.due_ticks_at(Instant::now())
    }

    fn rearm(&mut self) {
        self.rearm_at(Instant::now());
    }
}

/// Hand-cranked source for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
    pending: u32,
}

#[cfg(test)]
impl ManualClock {
    pub fn advance(&mut self, ticks: u32) {
        self.pending += ticks;
    }
}

#[cfg(test)]
impl TickSource for ManualClock {
    fn due_ticks(&mut self) -> u32 {
        std::mem::take(&mut self.pending)
    }

    fn rearm(&mut self) {
        self.pending = 0;
    }
}
