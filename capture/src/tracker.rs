use std::time::Duration;

use tokio::time::Instant;

/// Source of monotonic time for the tracker.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Tokio's monotonic clock. Wall-clock jumps (NTP, DST) cannot stall or
/// trigger captures, and paused test runtimes drive it deterministically.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Accumulates time since the last successful capture.
///
/// `update` is meant to be called once per poll tick; `reset` exactly once per
/// stored shot. The accumulated delta only grows between resets.
#[derive(Debug)]
pub struct ElapsedTracker<C: Clock = MonotonicClock> {
    clock: C,
    previous_tick: Instant,
    accumulated: Duration,
}

impl<C: Clock> ElapsedTracker<C> {
    pub fn new(clock: C) -> Self {
        let previous_tick = clock.now();
        Self {
            clock,
            previous_tick,
            accumulated: Duration::ZERO,
        }
    }

    pub fn update(&mut self) {
        let now = self.clock.now();
        self.accumulated += now.saturating_duration_since(self.previous_tick);
        self.previous_tick = now;
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
    }

    /// True once strictly more than `interval` has accumulated.
    pub fn due(&self, interval: Duration) -> bool {
        self.accumulated > interval
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated
    }

    pub fn remaining(&self, interval: Duration) -> Duration {
        interval.saturating_sub(self.accumulated)
    }
}
