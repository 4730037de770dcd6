//! # Gate Tick Loop
//!
//! Fixed-interval loop pacing an intersection's scheduling ticks.
//!
//! ## Design
//!
//! The tick loop must:
//! - Tick at a steady interval (1ms by default)
//! - Never drift: deadlines advance by exactly one interval
//! - Skip ahead instead of bursting after a stall

use std::time::{Duration, Instant};

/// Longest accepted tick interval. Longer intervals are clamped.
const MAX_TICK_DURATION: Duration = Duration::from_secs(3600);

/// Fixed-interval tick loop controller.
#[derive(Debug)]
pub struct TickLoop {
    /// Target tick interval.
    tick_duration: Duration,
    /// Deadline of the next tick.
    next_tick: Instant,
    /// Total ticks executed.
    tick_count: u64,
    /// Timing statistics.
    stats: TickStats,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Minimum tick body duration observed (µs).
    pub min_tick_us: u64,
    /// Maximum tick body duration observed (µs).
    pub max_tick_us: u64,
    /// Average tick body duration (rolling, µs).
    pub avg_tick_us: u64,
    /// Deadlines missed by more than one interval.
    pub late_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
}

impl TickStats {
    fn empty() -> Self {
        Self {
            min_tick_us: u64::MAX,
            ..Self::default()
        }
    }
}

impl TickLoop {
    /// Creates a tick loop with the given interval, clamped to one hour.
    #[must_use]
    pub fn new(tick_duration: Duration) -> Self {
        let tick_duration = tick_duration.min(MAX_TICK_DURATION);
        Self {
            tick_duration,
            next_tick: Instant::now() + tick_duration,
            tick_count: 0,
            stats: TickStats::empty(),
        }
    }

    /// Marks the start of a tick.
    ///
    /// Returns the tick start time for duration measurement.
    #[must_use]
    pub fn begin_tick(&mut self) -> Instant {
        self.tick_count += 1;
        Instant::now()
    }

    /// Marks the end of a tick and records its duration.
    pub fn end_tick(&mut self, start: Instant) {
        let duration_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

        self.stats.total_ticks += 1;
        self.stats.min_tick_us = self.stats.min_tick_us.min(duration_us);
        self.stats.max_tick_us = self.stats.max_tick_us.max(duration_us);
        self.stats.avg_tick_us = if self.stats.total_ticks == 1 {
            duration_us
        } else {
            (self.stats.avg_tick_us * 15 + duration_us) / 16
        };
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&mut self) {
        let now = Instant::now();
        if now < self.next_tick {
            std::thread::sleep(self.next_tick - now);
        }

        self.next_tick += self.tick_duration;
        let now = Instant::now();
        if self.next_tick < now {
            // Fell behind by more than one interval: resync.
            self.stats.late_ticks += 1;
            self.next_tick = now + self.tick_duration;
        }
    }

    /// Returns the current tick count.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns tick statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Returns the tick interval.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}
