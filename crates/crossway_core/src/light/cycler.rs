//! # Phase Cycler
//!
//! Background thread that drives one traffic light.
//!
//! ## Loop
//!
//! ```text
//!   ┌──────────────────────────────────────────────┐
//!   │ elapsed > cycle ?                            │
//!   │   yes: lock phase, toggle, send, unlock      │
//!   │        resample cycle in [min, max] ms       │
//!   │        reset elapsed baseline                │
//!   │ sleep(poll_interval)                         │
//!   └──────────────────────────────────────────────┘
//! ```
//!
//! The phase lock is held across toggle and send, so an observer reading
//! [`PhaseCycler::current_phase`] never sees a phase that has not been
//! published yet.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::phase::{is_green, Phase};
use crate::config::PhaseTiming;
use crate::error::{CrosswayError, CrosswayResult};
use crate::sync::PhaseChannel;

/// State shared with the cycling thread.
struct CyclerShared {
    id: usize,
    current: Mutex<Phase>,
    channel: PhaseChannel<Phase>,
    shutdown: AtomicBool,
    transitions: AtomicU64,
}

/// A traffic light cycling red/green on its own thread.
///
/// Created idle in [`Phase::Red`]; call [`PhaseCycler::start`] to begin
/// cycling. Dropping the cycler stops and joins the thread.
pub struct PhaseCycler {
    shared: Arc<CyclerShared>,
    timing: PhaseTiming,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PhaseCycler {
    /// Creates an idle cycler.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::InvalidConfig`] if `timing` is invalid.
    pub fn new(id: usize, timing: PhaseTiming) -> CrosswayResult<Self> {
        timing.validate()?;
        Ok(Self {
            shared: Arc::new(CyclerShared {
                id,
                current: Mutex::new(Phase::Red),
                channel: PhaseChannel::new(),
                shutdown: AtomicBool::new(false),
                transitions: AtomicU64::new(0),
            }),
            timing,
            worker: Mutex::new(None),
        })
    }

    /// Identifier used in logs and thread names.
    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// Timing this cycler was built with.
    #[inline]
    #[must_use]
    pub fn timing(&self) -> &PhaseTiming {
        &self.timing
    }

    /// Spawns the cycling thread. Calling it on a running cycler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::ThreadSpawn`] if the OS refuses the thread.
    pub fn start(&self) -> CrosswayResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let rng = match self.timing.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        self.shared.shutdown.store(false, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let timing = self.timing.clone();

        let handle = thread::Builder::new()
            .name(format!("light-{}", self.shared.id))
            .spawn(move || cycle_through_phases(&shared, &timing, rng))
            .map_err(|e| CrosswayError::ThreadSpawn(e.to_string()))?;

        *worker = Some(handle);
        tracing::info!(light = self.shared.id, "traffic light started");
        Ok(())
    }

    /// Signals the cycling thread to exit and joins it.
    ///
    /// The worker lock is held until the thread has exited, so a concurrent
    /// [`PhaseCycler::start`] always spawns after the old thread is gone.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            self.shared.shutdown.store(true, Ordering::Release);
            if handle.join().is_err() {
                tracing::warn!(light = self.shared.id, "light thread panicked");
            }
            tracing::info!(
                light = self.shared.id,
                transitions = self.transition_count(),
                "traffic light stopped"
            );
        }
    }

    /// Returns true while the cycling thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Latest published phase. Does not wait for a transition.
    #[must_use]
    pub fn current_phase(&self) -> Phase {
        *self.shared.current.lock()
    }

    /// Number of transitions since creation.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.shared.transitions.load(Ordering::Relaxed)
    }

    /// Channel carrying every published phase.
    ///
    /// Values are consumed by whoever receives them first, which includes
    /// [`PhaseCycler::wait_for_green`].
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &PhaseChannel<Phase> {
        &self.shared.channel
    }

    /// Blocks until a green phase is received, discarding reds.
    ///
    /// If the light is already green this waits for the *next* green.
    pub fn wait_for_green(&self) {
        while !is_green(self.shared.channel.receive()) {}
    }

    /// Like [`PhaseCycler::wait_for_green`], giving up after `timeout`.
    ///
    /// Returns true if a green phase was received. A timeout too large to
    /// represent as a deadline waits indefinitely.
    pub fn wait_for_green_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait_for_green();
            return true;
        };
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.shared.channel.receive_timeout(remaining) {
                Some(phase) if is_green(phase) => return true,
                Some(_) => {}
                None => return false,
            }
        }
    }
}

impl Drop for PhaseCycler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_cycle(rng: &mut ChaCha8Rng, timing: &PhaseTiming) -> Duration {
    Duration::from_millis(rng.gen_range(timing.min_cycle_ms..=timing.max_cycle_ms))
}

/// Body of the cycling thread.
fn cycle_through_phases(shared: &CyclerShared, timing: &PhaseTiming, mut rng: ChaCha8Rng) {
    let poll = timing.poll_interval();
    let mut cycle = sample_cycle(&mut rng, timing);
    let mut mark = Instant::now();

    while !shared.shutdown.load(Ordering::Acquire) {
        if mark.elapsed() > cycle {
            let (phase, transitions) = {
                let mut current = shared.current.lock();
                *current = current.toggled();
                let transitions = shared.transitions.fetch_add(1, Ordering::Relaxed) + 1;
                shared.channel.send(*current);
                (*current, transitions)
            };

            tracing::debug!(
                light = shared.id,
                %phase,
                cycle_ms = u64::try_from(cycle.as_millis()).unwrap_or(u64::MAX),
                transitions,
                "phase transition"
            );

            cycle = sample_cycle(&mut rng, timing);
            mark = Instant::now();
        }
        thread::sleep(poll);
    }
}
