//! # Simulation Driver
//!
//! Owns every traffic object and runs each on its own thread(s).
//!
//! ## Lifecycle
//!
//! ```text
//! new(config) ──> start() ──> [collect_events() ...] ──> shutdown()
//!                    │                                       │
//!                    └─ Simulate::simulate per object        └─ stop signal, join all
//! ```
//!
//! Intersections are started before vehicles so every gate is being
//! ticked by the time the first vehicle queues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossway_core::{CrosswayConfig, CrosswayResult};

use crate::events::{EventBus, EventReceiver, TrafficEvent};
use crate::intersection::Intersection;
use crate::vehicle::Vehicle;

/// Maximum undrained events before vehicles start dropping them.
const EVENT_CAPACITY: usize = 4096;

/// Granularity of [`StopSignal::sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// How often [`Simulation::run_for`] drains the event bus.
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// Something that runs as independent concurrent task(s).
pub trait Simulate: Send + Sync {
    /// Name used for thread names and logs.
    fn name(&self) -> String;

    /// Spawns this object's threads. They exit once `stop` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned.
    fn simulate(self: Arc<Self>, stop: StopSignal) -> CrosswayResult<Vec<JoinHandle<()>>>;
}

/// Shared shutdown flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// Creates an unfired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once fired.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleeps for `duration`, waking early if the signal fires.
    ///
    /// Returns `false` if interrupted. A duration too large to represent
    /// as a deadline sleeps until the signal fires.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_stopped() {
                return false;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return true;
                    }
                    remaining.min(SLEEP_SLICE)
                }
                None => SLEEP_SLICE,
            };
            std::thread::sleep(slice);
        }
    }
}

/// Counters collected from [`TrafficEvent`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationReport {
    /// Successful entries.
    pub entered: u64,
    /// Completed crossings.
    pub left: u64,
    /// Requests withdrawn after running out of patience.
    pub gave_up: u64,
    /// Longest time from request to green light.
    pub max_wait: Duration,
    /// Sum of all request-to-green times.
    pub total_wait: Duration,
    /// Completed crossings per intersection.
    pub crossings: Vec<u64>,
}

impl SimulationReport {
    fn with_intersections(count: usize) -> Self {
        Self {
            crossings: vec![0; count],
            ..Self::default()
        }
    }

    /// Folds one event into the counters.
    pub fn record(&mut self, event: &TrafficEvent) {
        match *event {
            TrafficEvent::Entered { waited, .. } => {
                self.entered += 1;
                self.total_wait += waited;
                self.max_wait = self.max_wait.max(waited);
            }
            TrafficEvent::Left { intersection, .. } => {
                self.left += 1;
                if let Some(count) = self.crossings.get_mut(intersection) {
                    *count += 1;
                }
            }
            TrafficEvent::GaveUp { .. } => self.gave_up += 1,
        }
    }

    /// Mean request-to-green time.
    #[must_use]
    pub fn average_wait(&self) -> Duration {
        if self.entered == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_wait.as_nanos() / u128::from(self.entered);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// A loop road of intersections driven by vehicles.
pub struct Simulation {
    config: CrosswayConfig,
    intersections: Vec<Arc<Intersection>>,
    vehicles: Vec<Arc<Vehicle>>,
    events: EventReceiver,
    stop: StopSignal,
    handles: Vec<JoinHandle<()>>,
    report: SimulationReport,
}

impl Simulation {
    /// Builds intersections and vehicles from `config`.
    ///
    /// Vehicle `i` starts at intersection `i % intersections` and visits
    /// the rest in order. With a fixed light seed, intersection `k` is
    /// seeded with `seed + k`.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::InvalidConfig`](crossway_core::CrosswayError::InvalidConfig)
    /// if `config` is invalid.
    pub fn new(config: CrosswayConfig) -> CrosswayResult<Self> {
        config.validate()?;

        let intersections = (0..config.simulation.intersections)
            .map(|id| {
                let mut timing = config.light.clone();
                let offset = u64::try_from(id).unwrap_or(u64::MAX);
                timing.seed = timing.seed.map(|seed| seed.wrapping_add(offset));
                Intersection::new(id, timing, &config.gate).map(Arc::new)
            })
            .collect::<CrosswayResult<Vec<_>>>()?;

        let bus = EventBus::new(EVENT_CAPACITY);
        let vehicles = (0..config.simulation.vehicles)
            .map(|id| {
                let start = id % intersections.len();
                let route = intersections[start..]
                    .iter()
                    .chain(&intersections[..start])
                    .cloned()
                    .collect();
                Arc::new(Vehicle::new(id, route, &config.simulation, bus.sender()))
            })
            .collect();

        let report = SimulationReport::with_intersections(intersections.len());
        Ok(Self {
            config,
            intersections,
            vehicles,
            events: bus.receiver(),
            stop: StopSignal::new(),
            handles: Vec::new(),
            report,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &CrosswayConfig {
        &self.config
    }

    /// All intersections, by id.
    #[must_use]
    pub fn intersections(&self) -> &[Arc<Intersection>] {
        &self.intersections
    }

    /// All vehicles, by id.
    #[must_use]
    pub fn vehicles(&self) -> &[Arc<Vehicle>] {
        &self.vehicles
    }

    /// Handle that stops the simulation from another thread.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Returns true between `start` and `shutdown`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Spawns every object's threads. No-op if already running.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::ThreadSpawn`](crossway_core::CrosswayError::ThreadSpawn)
    /// if a thread cannot be spawned; everything already started is shut
    /// down first.
    pub fn start(&mut self) -> CrosswayResult<()> {
        if self.is_running() {
            return Ok(());
        }

        let objects: Vec<Arc<dyn Simulate>> = self
            .intersections
            .iter()
            .map(|i| Arc::clone(i) as Arc<dyn Simulate>)
            .chain(self.vehicles.iter().map(|v| Arc::clone(v) as Arc<dyn Simulate>))
            .collect();

        for object in objects {
            let name = object.name();
            match object.simulate(self.stop.clone()) {
                Ok(handles) => self.handles.extend(handles),
                Err(e) => {
                    tracing::warn!(object = %name, error = %e, "failed to start");
                    self.shutdown();
                    return Err(e);
                }
            }
        }

        tracing::info!(
            intersections = self.intersections.len(),
            vehicles = self.vehicles.len(),
            threads = self.handles.len(),
            "simulation started"
        );
        Ok(())
    }

    /// Drains pending events into the report.
    pub fn collect_events(&mut self) {
        for event in self.events.drain() {
            self.report.record(&event);
        }
    }

    /// Snapshot of the counters collected so far.
    #[must_use]
    pub fn report(&self) -> &SimulationReport {
        &self.report
    }

    /// Starts, runs for `duration` while collecting events, then shuts down.
    ///
    /// A duration too large to represent as a deadline runs until the stop
    /// signal fires.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Simulation::start`].
    pub fn run_for(&mut self, duration: Duration) -> CrosswayResult<SimulationReport> {
        self.start()?;

        let deadline = Instant::now().checked_add(duration);
        while !self.stop.is_stopped() {
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    remaining.min(COLLECT_INTERVAL)
                }
                None => COLLECT_INTERVAL,
            };
            self.stop.sleep(slice);
            self.collect_events();
        }

        Ok(self.shutdown())
    }

    /// Fires the stop signal, joins every thread and returns the report.
    pub fn shutdown(&mut self) -> SimulationReport {
        self.stop.stop();
        let threads = self.handles.len();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("simulation thread panicked");
            }
        }
        self.collect_events();

        if threads > 0 {
            tracing::info!(
                entered = self.report.entered,
                left = self.report.left,
                gave_up = self.report.gave_up,
                "simulation stopped"
            );
        }
        self.report.clone()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_sleep() {
        let stop = StopSignal::new();
        assert!(stop.sleep(Duration::from_millis(5)));

        stop.stop();
        let start = Instant::now();
        assert!(!stop.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_stop_signal_unbounded_sleep() {
        let stop = StopSignal::new();
        let sleeper = {
            let stop = stop.clone();
            std::thread::spawn(move || stop.sleep(Duration::MAX))
        };
        std::thread::sleep(Duration::from_millis(20));
        stop.stop();
        assert!(!sleeper.join().unwrap());
    }

    #[test]
    fn test_run_for_unbounded_until_stopped() {
        let mut config = CrosswayConfig::default();
        config.light = crossway_core::PhaseTiming::with_range(10, 20).seeded(3);
        config.simulation.intersections = 1;
        config.simulation.vehicles = 1;

        let mut sim = Simulation::new(config).unwrap();
        let stop = sim.stop_signal();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            stop.stop();
        });

        let start = Instant::now();
        sim.run_for(Duration::MAX).unwrap();
        stopper.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(!sim.is_running());
    }

    #[test]
    fn test_report_record() {
        let mut report = SimulationReport::with_intersections(2);
        report.record(&TrafficEvent::Entered {
            vehicle: 0,
            intersection: 1,
            waited: Duration::from_millis(30),
        });
        report.record(&TrafficEvent::Entered {
            vehicle: 1,
            intersection: 1,
            waited: Duration::from_millis(10),
        });
        report.record(&TrafficEvent::Left {
            vehicle: 0,
            intersection: 1,
        });
        report.record(&TrafficEvent::GaveUp {
            vehicle: 2,
            intersection: 0,
            ticket: 4,
        });

        assert_eq!(report.entered, 2);
        assert_eq!(report.left, 1);
        assert_eq!(report.gave_up, 1);
        assert_eq!(report.crossings, vec![0, 1]);
        assert_eq!(report.max_wait, Duration::from_millis(30));
        assert_eq!(report.average_wait(), Duration::from_millis(20));
    }

    #[test]
    fn test_average_wait_large_counts() {
        let report = SimulationReport {
            entered: 1 << 33,
            total_wait: Duration::from_secs(1 << 34),
            ..SimulationReport::default()
        };
        assert_eq!(report.average_wait(), Duration::from_secs(2));
    }

    #[test]
    fn test_seed_offset_per_intersection() {
        let mut config = CrosswayConfig::default();
        config.light = crossway_core::PhaseTiming::with_range(10, 20).seeded(u64::MAX);
        config.simulation.intersections = 2;

        let sim = Simulation::new(config).unwrap();
        let seeds: Vec<_> = sim
            .intersections()
            .iter()
            .map(|i| i.light().timing().seed)
            .collect();
        assert_eq!(seeds, vec![Some(u64::MAX), Some(0)]);
    }

    #[test]
    fn test_empty_report_average() {
        assert_eq!(SimulationReport::default().average_wait(), Duration::ZERO);
    }

    #[test]
    fn test_routes_rotate() {
        let mut config = CrosswayConfig::default();
        config.simulation.intersections = 3;
        config.simulation.vehicles = 4;

        let sim = Simulation::new(config).unwrap();
        assert_eq!(sim.intersections().len(), 3);
        assert_eq!(sim.vehicles().len(), 4);

        let starts: Vec<usize> = sim.vehicles().iter().map(|v| v.route()[0].id()).collect();
        assert_eq!(starts, vec![0, 1, 2, 0]);

        let route: Vec<usize> = sim.vehicles()[1].route().iter().map(|i| i.id()).collect();
        assert_eq!(route, vec![1, 2, 0]);
        assert!(!sim.is_running());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CrosswayConfig::default();
        config.simulation.intersections = 0;
        assert!(Simulation::new(config).is_err());
    }
}
