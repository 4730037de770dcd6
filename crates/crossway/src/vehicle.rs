//! # Vehicle
//!
//! A vehicle loops over its route forever: enter, cross, leave, travel.
//! Movement itself is not modelled; crossing and travel are plain delays.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossway_core::{CrosswayError, CrosswayResult, SimulationConfig};

use crate::events::{EventSender, TrafficEvent};
use crate::intersection::Intersection;
use crate::simulation::{Simulate, StopSignal};

/// Vehicle identifier.
pub type VehicleId = usize;

/// A vehicle driving a fixed loop of intersections.
pub struct Vehicle {
    id: VehicleId,
    route: Vec<Arc<Intersection>>,
    crossing: Duration,
    travel: Duration,
    patience: Duration,
    events: EventSender,
}

impl Vehicle {
    /// Creates a vehicle that will drive `route` in order, wrapping around.
    #[must_use]
    pub fn new(
        id: VehicleId,
        route: Vec<Arc<Intersection>>,
        config: &SimulationConfig,
        events: EventSender,
    ) -> Self {
        Self {
            id,
            route,
            crossing: Duration::from_millis(config.crossing_ms),
            travel: Duration::from_millis(config.travel_ms),
            patience: Duration::from_millis(config.patience_ms),
            events,
        }
    }

    /// Vehicle identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Intersections visited, in order.
    #[must_use]
    pub fn route(&self) -> &[Arc<Intersection>] {
        &self.route
    }

    /// Vehicle thread body.
    fn drive(&self, stop: &StopSignal) {
        let mut leg = 0usize;

        while !stop.is_stopped() && !self.route.is_empty() {
            let intersection = &self.route[leg % self.route.len()];
            let requested = Instant::now();

            match intersection.enter(self.id, self.patience, stop) {
                Ok(true) => {
                    self.events.send(TrafficEvent::Entered {
                        vehicle: self.id,
                        intersection: intersection.id(),
                        waited: requested.elapsed(),
                    });

                    // Always leave, even if stopped mid-crossing.
                    stop.sleep(self.crossing);
                    intersection.leave(self.id);
                    self.events.send(TrafficEvent::Left {
                        vehicle: self.id,
                        intersection: intersection.id(),
                    });

                    leg += 1;
                    stop.sleep(self.travel);
                }
                Ok(false) => break,
                Err(CrosswayError::EntryTimeout { ticket }) => {
                    tracing::debug!(
                        vehicle = self.id,
                        intersection = intersection.id(),
                        ticket,
                        "gave up waiting, requeueing"
                    );
                    self.events.send(TrafficEvent::GaveUp {
                        vehicle: self.id,
                        intersection: intersection.id(),
                        ticket,
                    });
                }
                Err(e) => {
                    tracing::warn!(vehicle = self.id, error = %e, "vehicle halted");
                    break;
                }
            }
        }
    }
}

impl Simulate for Vehicle {
    fn name(&self) -> String {
        format!("vehicle-{}", self.id)
    }

    fn simulate(self: Arc<Self>, stop: StopSignal) -> CrosswayResult<Vec<JoinHandle<()>>> {
        let handle = thread::Builder::new()
            .name(self.name())
            .spawn(move || self.drive(&stop))
            .map_err(|e| CrosswayError::ThreadSpawn(e.to_string()))?;
        Ok(vec![handle])
    }
}
