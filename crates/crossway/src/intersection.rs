//! # Intersection
//!
//! An [`IntersectionGate`] plus the traffic light guarding it.
//!
//! A vehicle first waits for admission, then for green. Only the admitted
//! vehicle ever waits on the light, so each green phase has at most one
//! consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossway_core::{
    is_green, CrosswayError, CrosswayResult, GateConfig, IntersectionGate, PhaseCycler,
    PhaseTiming,
};

use crate::simulation::{Simulate, StopSignal};
use crate::tick::TickLoop;
use crate::vehicle::VehicleId;

/// Intersection identifier.
pub type IntersectionId = usize;

/// How often blocked vehicles re-check the stop signal.
const STOP_POLL: Duration = Duration::from_millis(20);

/// A capacity-one intersection with its own traffic light.
pub struct Intersection {
    id: IntersectionId,
    gate: IntersectionGate<VehicleId>,
    light: PhaseCycler,
    tick_interval: Duration,
    crossings: AtomicU64,
}

impl Intersection {
    /// Creates an intersection with an idle light.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::InvalidConfig`] if `timing` is invalid.
    pub fn new(id: IntersectionId, timing: PhaseTiming, gate: &GateConfig) -> CrosswayResult<Self> {
        Ok(Self {
            id,
            gate: IntersectionGate::new(id),
            light: PhaseCycler::new(id, timing)?,
            tick_interval: gate.tick_interval(),
            crossings: AtomicU64::new(0),
        })
    }

    /// Intersection identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> IntersectionId {
        self.id
    }

    /// Admission gate.
    #[inline]
    #[must_use]
    pub fn gate(&self) -> &IntersectionGate<VehicleId> {
        &self.gate
    }

    /// Traffic light.
    #[inline]
    #[must_use]
    pub fn light(&self) -> &PhaseCycler {
        &self.light
    }

    /// Completed crossings.
    #[must_use]
    pub fn crossings(&self) -> u64 {
        self.crossings.load(Ordering::Relaxed)
    }

    /// Returns true if the light currently shows green.
    #[must_use]
    pub fn traffic_light_is_green(&self) -> bool {
        is_green(self.light.current_phase())
    }

    /// Queues `vehicle`, waits for admission, then waits for green.
    ///
    /// Returns `Ok(true)` once the vehicle is inside; it must call
    /// [`Intersection::leave`] afterwards. Returns `Ok(false)` if `stop`
    /// fired first, in which case nothing is held.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::EntryTimeout`] if admission took longer
    /// than `patience`; the request is withdrawn from the queue.
    pub fn enter(
        &self,
        vehicle: VehicleId,
        patience: Duration,
        stop: &StopSignal,
    ) -> CrosswayResult<bool> {
        let ticket = self.gate.request_entry(vehicle);
        // Unrepresentable deadline: wait until admitted or stopped.
        let deadline = Instant::now().checked_add(patience);

        while !ticket.wait_timeout(STOP_POLL)? {
            let stopped = stop.is_stopped();
            if !stopped && deadline.map_or(true, |deadline| Instant::now() < deadline) {
                continue;
            }
            if self.gate.cancel_entry(&ticket) {
                if stopped {
                    return Ok(false);
                }
                return Err(CrosswayError::EntryTimeout {
                    ticket: ticket.ticket(),
                });
            }
            // Admitted while withdrawing.
            ticket.wait()?;
            break;
        }

        if self.await_green(stop) {
            tracing::debug!(intersection = self.id, vehicle, "vehicle entered");
            Ok(true)
        } else {
            self.gate.release(&vehicle);
            Ok(false)
        }
    }

    /// Releases the gate after `vehicle` has crossed.
    pub fn leave(&self, vehicle: VehicleId) {
        self.gate.release(&vehicle);
        self.crossings.fetch_add(1, Ordering::Relaxed);
    }

    fn await_green(&self, stop: &StopSignal) -> bool {
        // Drop phases published while nobody was waiting, then trust the
        // committed phase; anything newer is still in the channel.
        while self.light.channel().try_receive().is_some() {}
        if self.traffic_light_is_green() {
            return true;
        }
        loop {
            if self.light.wait_for_green_timeout(STOP_POLL) {
                return true;
            }
            if stop.is_stopped() {
                return false;
            }
        }
    }

    /// Gate tick thread body.
    fn process_vehicle_queue(&self, stop: &StopSignal) {
        let mut ticks = TickLoop::new(self.tick_interval);

        while !stop.is_stopped() {
            let start = ticks.begin_tick();
            if let Some(vehicle) = self.gate.tick() {
                tracing::trace!(intersection = self.id, vehicle, "admitted");
            }
            ticks.end_tick(start);
            ticks.wait_for_next_tick();
        }

        self.light.stop();
        let stats = ticks.stats();
        tracing::debug!(
            intersection = self.id,
            ticks = ticks.tick_count(),
            tick_us = u64::try_from(ticks.tick_duration().as_micros()).unwrap_or(u64::MAX),
            late_ticks = stats.late_ticks,
            max_tick_us = stats.max_tick_us,
            "gate loop stopped"
        );
    }
}

impl Simulate for Intersection {
    fn name(&self) -> String {
        format!("intersection-{}", self.id)
    }

    fn simulate(self: Arc<Self>, stop: StopSignal) -> CrosswayResult<Vec<JoinHandle<()>>> {
        self.light.start()?;

        let this = Arc::clone(&self);
        let handle = thread::Builder::new()
            .name(self.name())
            .spawn(move || this.process_vehicle_queue(&stop))
            .map_err(|e| {
                self.light.stop();
                CrosswayError::ThreadSpawn(e.to_string())
            })?;

        Ok(vec![handle])
    }
}
