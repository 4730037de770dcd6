//! # Traffic Events
//!
//! Vehicles report what they did on a bounded crossbeam channel; the
//! driver drains it into counters.
//!
//! ```text
//! ┌───────────┐      ┌──────────┐      ┌────────────┐
//! │ Vehicle 0 │─────>│          │      │            │
//! │ Vehicle 1 │─────>│ EventBus │─────>│ Simulation │
//! │ Vehicle N │─────>│          │      │            │
//! └───────────┘      └──────────┘      └────────────┘
//! ```
//!
//! Sending never blocks a vehicle; a full channel drops the event.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use crossway_core::TicketId;

use crate::intersection::IntersectionId;
use crate::vehicle::VehicleId;

/// What a vehicle did at an intersection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrafficEvent {
    /// Admitted and the light was green.
    Entered {
        /// Vehicle that entered.
        vehicle: VehicleId,
        /// Intersection entered.
        intersection: IntersectionId,
        /// Time from request to green light.
        waited: Duration,
    },

    /// Left and released the intersection.
    Left {
        /// Vehicle that left.
        vehicle: VehicleId,
        /// Intersection left.
        intersection: IntersectionId,
    },

    /// Waited longer than its patience and withdrew from the queue.
    GaveUp {
        /// Vehicle that gave up.
        vehicle: VehicleId,
        /// Intersection it was queued at.
        intersection: IntersectionId,
        /// Cancelled ticket.
        ticket: TicketId,
    },
}

/// Event bus between vehicles and the driver.
pub struct EventBus {
    sender: Sender<TrafficEvent>,
    receiver: Receiver<TrafficEvent>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undrained events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /// Creates a receiver handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }
}

/// Handle for sending events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: Sender<TrafficEvent>,
}

impl EventSender {
    /// Sends an event without blocking.
    ///
    /// Returns `false` if the event was dropped.
    #[inline]
    pub fn send(&self, event: TrafficEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::trace!(?event, "event bus full, dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Handle for receiving events.
#[derive(Clone, Debug)]
pub struct EventReceiver {
    receiver: Receiver<TrafficEvent>,
}

impl EventReceiver {
    /// Receives all pending events without blocking.
    pub fn drain(&self) -> Vec<TrafficEvent> {
        self.receiver.try_iter().collect()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}
