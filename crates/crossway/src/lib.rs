//! # CROSSWAY Simulation Driver
//!
//! Runs every traffic object on its own thread on top of `crossway_core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  request/release  ┌────────────────────────────┐
//! │ Vehicle (xN) │ ────────────────> │ Intersection (xM)          │
//! │  own thread  │ <── ticket/green  │  gate-tick thread (TickLoop)│
//! └──────┬───────┘                   │  light thread (PhaseCycler) │
//!        │ TrafficEvent              └────────────────────────────┘
//!        ▼
//! ┌──────────────┐
//! │  Simulation  │  drains events into a SimulationReport
//! └──────────────┘
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod events;
pub mod intersection;
pub mod simulation;
pub mod tick;
pub mod vehicle;

pub use events::{EventBus, EventReceiver, EventSender, TrafficEvent};
pub use intersection::{Intersection, IntersectionId};
pub use simulation::{Simulate, Simulation, SimulationReport, StopSignal};
pub use tick::{TickLoop, TickStats};
pub use vehicle::{Vehicle, VehicleId};
