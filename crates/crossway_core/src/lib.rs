//! # CROSSWAY Core
//!
//! Concurrency kernel for a traffic simulation where every vehicle, light
//! and intersection runs on its own thread.
//!
//! ## Components
//!
//! 1. **`PhaseChannel`** - blocking single-producer/multi-consumer queue
//! 2. **`PhaseCycler`** - background thread flipping red/green at random intervals
//! 3. **`AdmissionQueue`** - FIFO of waiters paired with fulfill-once signals
//! 4. **`IntersectionGate`** - admits one waiter per tick while the resource is free
//!
//! ## Example
//!
//! ```rust,ignore
//! use crossway_core::{IntersectionGate, PhaseCycler, PhaseTiming};
//!
//! let light = PhaseCycler::new(0, PhaseTiming::default())?;
//! light.start()?;
//!
//! let gate = IntersectionGate::new(0);
//! let ticket = gate.request_entry("car-1");
//! gate.tick();          // driven by the simulation loop
//! ticket.wait()?;       // admitted
//! light.wait_for_green();
//! gate.release(&"car-1");
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod gate;
pub mod light;
pub mod sync;

pub use config::{CrosswayConfig, GateConfig, PhaseTiming, SimulationConfig};
pub use error::{CrosswayError, CrosswayResult};
pub use gate::{AdmissionQueue, IntersectionGate, WaitingEntry};
pub use light::{is_green, Phase, PhaseCycler};
pub use sync::{completion, AdmissionTicket, Completer, PhaseChannel, TicketId};
