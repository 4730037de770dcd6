//! # Intersection Admission
//!
//! ```text
//!  vehicle ──request_entry──> [AdmissionQueue] ──tick (if free)──> holder
//!     │                              │                               │
//!     └──── ticket.wait() <── fulfill ┘          release ──> free <───┘
//! ```
//!
//! The gate admits at most one entity at a time, strictly in queue order.
//! Ticks come from the simulation driver; the gate never schedules itself.

mod admission;
mod intersection;

pub use admission::{AdmissionQueue, WaitingEntry};
pub use intersection::IntersectionGate;
