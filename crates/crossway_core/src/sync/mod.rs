//! # Synchronization Primitives
//!
//! Two blocking hand-off mechanisms, both built on
//! `parking_lot::{Mutex, Condvar}`:
//!
//! ```text
//!  PhaseChannel<T>                       Completer / AdmissionTicket
//!
//!  producer ──send──> [VecDeque<T>]      gate ──fulfill──> [slot] ──wait──> vehicle
//!                          │
//!              ┌───────────┼───────────┐
//!              ▼           ▼           ▼
//!          receiver    receiver    receiver      (first to wake takes it)
//! ```
//!
//! Neither primitive holds its lock while a caller is suspended.

mod completion;
mod phase_channel;

pub use completion::{completion, AdmissionTicket, Completer, TicketId};
pub use phase_channel::PhaseChannel;
