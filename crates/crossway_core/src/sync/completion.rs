//! # One-Shot Completion
//!
//! Write-once slot with a blocking read, split into two halves:
//!
//! - [`Completer`]: held by the admission queue. `fulfill` consumes it, so
//!   a signal cannot be fulfilled twice.
//! - [`AdmissionTicket`]: held by the waiter. Blocks until the slot is set.
//!
//! Dropping a `Completer` without fulfilling it marks the slot abandoned
//! and wakes the waiter with [`CrosswayError::EntryAbandoned`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{CrosswayError, CrosswayResult};

/// Sequence number of a waiting entry, unique per queue.
pub type TicketId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Pending,
    Fulfilled,
    Abandoned,
}

struct Slot {
    state: Mutex<SlotState>,
    condvar: Condvar,
}

impl Slot {
    fn settle(&self, to: SlotState) {
        let mut state = self.state.lock();
        if *state == SlotState::Pending {
            *state = to;
            self.condvar.notify_all();
        }
    }

    fn outcome(state: SlotState) -> Option<CrosswayResult<()>> {
        match state {
            SlotState::Pending => None,
            SlotState::Fulfilled => Some(Ok(())),
            SlotState::Abandoned => Some(Err(CrosswayError::EntryAbandoned)),
        }
    }
}

/// Creates a linked completer/ticket pair.
#[must_use]
pub fn completion(ticket: TicketId) -> (Completer, AdmissionTicket) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Pending),
        condvar: Condvar::new(),
    });
    (
        Completer {
            ticket,
            slot: Arc::clone(&slot),
        },
        AdmissionTicket { ticket, slot },
    )
}

/// Producer half of a one-shot signal.
pub struct Completer {
    ticket: TicketId,
    slot: Arc<Slot>,
}

impl Completer {
    /// Ticket this completer belongs to.
    #[inline]
    #[must_use]
    pub fn ticket(&self) -> TicketId {
        self.ticket
    }

    /// Fulfills the signal and wakes the waiter.
    pub fn fulfill(self) {
        self.slot.settle(SlotState::Fulfilled);
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        // No-op after `fulfill`.
        self.slot.settle(SlotState::Abandoned);
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

/// Observer half of a one-shot signal, returned by
/// [`IntersectionGate::request_entry`](crate::IntersectionGate::request_entry).
pub struct AdmissionTicket {
    ticket: TicketId,
    slot: Arc<Slot>,
}

impl AdmissionTicket {
    /// Ticket number assigned when the entry was queued.
    #[inline]
    #[must_use]
    pub fn ticket(&self) -> TicketId {
        self.ticket
    }

    /// Returns true once entry has been granted.
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        *self.slot.state.lock() == SlotState::Fulfilled
    }

    /// Blocks until entry is granted.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::EntryAbandoned`] if the entry was dropped
    /// without being admitted.
    pub fn wait(&self) -> CrosswayResult<()> {
        let mut state = self.slot.state.lock();
        loop {
            if let Some(outcome) = Slot::outcome(*state) {
                return outcome;
            }
            self.slot.condvar.wait(&mut state);
        }
    }

    /// Blocks for at most `timeout`. Returns `Ok(true)` if admitted and
    /// `Ok(false)` if the deadline passed first. A timeout too large to
    /// represent as a deadline behaves like [`AdmissionTicket::wait`].
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::EntryAbandoned`] if the entry was dropped
    /// without being admitted.
    pub fn wait_timeout(&self, timeout: Duration) -> CrosswayResult<bool> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait().map(|()| true);
        };
        let mut state = self.slot.state.lock();
        loop {
            if let Some(outcome) = Slot::outcome(*state) {
                return outcome.map(|()| true);
            }
            if self.slot.condvar.wait_until(&mut state, deadline).timed_out() {
                return Slot::outcome(*state).map_or(Ok(false), |o| o.map(|()| true));
            }
        }
    }
}

impl fmt::Debug for AdmissionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionTicket")
            .field("ticket", &self.ticket)
            .field("admitted", &self.is_admitted())
            .finish()
    }
}
