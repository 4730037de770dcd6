//! # Intersection Gate
//!
//! Capacity-one resource guarded by an [`AdmissionQueue`].
//!
//! ## State Machine
//!
//! ```text
//!            tick && queue non-empty
//!   ┌──────┐ ─────────────────────────> ┌──────┐
//!   │ FREE │                            │ BUSY │
//!   └──────┘ <───────────────────────── └──────┘
//!                   release
//! ```
//!
//! `tick` marks the gate busy before the admitted waiter is woken, so a
//! second tick can never admit anyone until `release` runs.
//!
//! ## Caller Obligation
//!
//! Every admitted entity must call [`IntersectionGate::release`] exactly
//! once. A missing release starves everyone queued behind it.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;

use super::admission::AdmissionQueue;
use crate::error::{CrosswayError, CrosswayResult};
use crate::sync::{completion, AdmissionTicket};

struct GateState<E> {
    /// Entity currently inside. `Some` means busy.
    holder: Option<E>,
    /// Total admissions.
    admitted: u64,
}

/// One-at-a-time admission to a shared intersection.
pub struct IntersectionGate<E> {
    id: usize,
    queue: AdmissionQueue<E>,
    state: Mutex<GateState<E>>,
}

impl<E> IntersectionGate<E>
where
    E: Clone + PartialEq + fmt::Debug,
{
    /// Creates a free gate with an empty queue.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            queue: AdmissionQueue::new(),
            state: Mutex::new(GateState {
                holder: None,
                admitted: 0,
            }),
        }
    }

    /// Identifier used in logs.
    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Queues `entity` and returns immediately.
    ///
    /// Block on the returned ticket to learn when entry is granted.
    pub fn request_entry(&self, entity: E) -> AdmissionTicket {
        let (completer, ticket) = completion(self.queue.next_ticket());
        tracing::trace!(gate = self.id, ticket = ticket.ticket(), ?entity, "entry requested");
        self.queue.push_back(entity, completer);
        ticket
    }

    /// Queues `entity` and blocks for at most `timeout` waiting for entry.
    ///
    /// On expiry the entry is removed from the queue. If admission raced
    /// with the expiry, entry is reported as granted and the caller owns
    /// the gate.
    ///
    /// # Errors
    ///
    /// Returns [`CrosswayError::EntryTimeout`] if the entry was cancelled,
    /// or [`CrosswayError::EntryAbandoned`] if the gate dropped it.
    pub fn request_entry_timeout(&self, entity: E, timeout: Duration) -> CrosswayResult<()> {
        let ticket = self.request_entry(entity);
        if ticket.wait_timeout(timeout)? {
            return Ok(());
        }

        if self.cancel_entry(&ticket) {
            tracing::warn!(
                gate = self.id,
                ticket = ticket.ticket(),
                "admission timed out, entry cancelled"
            );
            return Err(CrosswayError::EntryTimeout {
                ticket: ticket.ticket(),
            });
        }

        ticket.wait()
    }

    /// Withdraws a pending request.
    ///
    /// Returns `false` if the entry was already admitted, in which case the
    /// ticket is fulfilled (the signal is set under the queue lock) and the
    /// caller holds the gate.
    pub fn cancel_entry(&self, ticket: &AdmissionTicket) -> bool {
        match self.queue.cancel(ticket.ticket()) {
            Some(entity) => {
                tracing::trace!(gate = self.id, ticket = ticket.ticket(), ?entity, "entry cancelled");
                true
            }
            None => false,
        }
    }

    /// Scheduling tick: admits the queue head if the gate is free.
    ///
    /// Returns the admitted entity, or `None` if the gate is busy or
    /// nobody is waiting.
    pub fn tick(&self) -> Option<E> {
        let mut state = self.state.lock();
        if state.holder.is_some() {
            return None;
        }

        self.queue.admit_front_with(|ticket, entity| {
            state.holder = Some(entity.clone());
            state.admitted += 1;
            tracing::debug!(gate = self.id, ticket, ?entity, "entry granted");
        })
    }

    /// Frees the gate after `entity` has left.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the gate is free or held by a different
    /// entity. Release builds log a warning and free the gate anyway.
    pub fn release(&self, entity: &E) {
        let mut state = self.state.lock();
        debug_assert!(
            state.holder.is_some(),
            "gate {} released by {entity:?} while free",
            self.id
        );
        debug_assert!(
            state.holder.as_ref().map_or(true, |holder| holder == entity),
            "gate {} released by {entity:?}, held by {:?}",
            self.id,
            state.holder
        );

        match state.holder.take() {
            Some(holder) if holder == *entity => {
                tracing::debug!(gate = self.id, ?entity, "gate released");
            }
            Some(holder) => {
                tracing::warn!(gate = self.id, ?holder, ?entity, "gate released by non-holder");
            }
            None => {
                tracing::warn!(gate = self.id, ?entity, "release of a free gate");
            }
        }
    }

    /// Returns true while an admitted entity has not released.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.lock().holder.is_some()
    }

    /// Entity currently holding the gate.
    #[must_use]
    pub fn holder(&self) -> Option<E> {
        self.state.lock().holder.clone()
    }

    /// Number of entities waiting. Advisory only.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Total admissions since creation.
    #[must_use]
    pub fn admitted_count(&self) -> u64 {
        self.state.lock().admitted
    }
}

impl<E> fmt::Debug for IntersectionGate<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntersectionGate")
            .field("id", &self.id)
            .field("waiting", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_gate_is_free() {
        let gate: IntersectionGate<u32> = IntersectionGate::new(0);
        assert!(!gate.is_busy());
        assert_eq!(gate.holder(), None);
        assert_eq!(gate.queue_len(), 0);
        assert_eq!(gate.tick(), None);
    }

    #[test]
    fn test_tick_admits_one() {
        let gate = IntersectionGate::new(0);
        let a = gate.request_entry("a");
        let b = gate.request_entry("b");

        assert_eq!(gate.tick(), Some("a"));
        assert!(gate.is_busy());
        assert!(a.is_admitted());

        // Busy: further ticks do nothing.
        assert_eq!(gate.tick(), None);
        assert_eq!(gate.tick(), None);
        assert!(!b.is_admitted());
        assert_eq!(gate.queue_len(), 1);
    }

    #[test]
    fn test_release_lets_next_in() {
        let gate = IntersectionGate::new(0);
        let _a = gate.request_entry("a");
        let b = gate.request_entry("b");

        gate.tick();
        gate.release(&"a");
        assert!(!gate.is_busy());

        assert_eq!(gate.tick(), Some("b"));
        assert!(b.is_admitted());
        assert_eq!(gate.holder(), Some("b"));
        assert_eq!(gate.admitted_count(), 2);
    }

    #[test]
    fn test_waiter_thread_resumes_after_tick() {
        let gate = Arc::new(IntersectionGate::new(1));
        let ticket = gate.request_entry(7u32);

        let waiter = thread::spawn(move || ticket.wait());
        thread::sleep(Duration::from_millis(10));
        assert!(!waiter.is_finished());

        assert_eq!(gate.tick(), Some(7));
        assert_eq!(waiter.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_request_entry_timeout_cancels() {
        let gate = IntersectionGate::new(0);
        let _a = gate.request_entry("a");
        gate.tick();

        let err = gate
            .request_entry_timeout("b", Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, CrosswayError::EntryTimeout { .. }));
        assert_eq!(gate.queue_len(), 0);

        // The cancelled entry is never admitted.
        gate.release(&"a");
        assert_eq!(gate.tick(), None);
    }

    #[test]
    fn test_request_entry_timeout_granted() {
        let gate = Arc::new(IntersectionGate::new(0));

        let ticker = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                while gate.tick().is_none() {
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        gate.request_entry_timeout("a", Duration::from_secs(5)).unwrap();
        ticker.join().unwrap();
        assert_eq!(gate.holder(), Some("a"));
    }

    #[test]
    fn test_request_entry_timeout_unbounded() {
        let gate = Arc::new(IntersectionGate::new(0));

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.request_entry_timeout(1u32, Duration::MAX))
        };
        while gate.queue_len() == 0 {
            thread::yield_now();
        }

        assert_eq!(gate.tick(), Some(1));
        assert_eq!(waiter.join().unwrap(), Ok(()));
        assert_eq!(gate.holder(), Some(1));
    }

    #[test]
    fn test_cancel_entry() {
        let gate = IntersectionGate::new(0);
        let a = gate.request_entry("a");
        let b = gate.request_entry("b");
        gate.tick();

        // Already admitted: cannot be withdrawn.
        assert!(!gate.cancel_entry(&a));
        assert!(gate.cancel_entry(&b));
        assert!(!gate.cancel_entry(&b));
        assert_eq!(gate.queue_len(), 0);
    }

    #[test]
    fn test_dropped_gate_abandons_waiters() {
        let gate = IntersectionGate::new(0);
        let ticket = gate.request_entry(1u8);
        drop(gate);
        assert_eq!(ticket.wait(), Err(CrosswayError::EntryAbandoned));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "while free")]
    fn test_release_free_gate_panics() {
        let gate: IntersectionGate<u8> = IntersectionGate::new(0);
        gate.release(&1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "held by")]
    fn test_release_by_non_holder_panics() {
        let gate = IntersectionGate::new(0);
        let _a = gate.request_entry("a");
        gate.tick();
        gate.release(&"b");
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_release_violations_free_the_gate() {
        let gate = IntersectionGate::new(0);
        gate.release(&"a");
        assert!(!gate.is_busy());

        let _a = gate.request_entry("a");
        let b = gate.request_entry("b");
        assert_eq!(gate.tick(), Some("a"));
        gate.release(&"b");
        assert!(!gate.is_busy());
        assert_eq!(gate.tick(), Some("b"));
        assert!(b.is_admitted());
    }
}
