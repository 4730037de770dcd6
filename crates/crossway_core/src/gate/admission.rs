//! # Admission Queue
//!
//! FIFO of waiting entities, each paired with the [`Completer`] that will
//! wake it. All mutation happens under one mutex; nothing here blocks.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::sync::{Completer, TicketId};

/// An entity waiting for admission together with its wake-up signal.
pub struct WaitingEntry<E> {
    entity: E,
    completer: Completer,
}

impl<E> WaitingEntry<E> {
    /// Pairs an entity with its completer.
    #[must_use]
    pub fn new(entity: E, completer: Completer) -> Self {
        Self { entity, completer }
    }

    /// Ticket of this entry.
    #[inline]
    #[must_use]
    pub fn ticket(&self) -> TicketId {
        self.completer.ticket()
    }

    /// Unwraps the entity, dropping the completer unfulfilled.
    ///
    /// The waiter observes [`CrosswayError::EntryAbandoned`](crate::CrosswayError::EntryAbandoned).
    #[must_use]
    pub fn into_entity(self) -> E {
        self.entity
    }
}

impl<E: fmt::Debug> fmt::Debug for WaitingEntry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitingEntry")
            .field("ticket", &self.ticket())
            .field("entity", &self.entity)
            .finish()
    }
}

/// Thread-safe FIFO of [`WaitingEntry`] values.
///
/// An entry leaves the queue exactly once: either admitted from the front
/// or cancelled by ticket. Entries are never reordered.
pub struct AdmissionQueue<E> {
    entries: Mutex<VecDeque<WaitingEntry<E>>>,
    next_ticket: AtomicU64,
}

impl<E> AdmissionQueue<E> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Reserves a ticket number for a new entry.
    pub fn next_ticket(&self) -> TicketId {
        self.next_ticket.fetch_add(1, Ordering::Relaxed)
    }

    /// Appends an entity and its completer to the tail.
    pub fn push_back(&self, entity: E, completer: Completer) {
        self.entries
            .lock()
            .push_back(WaitingEntry::new(entity, completer));
    }

    /// Removes the front entry and fulfills its signal. No-op if empty.
    ///
    /// Returns the admitted entity.
    pub fn admit_front(&self) -> Option<E> {
        self.admit_front_with(|_, _| {})
    }

    /// Like [`AdmissionQueue::admit_front`], running `before_fulfill` on the
    /// entry after it is removed and before its waiter is woken.
    ///
    /// The queue lock is held for the whole call.
    pub fn admit_front_with<F>(&self, before_fulfill: F) -> Option<E>
    where
        F: FnOnce(TicketId, &E),
    {
        let mut entries = self.entries.lock();
        let WaitingEntry { entity, completer } = entries.pop_front()?;
        before_fulfill(completer.ticket(), &entity);
        completer.fulfill();
        Some(entity)
    }

    /// Removes a still-pending entry without admitting it.
    ///
    /// Its waiter observes [`CrosswayError::EntryAbandoned`](crate::CrosswayError::EntryAbandoned).
    /// Returns `None` if the ticket is no longer queued.
    pub fn cancel(&self, ticket: TicketId) -> Option<E> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|e| e.ticket() == ticket)?;
        entries.remove(index).map(WaitingEntry::into_entity)
    }

    /// Number of waiting entries. Advisory only.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nobody is waiting. Advisory only.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<E> Default for AdmissionQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for AdmissionQueue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("waiting", &self.len())
            .finish_non_exhaustive()
    }
}
