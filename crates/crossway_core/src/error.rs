//! # Crossway Error Types
//!
//! The synchronization primitives themselves never fail. Everything here
//! comes from the edges: config loading, thread spawning and bounded waits.

use thiserror::Error;

use crate::sync::TicketId;

/// Errors that can occur around the concurrency core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrosswayError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text is not valid TOML for the expected schema.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration {path}: {reason}")]
    ConfigIo {
        /// Path that was read.
        path: String,
        /// Underlying IO error text.
        reason: String,
    },

    /// The OS refused to spawn a background thread.
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),

    /// An admission wait expired and its entry was removed from the queue.
    #[error("admission timed out for ticket {ticket}")]
    EntryTimeout {
        /// Ticket of the cancelled entry.
        ticket: TicketId,
    },

    /// The admission signal was dropped without being fulfilled.
    #[error("admission abandoned: gate dropped before granting entry")]
    EntryAbandoned,
}

/// Result type for crossway operations.
pub type CrosswayResult<T> = Result<T, CrosswayError>;
