//! Errors surfaced by the allocator and the ticket state machine.

use crate::queue_number::ParseQueueNumberError;
use crate::store::StoreError;
use crate::ticket::TicketStatus;
use thiserror::Error;

/// Domain error returned by every queue operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Branch code does not name an active branch.
    #[error("Invalid branch: {0}")]
    InvalidBranch(String),

    /// Queue number text is not `{PREFIX}-{NNN}`.
    #[error("Invalid queue number: {0}")]
    InvalidQueueNumber(#[from] ParseQueueNumberError),

    /// The daily cap for this branch is exhausted.
    #[error("Queue is full for branch {branch} (daily cap {cap})")]
    QueueFull {
        /// Branch code
        branch: String,
        /// Configured cap
        cap: u32,
    },

    /// No ticket matches the given branch and queue number today.
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    /// The transition table does not allow this move.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Status the ticket is in
        from: TicketStatus,
        /// Requested status
        to: TicketStatus,
    },

    /// Another ticket is already SERVING in this category.
    #[error("Branch {branch} is already serving a ticket in category {category}")]
    AlreadyServing {
        /// Branch code
        branch: String,
        /// Category
        category: String,
    },

    /// Nothing is waiting in the requested scope.
    #[error("No tickets in queue")]
    NoTicketsInQueue,

    /// Registration input failed validation.
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    /// Underlying storage failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl QueueError {
    /// Stable machine-readable code for callers that translate errors.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidBranch(_) => "INVALID_BRANCH",
            Self::InvalidQueueNumber(_) => "INVALID_QUEUE_NUMBER",
            Self::QueueFull { .. } => "QUEUE_FULL",
            Self::TicketNotFound(_) => "TICKET_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AlreadyServing { .. } => "ALREADY_SERVING",
            Self::NoTicketsInQueue => "NO_TICKETS_IN_QUEUE",
            Self::InvalidRegistration(_) => "INVALID_REGISTRATION",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the failure came from infrastructure rather than the request.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
