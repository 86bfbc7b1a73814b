//! Persistence traits for sequence records and tickets.
//!
//! Correctness of the allocator and the state machine rests on three
//! store-level guarantees, not on any in-process lock:
//!
//! - [`SequenceStore::next_number`] is an atomic read-modify-write: two callers
//!   for the same scope never observe the same value
//! - [`TicketStore::transition`] is a conditional write: it only applies if the
//!   stored status still equals `Transition::from`
//! - At most one ticket per `(branch, date_key, category)` is SERVING; a
//!   transition that would create a second one fails with
//!   [`StoreError::ServingSlotTaken`]
//!
//! # Implementations
//!
//! - `PostgresQueueStore` (in `queue-desk-postgres`): production
//! - `InMemorySequenceStore` / `InMemoryTicketStore` (in `queue-desk-testing`):
//!   fast, deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn` so the stores can
//! be shared as `Arc<dyn SequenceStore>` and `Arc<dyn TicketStore>`.

use crate::branch::BranchCode;
use crate::queue_number::QueueNumber;
use crate::sequence::{DateKey, ScopeKey, SequenceRecord, ServingPointerUpdate};
use crate::ticket::{NewTicket, Ticket, TicketId, TicketStatus, Transition};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Conditional write lost: the stored status is not the expected one.
    #[error("Status conflict on ticket {ticket_id}: expected {expected}, found {actual}")]
    StatusConflict {
        /// Ticket the write targeted
        ticket_id: TicketId,
        /// Status the caller expected
        expected: TicketStatus,
        /// Status actually stored
        actual: TicketStatus,
    },

    /// No ticket with this id.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// Another ticket already occupies the serving slot.
    #[error("A ticket is already serving in branch {branch}, category {category}")]
    ServingSlotTaken {
        /// Branch of the slot
        branch: BranchCode,
        /// Category of the slot
        category: String,
    },

    /// The queue number was already issued in this scope.
    #[error("Queue number {queue_no} already exists in {scope}")]
    DuplicateQueueNumber {
        /// Scope the number belongs to
        scope: ScopeKey,
        /// Duplicated number
        queue_no: QueueNumber,
    },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored data could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Filter for [`TicketStore::list`].
///
/// Always scoped to one branch and one operating day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketQuery {
    /// Branch to scan
    pub branch: BranchCode,
    /// Operating day to scan
    pub date_key: DateKey,
    /// Statuses to include; empty means all
    pub statuses: Vec<TicketStatus>,
    /// Restrict to one category
    pub category: Option<String>,
}

impl TicketQuery {
    /// All tickets of a branch on a day.
    #[must_use]
    pub const fn new(branch: BranchCode, date_key: DateKey) -> Self {
        Self {
            branch,
            date_key,
            statuses: Vec::new(),
            category: None,
        }
    }

    /// Restrict to the given statuses.
    #[must_use]
    pub fn with_statuses(mut self, statuses: &[TicketStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// Restrict to one category.
    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Whether `ticket` passes this filter.
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.branch == self.branch
            && ticket.date_key == self.date_key
            && (self.statuses.is_empty() || self.statuses.contains(&ticket.status))
            && self
                .category
                .as_ref()
                .is_none_or(|category| &ticket.category == category)
    }
}

/// Sequence counter persistence.
pub trait SequenceStore: Send + Sync {
    /// Atomically increment the counter of `scope` and return the new value.
    ///
    /// Creates the record with `last_number = 1` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn next_number(&self, scope: ScopeKey, at: DateTime<Utc>) -> StoreFuture<'_, u32>;

    /// Load the record of `scope`, if any number was ever issued there.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn load(&self, scope: ScopeKey) -> StoreFuture<'_, Option<SequenceRecord>>;

    /// Update the "currently serving" pointer, creating the record if needed.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn update_current_serving(
        &self,
        scope: ScopeKey,
        update: ServingPointerUpdate,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, SequenceRecord>;

    /// Reset the counter to zero and clear the pointer.
    ///
    /// Issued tickets are not touched; numbers restart at `001` only in a scope
    /// that has no tickets (an administrative operation).
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn reset(&self, scope: ScopeKey, at: DateTime<Utc>) -> StoreFuture<'_, SequenceRecord>;
}

/// Ticket persistence.
pub trait TicketStore: Send + Sync {
    /// Insert a WAITING ticket, assigning its insertion sequence.
    ///
    /// # Errors
    ///
    /// - `DuplicateQueueNumber`: `(branch, date_key, queue_no)` already exists
    /// - `DatabaseError`: Database connection or query failed
    fn insert(&self, ticket: NewTicket) -> StoreFuture<'_, Ticket>;

    /// Find a ticket by id.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn find(&self, id: TicketId) -> StoreFuture<'_, Option<Ticket>>;

    /// Find a ticket by its queue number within a branch and day.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn find_by_queue_no(
        &self,
        branch: BranchCode,
        date_key: DateKey,
        queue_no: QueueNumber,
    ) -> StoreFuture<'_, Option<Ticket>>;

    /// List matching tickets ordered by `(created_at, seq)` ascending.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: Database connection or query failed
    fn list(&self, query: TicketQuery) -> StoreFuture<'_, Vec<Ticket>>;

    /// Conditionally apply a status change.
    ///
    /// Succeeds only if the stored status equals `change.from`; stamps
    /// `called_at` or `completed_at` and returns the updated ticket.
    ///
    /// # Errors
    ///
    /// - `TicketNotFound`: No ticket with this id
    /// - `StatusConflict`: Stored status differs from `change.from`
    /// - `ServingSlotTaken`: Another ticket is SERVING in the same category
    /// - `DatabaseError`: Database connection or query failed
    fn transition(&self, id: TicketId, change: Transition) -> StoreFuture<'_, Ticket>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ticket::Purpose;
    use chrono::TimeZone;

    fn ticket(status: TicketStatus, category: &str) -> Ticket {
        NewTicket {
            id: TicketId::new(),
            queue_no: "A-001".parse().unwrap(),
            branch: BranchCode::new("MAIN"),
            date_key: "2025-01-01".parse().unwrap(),
            category: category.to_string(),
            full_name: "Ada".to_string(),
            mobile: "0800000000".to_string(),
            purpose: Purpose::TestDrive,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        }
        .into_ticket(1)
        .with_status(status)
    }

    trait WithStatus {
        fn with_status(self, status: TicketStatus) -> Self;
    }

    impl WithStatus for Ticket {
        fn with_status(mut self, status: TicketStatus) -> Self {
            self.status = status;
            self
        }
    }

    #[test]
    fn query_filters() {
        let main = BranchCode::new("MAIN");
        let day: DateKey = "2025-01-01".parse().unwrap();
        let waiting_x = ticket(TicketStatus::Waiting, "X");

        assert!(TicketQuery::new(main.clone(), day).matches(&waiting_x));
        assert!(
            TicketQuery::new(main.clone(), day)
                .with_statuses(&[TicketStatus::Waiting])
                .in_category("X")
                .matches(&waiting_x)
        );
        assert!(
            !TicketQuery::new(main.clone(), day)
                .with_statuses(&[TicketStatus::Serving])
                .matches(&waiting_x)
        );
        assert!(!TicketQuery::new(main.clone(), day).in_category("Y").matches(&waiting_x));
        assert!(!TicketQuery::new(BranchCode::new("NORTH"), day).matches(&waiting_x));
        assert!(
            !TicketQuery::new(main, "2025-01-02".parse().unwrap()).matches(&waiting_x)
        );
    }

    #[test]
    fn error_messages() {
        let conflict = StoreError::StatusConflict {
            ticket_id: TicketId::new(),
            expected: TicketStatus::Waiting,
            actual: TicketStatus::Serving,
        };
        assert!(conflict.to_string().contains("expected WAITING, found SERVING"));

        let slot = StoreError::ServingSlotTaken {
            branch: BranchCode::new("MAIN"),
            category: "X".to_string(),
        };
        assert_eq!(
            slot.to_string(),
            "A ticket is already serving in branch MAIN, category X"
        );
    }
}
