//! # Queue Desk Core
//!
//! Core types and traits for a multi-branch service-counter queue.
//!
//! Customers register and receive a sequential queue number scoped to a branch
//! and a calendar day (`A-001`, `A-002`, ...). Staff advance tickets through a
//! small lifecycle:
//!
//! ```text
//!            call                 done
//! WAITING ──────────▶ SERVING ──────────▶ DONE
//!    │                   │
//!    │     no-show       │  no-show
//!    └───────────────────┴──────────────▶ NOSHOW
//! ```
//!
//! ## Core Concepts
//!
//! - **Branch directory**: Resolves branch codes to their prefix, active flag and
//!   operating timezone ([`branch`])
//! - **Queue number**: `{prefix}-{NNN}`, formatted and parsed by [`queue_number`]
//! - **Sequence record**: Per `(branch, day)` counter plus the "currently serving"
//!   pointer ([`sequence`])
//! - **Ticket**: A registration and its status ([`ticket`])
//! - **Stores**: Async, dyn-compatible persistence traits with store-level
//!   atomicity ([`store`])
//!
//! ## Architecture Principles
//!
//! - The transition table is a pure function, testable without storage
//! - Every write is a conditional write (compare-and-set on expected status)
//! - Dependencies are injected as trait objects (`Arc<dyn SequenceStore>`, ...)
//! - No process-level lock is required for correctness
//!
//! ## Example
//!
//! ```
//! use queue_desk_core::queue_number::{Prefix, QueueNumber};
//! use queue_desk_core::ticket::TicketStatus;
//!
//! let prefix: Prefix = "A".parse().unwrap();
//! let queue_no = QueueNumber::new(prefix, 7).unwrap();
//! assert_eq!(queue_no.to_string(), "A-007");
//!
//! assert!(TicketStatus::Waiting.can_transition_to(TicketStatus::Serving));
//! assert!(!TicketStatus::Done.can_transition_to(TicketStatus::Serving));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod branch;
pub mod error;
pub mod queue_number;
pub mod sequence;
pub mod store;
pub mod ticket;

pub use branch::{BranchCode, BranchConfig, BranchDirectory, StaticBranchDirectory};
pub use error::QueueError;
pub use queue_number::{Prefix, QueueNumber};
pub use sequence::{DateKey, ScopeKey, SequenceRecord, ServingPointerUpdate};
pub use store::{SequenceStore, StoreError, TicketQuery, TicketStore};
pub use ticket::{NewTicket, Purpose, ServeScope, Ticket, TicketId, TicketStatus, Transition};

/// Environment module - Dependency injection traits
///
/// All time-dependent behaviour (date keys, `called_at`/`completed_at` stamps)
/// goes through [`Clock`](environment::Clock) so tests can pin the current instant.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use queue_desk_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
