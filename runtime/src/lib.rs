//! # Queue Desk Runtime
//!
//! The queue-number allocator and the ticket state machine.
//!
//! Both components are stateless coordinators over injected stores: all
//! atomicity is delegated to [`SequenceStore`](queue_desk_core::SequenceStore)
//! and [`TicketStore`](queue_desk_core::TicketStore), so any number of
//! instances may run concurrently against the same backend.
//!
//! ## Core Components
//!
//! - **Allocator** ([`QueueAllocator`]): mints `{prefix}-{NNN}` numbers per branch and day
//! - **State machine** ([`TicketStateMachine`]): staff actions on tickets
//! - **Metrics** ([`metrics`]): Prometheus counters and histograms
//!
//! ## Example
//!
//! ```
//! use queue_desk_runtime::{QueueAllocator, TicketStateMachine};
//! use queue_desk_testing::{InMemorySequenceStore, InMemoryTicketStore, default_directory, test_clock};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let directory = Arc::new(default_directory());
//! let sequences = Arc::new(InMemorySequenceStore::new());
//! let clock = Arc::new(test_clock());
//!
//! let allocator = QueueAllocator::new(directory.clone(), sequences.clone(), clock.clone());
//! assert_eq!(allocator.allocate("MAIN").await.unwrap().to_string(), "A-001");
//!
//! let machine = TicketStateMachine::new(
//!     directory,
//!     Arc::new(InMemoryTicketStore::new()),
//!     sequences,
//!     clock,
//! );
//! assert!(machine.current_serving_ticket("MAIN").await.unwrap().is_none());
//! # });
//! ```

/// Queue-number allocation and counter state
pub mod allocator;

/// Prometheus metrics for observability
pub mod metrics;

/// Ticket status transitions
pub mod state_machine;

pub use allocator::{Allocation, QueueAllocator, QueueState, QueueStats};
pub use state_machine::{QueueStatistics, TicketStateMachine};
