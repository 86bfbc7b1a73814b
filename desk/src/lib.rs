//! Queue Desk - queue numbers and ticket handling for multi-branch service counters.
//!
//! Customers register at a branch and receive a number such as `A-007`,
//! scoped to that branch and day. Staff call tickets forward through
//! `WAITING → SERVING → DONE | NOSHOW`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐      ┌──────────────────┐      ┌───────────────┐
//! │  QueueDesk   │─────▶│  QueueAllocator  │─────▶│ SequenceStore │
//! │  (facade)    │      └──────────────────┘      └───────────────┘
//! │              │      ┌──────────────────┐      ┌───────────────┐
//! │              │─────▶│TicketStateMachine│─────▶│  TicketStore  │
//! └──────────────┘      └──────────────────┘      └───────────────┘
//!        │
//!        ▼
//!  BranchDirectory (validated from Config)
//! ```
//!
//! Both stores have in-memory and `PostgreSQL` implementations; see
//! [`bootstrap`].
//!
//! # Example
//!
//! ```
//! use queue_desk::{Config, Registration, bootstrap};
//!
//! # tokio_test::block_on(async {
//! let config = Config::from_lookup(|_| None).unwrap();
//! let desk = bootstrap::in_memory_desk(&config).unwrap();
//!
//! let ticket = desk
//!     .register("MAIN", &Registration::new("Ada", "0812345678", "SUV"))
//!     .await
//!     .unwrap();
//! assert_eq!(ticket.queue_no.to_string(), "A-001");
//!
//! let serving = desk.call_next_ticket("MAIN", Some("SUV")).await.unwrap();
//! assert_eq!(serving.id, ticket.id);
//! # });
//! ```

pub mod app;
pub mod bootstrap;
pub mod config;

pub use app::{QueueDesk, Registration};
pub use config::{Config, ConfigError};
