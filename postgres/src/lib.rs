//! `PostgreSQL` stores for Queue Desk.
//!
//! [`PostgresQueueStore`] implements both
//! [`SequenceStore`](queue_desk_core::SequenceStore) and
//! [`TicketStore`](queue_desk_core::TicketStore) on one connection pool. Each
//! guarantee the core relies on maps to a single SQL statement:
//!
//! - Counter increment: `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`
//! - Compare-and-set on status: `UPDATE ... WHERE id = $1 AND status = $2`
//! - One SERVING ticket per category: a partial unique index
//!
//! # Example
//!
//! ```no_run
//! use queue_desk_postgres::PostgresQueueStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresQueueStore::new("postgres://localhost/queue_desk").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod rows;
mod store;

pub use store::PostgresQueueStore;
