//! # Queue Desk Testing
//!
//! Testing utilities for Queue Desk.
//!
//! This crate provides:
//! - A controllable clock ([`FixedClock`])
//! - In-memory implementations of the store traits with the same atomicity
//!   guarantees as the database ([`InMemorySequenceStore`], [`InMemoryTicketStore`])
//! - Fixtures for branches and tickets
//!
//! ## Example
//!
//! ```
//! use queue_desk_testing::{InMemorySequenceStore, test_clock};
//! use queue_desk_core::environment::Clock;
//! use queue_desk_core::store::SequenceStore;
//! use queue_desk_core::{BranchCode, ScopeKey};
//!
//! # tokio_test::block_on(async {
//! let clock = test_clock();
//! let store = InMemorySequenceStore::new();
//! let scope = ScopeKey::new(BranchCode::new("MAIN"), "2025-01-01".parse().unwrap());
//!
//! assert_eq!(store.next_number(scope.clone(), clock.now()).await.unwrap(), 1);
//! assert_eq!(store.next_number(scope, clock.now()).await.unwrap(), 2);
//! # });
//! ```

use chrono::{DateTime, Duration, Utc};
use queue_desk_core::environment::Clock;

pub mod fixtures;
pub mod store_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Arc, PoisonError, RwLock};

    /// Controllable clock for deterministic tests
    ///
    /// Returns the same instant until moved with [`advance`](Self::advance) or
    /// [`set`](Self::set). Clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use queue_desk_testing::mocks::FixedClock;
    /// use queue_desk_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::seconds(5));
    /// assert_eq!(clock.now() - time1, Duration::seconds(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move the clock forward by `by`
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 09:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "queue_desk=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use fixtures::{TicketFixture, default_directory};
pub use mocks::{FixedClock, test_clock};
pub use store_mocks::{InMemorySequenceStore, InMemoryTicketStore};
