//! Branch and ticket fixtures

#![allow(clippy::expect_used)] // Fixtures take hardcoded literals
#![allow(clippy::missing_panics_doc)]

use crate::mocks::test_clock;
use chrono::{DateTime, Utc};
use queue_desk_core::environment::Clock;
use queue_desk_core::{
    BranchCode, BranchConfig, DateKey, NewTicket, Purpose, StaticBranchDirectory, TicketId,
};

/// Default category used by fixtures.
pub const DEFAULT_CATEGORY: &str = "GENERAL";

/// Directory with MAIN (A), NORTH (B) and SOUTH (C) and a cap of 999.
#[must_use]
pub fn default_directory() -> StaticBranchDirectory {
    StaticBranchDirectory::with_defaults()
}

/// Directory with MAIN (A) only and the given daily cap.
#[must_use]
pub fn directory_with_cap(cap: u32) -> StaticBranchDirectory {
    let main = BranchConfig::new(
        "MAIN".parse().expect("valid branch code"),
        "Main Branch",
        "A".parse().expect("valid prefix"),
    );
    StaticBranchDirectory::new(vec![main], cap).expect("valid directory")
}

/// Builder for [`NewTicket`] values.
///
/// Defaults: date key of [`test_clock`], category [`DEFAULT_CATEGORY`],
/// created at the test clock's instant.
///
/// # Example
///
/// ```
/// use queue_desk_testing::TicketFixture;
///
/// let ticket = TicketFixture::new("MAIN", "A-001").category("X").build();
/// assert_eq!(ticket.queue_no.to_string(), "A-001");
/// assert_eq!(ticket.category, "X");
/// ```
#[derive(Clone, Debug)]
pub struct TicketFixture {
    ticket: NewTicket,
}

impl TicketFixture {
    /// Start a fixture for `queue_no` on `branch`.
    #[must_use]
    pub fn new(branch: &str, queue_no: &str) -> Self {
        let now = test_clock().now();
        Self {
            ticket: NewTicket {
                id: TicketId::new(),
                queue_no: queue_no.parse().expect("valid queue number"),
                branch: branch.parse::<BranchCode>().expect("valid branch code"),
                date_key: DateKey::at(now, 0),
                category: DEFAULT_CATEGORY.to_string(),
                full_name: "Test Customer".to_string(),
                mobile: "0800000000".to_string(),
                purpose: Purpose::default(),
                created_at: now,
            },
        }
    }

    /// Set the category.
    #[must_use]
    pub fn category(mut self, category: &str) -> Self {
        self.ticket.category = category.to_string();
        self
    }

    /// Set the registration time.
    #[must_use]
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.ticket.created_at = at;
        self
    }

    /// Set the operating day.
    #[must_use]
    pub fn date_key(mut self, date_key: &str) -> Self {
        self.ticket.date_key = date_key.parse().expect("valid date key");
        self
    }

    /// Set the purpose.
    #[must_use]
    pub fn purpose(mut self, purpose: Purpose) -> Self {
        self.ticket.purpose = purpose;
        self
    }

    /// Finish the fixture.
    #[must_use]
    pub fn build(self) -> NewTicket {
        self.ticket
    }
}
