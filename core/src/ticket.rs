//! Ticket records and the ticket status transition table.
//!
//! The transition table is a pure function on [`TicketStatus`]
//! so it can be exercised exhaustively without any storage:
//!
//! | From    | To      | Allowed |
//! |---------|---------|---------|
//! | WAITING | SERVING | yes     |
//! | WAITING | NOSHOW  | yes     |
//! | SERVING | DONE    | yes     |
//! | SERVING | NOSHOW  | yes     |
//! | DONE    | *       | no      |
//! | NOSHOW  | *       | no      |
//! | WAITING | DONE    | no      |

use crate::branch::BranchCode;
use crate::error::QueueError;
use crate::queue_number::QueueNumber;
use crate::sequence::DateKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a status or scope string is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// Unique identifier for a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a ticket.
///
/// `Done` and `NoShow` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Registered, waiting to be called
    #[serde(rename = "WAITING")]
    Waiting,
    /// Called to the counter
    #[serde(rename = "SERVING")]
    Serving,
    /// Service completed
    #[serde(rename = "DONE")]
    Done,
    /// Customer did not show up
    #[serde(rename = "NOSHOW")]
    NoShow,
}

impl TicketStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Waiting, Self::Serving, Self::Done, Self::NoShow];

    /// Whether the transition table allows moving from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Waiting, Self::Serving | Self::NoShow) | (Self::Serving, Self::Done | Self::NoShow)
        )
    }

    /// Validate a transition against the table.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidTransition`] carrying `(self, to)` if the
    /// table does not allow the move.
    pub fn check_transition(self, to: Self) -> Result<(), QueueError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(QueueError::InvalidTransition { from: self, to })
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::NoShow)
    }

    /// Convert status to its stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Serving => "SERVING",
            Self::Done => "DONE",
            Self::NoShow => "NOSHOW",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(Self::Waiting),
            "SERVING" => Ok(Self::Serving),
            "DONE" => Ok(Self::Done),
            "NOSHOW" => Ok(Self::NoShow),
            _ => Err(ParseStatusError {
                kind: "ticket status",
                value: s.to_string(),
            }),
        }
    }
}

/// How a SERVING ticket was called.
///
/// Only tickets called within a category scope are followed by an automatic
/// call of the next ticket in that category when they are marked done.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServeScope {
    /// Branch-wide call (`call_next` without category, `call_specific`)
    Branch,
    /// Category-scoped call (`call_next` with category, auto-advance)
    Category,
}

impl ServeScope {
    /// Convert scope to its stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "BRANCH",
            Self::Category => "CATEGORY",
        }
    }
}

impl FromStr for ServeScope {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BRANCH" => Ok(Self::Branch),
            "CATEGORY" => Ok(Self::Category),
            _ => Err(ParseStatusError {
                kind: "serve scope",
                value: s.to_string(),
            }),
        }
    }
}

/// Why the customer registered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Purpose {
    /// Test drive (default)
    #[default]
    TestDrive,
    /// After-sales service
    Service,
    /// General inquiry
    Inquiry,
    /// Purchase
    Purchase,
}

impl Purpose {
    /// Convert purpose to its stored string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TestDrive => "TEST_DRIVE",
            Self::Service => "SERVICE",
            Self::Inquiry => "INQUIRY",
            Self::Purchase => "PURCHASE",
        }
    }
}

impl FromStr for Purpose {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEST_DRIVE" => Ok(Self::TestDrive),
            "SERVICE" => Ok(Self::Service),
            "INQUIRY" => Ok(Self::Inquiry),
            "PURCHASE" => Ok(Self::Purchase),
            _ => Err(ParseStatusError {
                kind: "purpose",
                value: s.to_string(),
            }),
        }
    }
}

/// A ticket as persisted by a [`TicketStore`](crate::store::TicketStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Opaque identity
    pub id: TicketId,
    /// Store-assigned insertion sequence, the tie-break for equal `created_at`
    pub seq: i64,
    /// Human-facing number, unique per `(branch, date_key)`
    pub queue_no: QueueNumber,
    /// Owning branch
    pub branch: BranchCode,
    /// Operating day the number was issued for
    pub date_key: DateKey,
    /// Sub-partition with its own serving slot (car model, desk)
    pub category: String,
    /// Customer name
    pub full_name: String,
    /// Customer contact number
    pub mobile: String,
    /// Why the customer registered
    pub purpose: Purpose,
    /// Current status
    pub status: TicketStatus,
    /// How the ticket was called, once it has been
    pub serve_scope: Option<ServeScope>,
    /// When the ticket moved to SERVING
    pub called_at: Option<DateTime<Utc>>,
    /// When the ticket reached DONE or NOSHOW
    pub completed_at: Option<DateTime<Utc>>,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Apply an already-validated transition, stamping the matching timestamp.
    ///
    /// Stores call this after checking `change.from` against the stored status.
    pub fn apply(&mut self, change: &Transition) {
        self.status = change.to;
        match change.to {
            TicketStatus::Serving => {
                self.called_at = Some(change.at);
                self.serve_scope = Some(change.serve_scope.unwrap_or(ServeScope::Branch));
            }
            TicketStatus::Done | TicketStatus::NoShow => {
                self.completed_at = Some(change.at);
            }
            TicketStatus::Waiting => {}
        }
    }

    /// Ordering key for "oldest first" scans.
    #[must_use]
    pub const fn queue_order(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.seq)
    }
}

/// A ticket about to be inserted; the store assigns `seq` and the WAITING status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Opaque identity chosen by the caller
    pub id: TicketId,
    /// Allocated queue number
    pub queue_no: QueueNumber,
    /// Owning branch
    pub branch: BranchCode,
    /// Operating day the number was issued for
    pub date_key: DateKey,
    /// Category
    pub category: String,
    /// Customer name
    pub full_name: String,
    /// Customer contact number
    pub mobile: String,
    /// Why the customer registered
    pub purpose: Purpose,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl NewTicket {
    /// Materialize the stored ticket with the store-assigned sequence.
    #[must_use]
    pub fn into_ticket(self, seq: i64) -> Ticket {
        Ticket {
            id: self.id,
            seq,
            queue_no: self.queue_no,
            branch: self.branch,
            date_key: self.date_key,
            category: self.category,
            full_name: self.full_name,
            mobile: self.mobile,
            purpose: self.purpose,
            status: TicketStatus::Waiting,
            serve_scope: None,
            called_at: None,
            completed_at: None,
            created_at: self.created_at,
        }
    }
}

/// A conditional status change: applied only if the stored status is `from`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Status the caller observed and expects to still be stored
    pub from: TicketStatus,
    /// Target status
    pub to: TicketStatus,
    /// Timestamp for `called_at` / `completed_at`
    pub at: DateTime<Utc>,
    /// Recorded when `to` is SERVING
    pub serve_scope: Option<ServeScope>,
}

impl Transition {
    /// Create a transition without a serve scope.
    #[must_use]
    pub const fn new(from: TicketStatus, to: TicketStatus, at: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            at,
            serve_scope: None,
        }
    }

    /// Create a transition to SERVING under the given scope.
    #[must_use]
    pub const fn to_serving(from: TicketStatus, scope: ServeScope, at: DateTime<Utc>) -> Self {
        Self {
            from,
            to: TicketStatus::Serving,
            at,
            serve_scope: Some(scope),
        }
    }
}
