//! Per-branch, per-day sequence state.
//!
//! Every `(branch, date_key)` pair owns exactly one [`SequenceRecord`]: the last
//! issued sequence value and the "currently serving" pointer used for display.
//! Records are created lazily on first allocation and never deleted; a new day
//! simply yields a new scope.

use crate::branch::BranchCode;
use crate::queue_number::QueueNumber;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Text format of a date key.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar day in a branch's operating timezone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    /// Wrap a calendar date.
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The day `now` falls on at `offset_minutes` from UTC.
    ///
    /// Offsets chrono cannot represent fall back to UTC.
    #[must_use]
    pub fn at(now: DateTime<Utc>, offset_minutes: i32) -> Self {
        let local = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map_or_else(|| now.date_naive(), |offset| now.with_timezone(&offset).date_naive());
        Self(local)
    }

    /// The wrapped date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_KEY_FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, DATE_KEY_FORMAT).map(Self)
    }
}

impl TryFrom<String> for DateKey {
    type Error = chrono::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

/// Identity of a sequence record: `(branch, date_key)`.
///
/// Displays as `{BRANCH}_{YYYY-MM-DD}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    /// Branch code
    pub branch: BranchCode,
    /// Operating day
    pub date_key: DateKey,
}

impl ScopeKey {
    /// Create a scope key.
    #[must_use]
    pub const fn new(branch: BranchCode, date_key: DateKey) -> Self {
        Self { branch, date_key }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.branch, self.date_key)
    }
}

/// Change to the "currently serving" pointer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServingPointerUpdate {
    /// Point at this queue number
    Set(QueueNumber),
    /// Clear the pointer, but only if it still names this queue number
    ClearIfCurrent(QueueNumber),
    /// Clear unconditionally
    Clear,
}

/// Counter and display pointer for one `(branch, date_key)` scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Which branch and day this record counts for
    pub scope: ScopeKey,
    /// Highest sequence value issued so far; `0` before the first allocation
    pub last_number: u32,
    /// Queue number shown as "now serving"
    pub current_serving: Option<QueueNumber>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl SequenceRecord {
    /// A record with nothing issued and nothing serving.
    #[must_use]
    pub const fn fresh(scope: ScopeKey, at: DateTime<Utc>) -> Self {
        Self {
            scope,
            last_number: 0,
            current_serving: None,
            updated_at: at,
        }
    }

    /// Apply a pointer update, returning whether the pointer changed.
    pub fn apply_pointer(&mut self, update: ServingPointerUpdate, at: DateTime<Utc>) -> bool {
        let next = match update {
            ServingPointerUpdate::Set(queue_no) => Some(queue_no),
            ServingPointerUpdate::ClearIfCurrent(queue_no) => {
                if self.current_serving.as_ref() == Some(&queue_no) {
                    None
                } else {
                    return false;
                }
            }
            ServingPointerUpdate::Clear => None,
        };
        if next == self.current_serving {
            return false;
        }
        self.current_serving = next;
        self.updated_at = at;
        true
    }
}
