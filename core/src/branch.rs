//! Branch directory: resolves branch codes to their configuration.
//!
//! The directory is configuration state with its own administrative
//! lifecycle. The allocator and the state machine only read from it.

use crate::queue_number::{MAX_SEQUENCE, Prefix};
use crate::sequence::{DateKey, ScopeKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of a branch code.
pub const MAX_BRANCH_CODE_LEN: usize = 10;

/// Largest accepted UTC offset, in minutes (UTC+14:00).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Errors raised while building a branch directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The branch code is empty, too long, or not alphanumeric.
    #[error("Invalid branch code: {0:?}")]
    InvalidCode(String),

    /// Two branches share a code.
    #[error("Duplicate branch code: {0}")]
    DuplicateCode(BranchCode),

    /// The daily cap cannot be represented by three-digit queue numbers.
    #[error("Daily cap {0} must be within 1..={MAX_SEQUENCE}")]
    InvalidDailyCap(u32),

    /// The UTC offset is outside ±14 hours.
    #[error("UTC offset {minutes} minutes for branch {code} is out of range")]
    InvalidUtcOffset {
        /// Branch the offset belongs to
        code: BranchCode,
        /// Rejected offset
        minutes: i32,
    },
}

/// Canonical (uppercase) branch code such as `MAIN` or `NORTH`.
///
/// # Validation
///
/// - [`FromStr`]: trims and uppercases, then requires 1-10 ASCII alphanumerics
/// - [`BranchCode::new`]: no validation (for trusted, already canonical input)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchCode(String);

impl BranchCode {
    /// Create a `BranchCode` without validation.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the branch code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical form of user input: trimmed and uppercased.
    #[must_use]
    pub fn canonicalize(input: &str) -> String {
        input.trim().to_ascii_uppercase()
    }
}

impl FromStr for BranchCode {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = Self::canonicalize(s);
        let valid = !code.is_empty()
            && code.len() <= MAX_BRANCH_CODE_LEN
            && code.bytes().all(|b| b.is_ascii_alphanumeric());
        if valid {
            Ok(Self(code))
        } else {
            Err(DirectoryError::InvalidCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for BranchCode {
    type Error = DirectoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BranchCode> for String {
    fn from(code: BranchCode) -> Self {
        code.0
    }
}

impl fmt::Display for BranchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BranchCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

const fn default_active() -> bool {
    true
}

/// Configuration of a single branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Unique canonical code
    pub code: BranchCode,
    /// Display name
    pub name: String,
    /// Queue-number prefix
    pub prefix: Prefix,
    /// Inactive branches cannot issue or call tickets
    #[serde(default = "default_active")]
    pub active: bool,
    /// Operating timezone as an offset from UTC; decides when the day rolls over
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl BranchConfig {
    /// Create an active branch operating on UTC.
    #[must_use]
    pub fn new(code: BranchCode, name: impl Into<String>, prefix: Prefix) -> Self {
        Self {
            code,
            name: name.into(),
            prefix,
            active: true,
            utc_offset_minutes: 0,
        }
    }

    /// Set the operating timezone offset.
    #[must_use]
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Mark the branch inactive.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Operating day of `now` in this branch's timezone.
    #[must_use]
    pub fn date_key(&self, now: DateTime<Utc>) -> DateKey {
        DateKey::at(now, self.utc_offset_minutes)
    }

    /// Sequence scope of `now` for this branch.
    #[must_use]
    pub fn scope(&self, now: DateTime<Utc>) -> ScopeKey {
        ScopeKey::new(self.code.clone(), self.date_key(now))
    }
}

/// Read-only branch lookup consumed by the allocator and the state machine.
///
/// Codes are matched after canonicalization (`" main "` resolves `MAIN`).
pub trait BranchDirectory: Send + Sync {
    /// Resolve an active branch by code.
    fn resolve(&self, code: &str) -> Option<BranchConfig>;

    /// Whether `code` names an active branch.
    fn is_valid(&self, code: &str) -> bool {
        self.resolve(code).is_some()
    }

    /// All active branches in configuration order.
    fn list_active(&self) -> Vec<BranchConfig>;

    /// Maximum queue numbers issued per branch per day.
    fn daily_cap(&self) -> u32;
}

/// Directory backed by a fixed list of branches, loaded from configuration.
#[derive(Clone, Debug)]
pub struct StaticBranchDirectory {
    branches: Vec<BranchConfig>,
    daily_cap: u32,
}

impl StaticBranchDirectory {
    /// Build a validated directory.
    ///
    /// # Errors
    ///
    /// - [`DirectoryError::InvalidDailyCap`] if `daily_cap` is not in `1..=999`
    /// - [`DirectoryError::DuplicateCode`] if two branches share a code
    /// - [`DirectoryError::InvalidUtcOffset`] if an offset exceeds ±14 hours
    pub fn new(branches: Vec<BranchConfig>, daily_cap: u32) -> Result<Self, DirectoryError> {
        if daily_cap == 0 || daily_cap > MAX_SEQUENCE {
            return Err(DirectoryError::InvalidDailyCap(daily_cap));
        }

        let mut seen = HashSet::new();
        for branch in &branches {
            if !seen.insert(branch.code.clone()) {
                return Err(DirectoryError::DuplicateCode(branch.code.clone()));
            }
            if branch.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
                return Err(DirectoryError::InvalidUtcOffset {
                    code: branch.code.clone(),
                    minutes: branch.utc_offset_minutes,
                });
            }
        }

        Ok(Self {
            branches,
            daily_cap,
        })
    }

    /// The out-of-the-box branches: MAIN (A), NORTH (B), SOUTH (C).
    #[must_use]
    pub fn default_branches() -> Vec<BranchConfig> {
        [("MAIN", "Main Branch", "A"), ("NORTH", "North Branch", "B"), ("SOUTH", "South Branch", "C")]
            .into_iter()
            .filter_map(|(code, name, prefix)| {
                Some(BranchConfig::new(
                    code.parse().ok()?,
                    name,
                    prefix.parse().ok()?,
                ))
            })
            .collect()
    }

    /// Directory with [`default_branches`](Self::default_branches) and a cap of 999.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            branches: Self::default_branches(),
            daily_cap: MAX_SEQUENCE,
        }
    }

    /// Every configured branch, active or not.
    #[must_use]
    pub fn branches(&self) -> &[BranchConfig] {
        &self.branches
    }
}

impl BranchDirectory for StaticBranchDirectory {
    fn resolve(&self, code: &str) -> Option<BranchConfig> {
        let code = BranchCode::canonicalize(code);
        self.branches
            .iter()
            .find(|b| b.active && b.code.as_str() == code)
            .cloned()
    }

    fn list_active(&self) -> Vec<BranchConfig> {
        self.branches.iter().filter(|b| b.active).cloned().collect()
    }

    fn daily_cap(&self) -> u32 {
        self.daily_cap
    }
}
