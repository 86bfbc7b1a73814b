//! Queue number formatting and parsing.
//!
//! A queue number is the human-facing ticket identifier: a branch prefix of one
//! to five uppercase ASCII letters, a dash, and a three-digit zero-padded
//! sequence value (`A-007`, `VIP-120`). The text format is fixed:
//! `^[A-Z]{1,5}-\d{3}$`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest sequence value a queue number can carry.
pub const MAX_SEQUENCE: u32 = 999;

/// Maximum prefix length in characters.
pub const MAX_PREFIX_LEN: usize = 5;

/// Errors produced when building or parsing queue numbers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseQueueNumberError {
    /// The text does not match `{PREFIX}-{NNN}`.
    #[error("Invalid queue number format: {0}")]
    Format(String),

    /// The prefix is empty, too long, or contains non `A-Z` characters.
    #[error("Invalid prefix: {0:?} (expected 1-5 uppercase letters)")]
    Prefix(String),

    /// The sequence value is outside `1..=999`.
    #[error("Sequence value {0} is out of range 1..={MAX_SEQUENCE}")]
    OutOfRange(u32),
}

/// Branch prefix for queue numbers (`A`, `B`, `VIP`).
///
/// Parsing via [`FromStr`] is strict: only `A-Z`, one to five characters.
/// [`Prefix::normalize`] trims and uppercases administrative input first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    /// Trim and uppercase `input`, then validate it as a prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ParseQueueNumberError::Prefix`] if the normalized text is not
    /// one to five ASCII letters.
    ///
    /// # Examples
    ///
    /// ```
    /// use queue_desk_core::queue_number::Prefix;
    ///
    /// let prefix = Prefix::normalize(" vip ").unwrap();
    /// assert_eq!(prefix.as_str(), "VIP");
    /// ```
    pub fn normalize(input: &str) -> Result<Self, ParseQueueNumberError> {
        input.trim().to_ascii_uppercase().parse()
    }

    /// Get the prefix as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Prefix {
    type Err = ParseQueueNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.len() <= MAX_PREFIX_LEN
            && s.bytes().all(|b| b.is_ascii_uppercase());
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseQueueNumberError::Prefix(s.to_string()))
        }
    }
}

impl TryFrom<String> for Prefix {
    type Error = ParseQueueNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A formatted queue number: prefix plus sequence value in `1..=999`.
///
/// # Examples
///
/// ```
/// use queue_desk_core::queue_number::QueueNumber;
///
/// let queue_no: QueueNumber = "A-042".parse().unwrap();
/// assert_eq!(queue_no.prefix().as_str(), "A");
/// assert_eq!(queue_no.number(), 42);
/// assert_eq!(queue_no.to_string(), "A-042");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueNumber {
    prefix: Prefix,
    number: u32,
}

impl QueueNumber {
    /// Build a queue number from a prefix and a sequence value.
    ///
    /// # Errors
    ///
    /// Returns [`ParseQueueNumberError::OutOfRange`] if `number` is `0` or
    /// above [`MAX_SEQUENCE`]; three digits cannot represent it.
    pub fn new(prefix: Prefix, number: u32) -> Result<Self, ParseQueueNumberError> {
        if number == 0 || number > MAX_SEQUENCE {
            return Err(ParseQueueNumberError::OutOfRange(number));
        }
        Ok(Self { prefix, number })
    }

    /// The branch prefix.
    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// The sequence value.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for QueueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:03}", self.prefix, self.number)
    }
}

impl FromStr for QueueNumber {
    type Err = ParseQueueNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_error = || ParseQueueNumberError::Format(s.to_string());

        let (prefix, digits) = s.split_once('-').ok_or_else(format_error)?;
        if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format_error());
        }
        let prefix: Prefix = prefix.parse().map_err(|_| format_error())?;
        let number: u32 = digits.parse().map_err(|_| format_error())?;

        Self::new(prefix, number)
    }
}

impl TryFrom<String> for QueueNumber {
    type Error = ParseQueueNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QueueNumber> for String {
    fn from(queue_no: QueueNumber) -> Self {
        queue_no.to_string()
    }
}
