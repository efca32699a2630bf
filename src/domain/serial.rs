//! Serial number values and allocation scopes.
//!
//! Canonical serials look like `SN-2025-0042`: a fixed prefix, the allocation
//! scope (calendar year) and the per-scope sequence zero-padded to four digits.
//! Sequences past 9999 widen the string instead of being truncated.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const SERIAL_PREFIX: &str = "SN";
pub const SEQUENCE_WIDTH: usize = 4;

/// Allocation partition for serials, the calendar year of issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialScope(i32);

impl SerialScope {
    pub fn new(year: i32) -> Self {
        Self(year)
    }

    pub fn year(&self) -> i32 {
        self.0
    }
}

impl From<i32> for SerialScope {
    fn from(year: i32) -> Self {
        Self(year)
    }
}

impl fmt::Display for SerialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A serial drawn from a scope's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerialNumber {
    scope: SerialScope,
    sequence: u64,
}

impl SerialNumber {
    pub fn new(scope: SerialScope, sequence: u64) -> Self {
        Self { scope, sequence }
    }

    pub fn scope(&self) -> SerialScope {
        self.scope
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:0width$}",
            SERIAL_PREFIX,
            self.scope,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("not a canonical serial number: {0}")]
pub struct SerialParseError(pub String);

impl FromStr for SerialNumber {
    type Err = SerialParseError;

    /// Parses the canonical form only. Legacy or manual serials are opaque
    /// strings and are never reinterpreted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SerialParseError(s.to_string());

        let mut parts = s.splitn(3, '-');
        let (prefix, year, sequence) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(y), Some(q)) => (p, y, q),
            _ => return Err(err()),
        };

        if prefix != SERIAL_PREFIX
            || year.len() != 4
            || sequence.len() < SEQUENCE_WIDTH
            || !year.bytes().all(|b| b.is_ascii_digit())
            || !sequence.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(err());
        }

        // Widened sequences never carry leading zeros.
        if sequence.len() > SEQUENCE_WIDTH && sequence.starts_with('0') {
            return Err(err());
        }

        let year: i32 = year.parse().map_err(|_| err())?;
        let sequence: u64 = sequence.parse().map_err(|_| err())?;
        if sequence == 0 {
            return Err(err());
        }

        Ok(SerialNumber::new(SerialScope::new(year), sequence))
    }
}

/// Source of the current allocation period.
pub trait ScopeClock: Send + Sync {
    fn current_scope(&self) -> SerialScope;
}

/// Scope is the current UTC calendar year.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarYearClock;

impl ScopeClock for CalendarYearClock {
    fn current_scope(&self) -> SerialScope {
        SerialScope::new(Utc::now().year())
    }
}

/// Always reports the same scope. Used by tests and one-off tooling.
#[derive(Debug, Clone, Copy)]
pub struct FixedScopeClock(pub SerialScope);

impl ScopeClock for FixedScopeClock {
    fn current_scope(&self) -> SerialScope {
        self.0
    }
}
