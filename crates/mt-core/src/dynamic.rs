//! Signed log references.
//!
//! Non-negative values name a log by primary key. Negative values count back
//! through logs ordered by their most recent record start: `-1` is the most
//! recent log, `-2` the one before it, and so on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A log reference as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum DynamicId {
    /// A primary key.
    Literal(i64),
    /// Zero-based offset into the recency ordering.
    Back(usize),
}

impl DynamicId {
    /// The most recently active log.
    pub const LATEST: Self = Self::Back(0);

    pub const fn offset(self) -> Option<usize> {
        match self {
            Self::Literal(_) => None,
            Self::Back(offset) => Some(offset),
        }
    }
}

impl From<i64> for DynamicId {
    fn from(value: i64) -> Self {
        if value >= 0 {
            Self::Literal(value)
        } else {
            // -1 -> 0, -2 -> 1, ...; i64::MIN does not overflow through unsigned_abs.
            let offset = usize::try_from(value.unsigned_abs() - 1).unwrap_or(usize::MAX);
            Self::Back(offset)
        }
    }
}

impl From<DynamicId> for i64 {
    fn from(id: DynamicId) -> Self {
        match id {
            DynamicId::Literal(id) => id,
            DynamicId::Back(offset) => i64::try_from(offset)
                .map_or(Self::MIN, |offset| -offset - 1),
        }
    }
}

impl fmt::Display for DynamicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i64::from(*self))
    }
}

impl FromStr for DynamicId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self::from)
    }
}
