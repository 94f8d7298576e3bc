//! Emission limits.
//!
//! Amounts are whole currency units held in `u128` so cumulative totals never
//! lose precision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The maximum cumulative amount a citizen (or their group) may create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmissionLimit {
    Limited(u128),
    Unbounded,
}

impl EmissionLimit {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Whether `used + amount` stays within the limit. Overflow never fits.
    pub fn allows(&self, used: u128, amount: u128) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited(limit) => used.checked_add(amount).is_some_and(|t| t <= *limit),
        }
    }

    /// Headroom left after `used`, or `None` when unbounded.
    pub fn remaining(&self, used: u128) -> Option<u128> {
        match self {
            Self::Unbounded => None,
            Self::Limited(limit) => Some(limit.saturating_sub(used)),
        }
    }
}

impl fmt::Display for EmissionLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(limit) => write!(f, "{limit}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}
