//! Round position type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Latest known unit of progress in the remote network (a "round").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Position(pub u64);

impl Position {
    /// Create a new position from a raw round number.
    pub fn new(round: u64) -> Self {
        Self(round)
    }

    /// The round immediately after this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// How far this position is ahead of `other`, or zero when it is not ahead.
    pub fn lead_over(self, other: Position) -> u64 {
        self.0.saturating_sub(other.0)
    }

    /// Get the raw round number.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for Position {
    fn from(round: u64) -> Self {
        Self(round)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
