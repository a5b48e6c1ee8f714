//! Poll result published once per successful iteration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Position;

/// Outcome of waiting for, and fetching data for, one new position.
///
/// This is the only value the poller hands to its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct PollResult {
    /// The newly observed position
    pub position: Position,

    /// Wall-clock time from the start of the long-poll until the auxiliary
    /// fetch completed, in milliseconds
    pub elapsed_ms: u64,

    /// Number of auxiliary records (transactions) in the new position
    pub auxiliary_count: usize,
}

impl PollResult {
    /// Create a new poll result
    pub fn new(position: Position, elapsed: Duration, auxiliary_count: usize) -> Self {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        Self { position, elapsed_ms, auxiliary_count }
    }

    /// Elapsed time as a [`Duration`]
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// Elapsed time in seconds rounded to two decimals, as a round-speed display shows it
    pub fn round_speed_secs(&self) -> f64 {
        (self.elapsed_ms as f64 / 10.0).round() / 100.0
    }
}
