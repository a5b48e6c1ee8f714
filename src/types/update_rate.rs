//! Update rate control for result streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update rate for result streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every published result
    Native,

    /// At most this many results per second.
    /// A zero rate is treated as Native
    Max(u32),
}

impl UpdateRate {
    /// Normalize a zero rate to Native
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Native,
            other => other,
        }
    }

    /// Get throttle interval if needed
    pub fn throttle_interval(self) -> Option<Duration> {
        match self.normalize() {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
