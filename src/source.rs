//! Source trait for round data

use std::sync::Arc;

use crate::Result;
use crate::types::{PollResult, Position};

/// Trait for remote round data sources
///
/// Sources abstract over where rounds come from (the public HTTP API, a
/// scripted source in tests) and do their own timing. The poller only ever
/// calls these two methods, one at a time.
#[async_trait::async_trait]
pub trait RoundSource: Send + Sync + 'static {
    /// Get the current position known to the remote network
    ///
    /// Returns:
    /// - `Ok(position)` - The remote network's last round
    /// - `Err(PollError::Network)` - Endpoint unreachable or non-success status
    /// - `Err(PollError::Parse)` - Response lacks the round field
    async fn fetch_initial_position(&self) -> Result<Position>;

    /// Wait until a position after `from` exists, then fetch its auxiliary records
    ///
    /// The returned [`PollResult`] covers the elapsed time from the start of
    /// the wait until the auxiliary fetch completed. A malformed auxiliary
    /// payload counts as zero records rather than an error.
    async fn await_next_position(&self, from: Position) -> Result<PollResult>;

    /// Human readable name used in log output
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
impl<S: RoundSource + ?Sized> RoundSource for Arc<S> {
    async fn fetch_initial_position(&self) -> Result<Position> {
        (**self).fetch_initial_position().await
    }

    async fn await_next_position(&self, from: Position) -> Result<PollResult> {
        (**self).await_next_position(from).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
