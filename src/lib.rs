//! Round-tracking poller and data feeds for Voi/Algorand node dashboards.
//!
//! roundwatch keeps a best-effort live view of a network's current round and
//! the timing and transaction volume of each new round, healing itself when
//! it falls behind or stalls. Slow-changing datasets such as node scores are
//! refreshed on an interval, and view preferences persist in a small
//! key/value store.
//!
//! # Features
//!
//! - **Round tracking**: Long-polls the node API for each next round
//! - **Self-healing**: Resynchronizes when tracking is slow or behind
//! - **Streams**: Results arrive as a watch-backed `Stream`, optionally throttled
//! - **Interval feeds**: Hourly node scores and daily proposal statistics
//!
//! ## Example
//!
//! ```rust,no_run
//! use roundwatch::{PollerConfig, Roundwatch, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> roundwatch::Result<()> {
//!     let connection = Roundwatch::connect(PollerConfig::default()).await?;
//!     let mut rounds = Box::pin(connection.subscribe(UpdateRate::Native));
//!
//!     while let Some(result) = rounds.next().await {
//!         println!(
//!             "Round {} took {:.2} s with {} transactions",
//!             result.position,
//!             result.round_speed_secs(),
//!             result.auxiliary_count
//!         );
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg(test)]
mod test_utils;
pub mod types;

// Polling architecture
pub mod connection;
pub mod poller;
pub mod source;
pub mod sources;
pub mod stream;

// Slow datasets and preferences
pub mod feeds;
pub mod store;

// Core exports
pub use config::{FeedConfig, HoldersConfig, PollerConfig};
pub use error::*;
pub use types::*;

// Main API exports
pub use connection::RoundConnection;
pub use poller::{LoopState, Phase, RoundPoller, Staleness, StalenessPolicy};
pub use source::RoundSource;
pub use sources::HttpRoundSource;
pub use store::{NameFilter, PreferenceStore};

/// Unified entry point for round tracking.
///
/// # Examples
///
/// ```rust,no_run
/// use roundwatch::{PollerConfig, Roundwatch};
///
/// #[tokio::main]
/// async fn main() -> roundwatch::Result<()> {
///     let config = PollerConfig::load("roundwatch.yaml".as_ref())?;
///     let connection = Roundwatch::connect(config).await?;
///     // Use connection...
///     Ok(())
/// }
/// ```
pub struct Roundwatch;

impl Roundwatch {
    /// Start tracking rounds from the HTTP endpoints in `config`.
    ///
    /// The poller runs on a spawned task until the returned connection is
    /// dropped. Network failures never surface here; they only delay results.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A configured URL is empty, malformed, or not HTTP(S)
    /// - A configured delay or timeout is zero
    pub async fn connect(config: PollerConfig) -> Result<RoundConnection> {
        RoundConnection::connect(config).await
    }

    /// Start tracking rounds from a custom source.
    pub fn from_source<S: RoundSource>(source: S, config: &PollerConfig) -> RoundConnection {
        RoundConnection::with_source(source, config)
    }
}
