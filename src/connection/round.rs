//! Round connection: a spawned poller plus its result channel

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PollerConfig;
use crate::poller::RoundPoller;
use crate::source::RoundSource;
use crate::sources::HttpRoundSource;
use crate::stream::ThrottleExt;
use crate::types::{PollResult, UpdateRate};
use crate::Result;

/// Live view of the remote network's rounds
///
/// Owns a poller task for as long as it is alive. Dropping the connection
/// cancels the task at its next iteration boundary.
pub struct RoundConnection {
    /// Result watch receiver
    results: watch::Receiver<Option<Arc<PollResult>>>,

    /// Cancellation token for stopping the poller
    cancel: CancellationToken,
}

impl RoundConnection {
    /// Start polling the HTTP endpoints named in `config`.
    ///
    /// Returns as soon as the poller is spawned; the first result arrives
    /// once the network produces its next round.
    pub async fn connect(config: PollerConfig) -> Result<Self> {
        let source = HttpRoundSource::new(&config)?;
        info!(algod = %config.algod_url, indexer = %config.indexer_url, "Connecting round poller");
        Ok(Self::with_source(source, &config))
    }

    /// Start polling an arbitrary source.
    pub fn with_source<S: RoundSource>(source: S, config: &PollerConfig) -> Self {
        let channels = RoundPoller::with_config(source, config).spawn();
        Self { results: channels.results, cancel: channels.cancel }
    }

    /// Subscribe to published results
    ///
    /// The stream yields the latest result immediately if there is one, then
    /// every later result (or at most `hz` per second for `UpdateRate::Max`).
    /// It ends only when the poller stops.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<PollResult>> + 'static {
        let results = WatchStream::new(self.results.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => results.boxed(),
            Some(interval) => results.throttle(interval).boxed(),
        }
    }

    /// Latest published result, if any
    pub fn latest(&self) -> Option<Arc<PollResult>> {
        self.results.borrow().clone()
    }

    /// Stop the poller without dropping the connection
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for RoundConnection {
    fn drop(&mut self) {
        debug!("Dropping round connection");
        self.cancel.cancel();
    }
}
