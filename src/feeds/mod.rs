//! Interval feeds for slow-changing datasets
//!
//! Node score tables, proposal statistics and the holders leaderboard change
//! on the order of hours. An [`IntervalFeed`] fetches such a dataset once on
//! start and then on a fixed interval, publishing the latest good snapshot
//! through a watch channel. A failed refresh keeps the previous snapshot.

mod accounts;
mod rows;

pub use accounts::{
    BalanceLookup, EXCLUDED_ACCOUNTS, Holder, HoldersSource, MICROUNITS_PER_UNIT, micro_to_units,
    parse_account_balance, parse_ballast, rank_holders,
};
pub use rows::{FeedRow, NodeScore, ProposerStats, decode_rows};

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{FeedConfig, HoldersConfig, parse_base_url};
use crate::{PollError, Result};

pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder().timeout(timeout).build().map_err(|err| {
        PollError::network_failed_with_source("unable to build HTTP client", Box::new(err))
    })
}

/// GET `url` and decode a successful response as JSON
pub(crate) async fn fetch_json(client: &Client, url: &str, timeout: Duration) -> Result<Value> {
    trace!(url, "GET");
    let transport_error = |err: reqwest::Error| {
        if err.is_timeout() { PollError::Timeout { duration: timeout } } else { PollError::from(err) }
    };

    let response = client.get(url).send().await.map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(PollError::network_failed(format!("GET {url} returned HTTP {status}")));
    }

    response.json().await.map_err(transport_error)
}

/// Trait for periodically refreshed datasets
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync + 'static {
    type Item: Send + Sync + 'static;

    /// Fetch the complete current dataset
    async fn fetch(&self) -> Result<Vec<Self::Item>>;

    /// Human readable name used in log output
    fn name(&self) -> &str;
}

/// Feed source reading positional rows from an analytics endpoint
pub struct HttpFeedSource<R> {
    client: Client,
    url: String,
    timeout: Duration,
    _rows: PhantomData<fn() -> R>,
}

impl<R: FeedRow> HttpFeedSource<R> {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        config.validate()?;
        let url = parse_base_url("url", &config.url)?;
        let timeout = config.request_timeout();
        let client = http_client(timeout)?;

        Ok(Self { client, url: url.to_string(), timeout, _rows: PhantomData })
    }
}

#[async_trait::async_trait]
impl<R: FeedRow> FeedSource for HttpFeedSource<R> {
    type Item = R;

    async fn fetch(&self) -> Result<Vec<R>> {
        let document = fetch_json(&self.client, &self.url, self.timeout).await?;
        decode_rows(&self.url, &document)
    }

    fn name(&self) -> &str {
        &self.url
    }
}

/// Latest snapshot of a feed
pub type Snapshot<T> = Arc<Vec<T>>;

/// Handle to a spawned interval feed
///
/// Dropping the handle stops the refresh task.
pub struct IntervalFeed<T> {
    snapshots: watch::Receiver<Option<Snapshot<T>>>,
    cancel: CancellationToken,
}

impl<T: Send + Sync + 'static> IntervalFeed<T> {
    /// Spawn a refresh task that fetches now and then every `period`
    pub fn spawn<S>(source: S, period: Duration) -> Self
    where
        S: FeedSource<Item = T>,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::refresh_task(source, period, snapshot_tx, cancel_task).await;
        });

        Self { snapshots: snapshot_rx, cancel }
    }

    async fn refresh_task<S>(
        source: S,
        period: Duration,
        snapshot_tx: watch::Sender<Option<Snapshot<T>>>,
        cancel: CancellationToken,
    ) where
        S: FeedSource<Item = T>,
    {
        info!(feed = source.name(), ?period, "Feed refresh task started");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refreshes = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match source.fetch().await {
                Ok(items) => {
                    refreshes += 1;
                    debug!(feed = source.name(), items = items.len(), "Feed refreshed");
                    if snapshot_tx.send(Some(Arc::new(items))).is_err() {
                        debug!("Feed receiver dropped, shutting down");
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        feed = source.name(),
                        kind = e.kind(),
                        "Feed refresh failed, keeping previous snapshot: {}",
                        e
                    );
                }
            }
        }

        info!(feed = source.name(), "Feed refresh task ended after {} refreshes", refreshes);
    }

    /// Latest good snapshot, if any refresh has succeeded
    pub fn latest(&self) -> Option<Snapshot<T>> {
        self.snapshots.borrow().clone()
    }

    /// Watch receiver for snapshot changes
    pub fn watch(&self) -> watch::Receiver<Option<Snapshot<T>>> {
        self.snapshots.clone()
    }
}

impl<T> Drop for IntervalFeed<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn an hourly node score feed from `config`
pub fn node_scores(config: &FeedConfig) -> Result<IntervalFeed<NodeScore>> {
    let source = HttpFeedSource::<NodeScore>::new(config)?;
    Ok(IntervalFeed::spawn(source, config.interval()))
}

/// Spawn a proposal statistics feed from `config`
pub fn proposer_stats(config: &FeedConfig) -> Result<IntervalFeed<ProposerStats>> {
    let source = HttpFeedSource::<ProposerStats>::new(config)?;
    Ok(IntervalFeed::spawn(source, config.interval()))
}

/// Spawn a holders leaderboard feed from `config`
pub fn holders(config: &HoldersConfig) -> Result<IntervalFeed<Holder>> {
    let source = HoldersSource::new(config)?;
    Ok(IntervalFeed::spawn(source, config.interval()))
}
