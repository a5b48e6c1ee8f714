//! HTTP round source backed by the public node and indexer APIs

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::{PollerConfig, parse_base_url};
use crate::source::RoundSource;
use crate::types::{PollResult, Position};
use crate::{PollError, Result};

/// Round source that long-polls an algod-compatible node and counts
/// transactions through an indexer
#[derive(Clone)]
pub struct HttpRoundSource {
    client: Client,
    algod_base: String,
    indexer_base: String,
    timeout: Duration,
}

impl HttpRoundSource {
    /// Build a source from a validated configuration.
    pub fn new(config: &PollerConfig) -> Result<Self> {
        config.validate()?;

        let algod = parse_base_url("algod_url", &config.algod_url)?;
        let indexer = parse_base_url("indexer_url", &config.indexer_url)?;
        let timeout = config.request_timeout();

        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            PollError::network_failed_with_source("unable to build HTTP client", Box::new(err))
        })?;

        Ok(Self {
            client,
            algod_base: algod.as_str().trim_end_matches('/').to_string(),
            indexer_base: indexer.as_str().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn status_url(&self) -> String {
        format!("{}/v2/status", self.algod_base)
    }

    fn wait_url(&self, from: Position) -> String {
        format!("{}/v2/status/wait-for-block-after/{}", self.algod_base, from)
    }

    fn transactions_url(&self, round: Position) -> String {
        format!("{}/v2/transactions?round={}", self.indexer_base, round)
    }

    /// Issue a GET and return the raw body of a successful response.
    async fn get_text(&self, url: &str) -> Result<String> {
        trace!(url, "GET");

        let response = self.client.get(url).send().await.map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_status_error(url, status));
        }

        response.text().await.map_err(|err| self.transport_error(err))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body)
            .map_err(|err| PollError::parse_error(url.to_string(), err.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> PollError {
        if err.is_timeout() {
            PollError::Timeout { duration: self.timeout }
        } else {
            err.into()
        }
    }
}

#[async_trait::async_trait]
impl RoundSource for HttpRoundSource {
    async fn fetch_initial_position(&self) -> Result<Position> {
        let url = self.status_url();
        let status = self.get_json(&url).await?;
        let position = parse_last_round(&status)?;
        debug!(%position, "Fetched last round from status endpoint");
        Ok(position)
    }

    async fn await_next_position(&self, from: Position) -> Result<PollResult> {
        let started = Instant::now();

        // Only the arrival of a response matters; its body is not consumed
        self.get_text(&self.wait_url(from)).await?;
        let position = from.next();

        let url = self.transactions_url(position);
        let body = self.get_text(&url).await?;
        let auxiliary_count = match count_transactions(&url, &body) {
            Ok(count) => count,
            Err(e) => {
                warn!(%position, error = %e, "Treating unusable transaction payload as empty");
                0
            }
        };

        Ok(PollResult::new(position, started.elapsed(), auxiliary_count))
    }

    fn name(&self) -> &str {
        &self.algod_base
    }
}

fn http_status_error(url: &str, status: StatusCode) -> PollError {
    PollError::network_failed(format!("GET {url} returned HTTP {status}"))
}

/// Extract `last-round` from a node status document.
pub fn parse_last_round(status: &Value) -> Result<Position> {
    match status.get("last-round") {
        Some(Value::Number(n)) => n.as_u64().map(Position).ok_or_else(|| {
            PollError::parse_error("status", format!("last-round {n} is not an unsigned integer"))
        }),
        Some(other) => {
            Err(PollError::parse_error("status", format!("last-round has unexpected value {other}")))
        }
        None => Err(PollError::parse_error("status", "response lacks last-round")),
    }
}

/// Count the entries of the `transactions` array in an indexer response body.
pub fn count_transactions(endpoint: &str, body: &str) -> Result<usize> {
    let value: Value =
        serde_json::from_str(body).map_err(|_| PollError::empty_response(endpoint))?;

    value
        .get("transactions")
        .and_then(Value::as_array)
        .map(Vec::len)
        .ok_or_else(|| PollError::empty_response(endpoint))
}
