//! Poller and feed configuration

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{PollError, Result};

/// Public Voi testnet node API.
pub const DEFAULT_ALGOD_URL: &str = "https://testnet-api.voi.nodly.io";

/// Public Voi testnet indexer.
pub const DEFAULT_INDEXER_URL: &str = "https://testnet-idx.voi.nodly.io";

/// Fixed delay between retries of a failed call.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

/// Iterations starting further apart than this trigger a resync.
pub const DEFAULT_STALE_AFTER_MS: u64 = 5 * 5_000;

/// How far the tracked round may lead a fetched round before a resync.
pub const DEFAULT_MAX_ROUND_GAP: u64 = 4;

/// Must outlive one round, since the long-poll is held open until then.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;

/// Node score tables refresh hourly.
pub const DEFAULT_FEED_INTERVAL_MS: u64 = 3_600_000;

/// Analytics endpoint listing consensus ballast accounts.
pub const DEFAULT_BALLAST_URL: &str = "https://analytics.testnet.voi.nodly.io/v0/consensus/ballast";

/// Largest page of holders requested from the indexer.
pub const DEFAULT_HOLDERS_LIMIT: u32 = 20_000;

/// Accounts at or below this many microunits are not holders.
pub const DEFAULT_MIN_HOLDER_BALANCE: u64 = 1;

/// Settings for the round-tracking poller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Base URL of the node status API
    pub algod_url: String,
    /// Base URL of the transaction indexer
    pub indexer_url: String,
    pub retry_delay_ms: u64,
    pub stale_after_ms: u64,
    pub max_round_gap: u64,
    pub request_timeout_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            algod_url: DEFAULT_ALGOD_URL.to_string(),
            indexer_url: DEFAULT_INDEXER_URL.to_string(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            max_round_gap: DEFAULT_MAX_ROUND_GAP,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl PollerConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            PollError::config_error(format!("unable to read {}: {err}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|err| PollError::config_error(format!("unable to parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unusable endpoints and zero delays.
    pub fn validate(&self) -> Result<()> {
        parse_base_url("algod_url", &self.algod_url)?;
        parse_base_url("indexer_url", &self.indexer_url)?;

        for (name, value) in [
            ("retry_delay_ms", self.retry_delay_ms),
            ("stale_after_ms", self.stale_after_ms),
            ("request_timeout_ms", self.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(PollError::config_error(format!("{name} must be greater than zero")));
            }
        }

        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Settings for one interval feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Full URL of the feed document
    pub url: String,
    #[serde(default = "default_feed_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_feed_interval_ms() -> u64 {
    DEFAULT_FEED_INTERVAL_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl FeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval_ms: DEFAULT_FEED_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        parse_base_url("url", &self.url)?;
        if self.interval_ms == 0 {
            return Err(PollError::config_error("interval_ms must be greater than zero"));
        }
        if self.request_timeout_ms == 0 {
            return Err(PollError::config_error("request_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Settings for the holders leaderboard feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldersConfig {
    /// Base URL of the indexer listing accounts
    pub indexer_url: String,
    /// Full URL of the ballast account list
    pub ballast_url: String,
    pub limit: u32,
    /// Exclusive lower bound on balances, in microunits
    pub min_balance: u64,
    pub interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for HoldersConfig {
    fn default() -> Self {
        Self {
            indexer_url: DEFAULT_INDEXER_URL.to_string(),
            ballast_url: DEFAULT_BALLAST_URL.to_string(),
            limit: DEFAULT_HOLDERS_LIMIT,
            min_balance: DEFAULT_MIN_HOLDER_BALANCE,
            interval_ms: DEFAULT_FEED_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl HoldersConfig {
    pub fn validate(&self) -> Result<()> {
        parse_base_url("indexer_url", &self.indexer_url)?;
        parse_base_url("ballast_url", &self.ballast_url)?;

        if self.limit == 0 {
            return Err(PollError::config_error("limit must be greater than zero"));
        }
        if self.interval_ms == 0 {
            return Err(PollError::config_error("interval_ms must be greater than zero"));
        }
        if self.request_timeout_ms == 0 {
            return Err(PollError::config_error("request_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Parse a configured base URL, dropping any trailing slash so paths can be appended.
pub(crate) fn parse_base_url(name: &str, raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(PollError::config_error(format!("{name} must not be empty")));
    }

    let url = Url::parse(trimmed)
        .map_err(|err| PollError::config_error(format!("{name} '{raw}' is invalid: {err}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(PollError::config_error(format!("{name} uses unsupported scheme {scheme}"))),
    }
}
