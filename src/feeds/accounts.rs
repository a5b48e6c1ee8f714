//! Account balances and the holders leaderboard
//!
//! Single balances come from the node (`/v2/accounts/{address}`), the holder
//! list from the indexer. Both report amounts in microunits.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{FeedSource, fetch_json, http_client};
use crate::config::{HoldersConfig, PollerConfig, parse_base_url};
use crate::{PollError, Result};

pub const MICROUNITS_PER_UNIT: f64 = 1_000_000.0;

/// Treasury and fee sink accounts that never appear on the leaderboard
pub const EXCLUDED_ACCOUNTS: [&str; 4] = [
    "SDLCDDT7GAREOI5TJAZGIMXKPYYCPQVY4DXY75GHWHLKU7SZYVXVL5VIDY",
    "OO2VQ53ELOU2QRKFF6NMTEOOXVHPABSBRN3QVKSTEJOJHTU2DNSHCAOJIY",
    "7KA2VKJHXN3XS6CC4HICONHMGTZORJKBQOV5JIYQAAFKQRZMPMCCXBVRBI",
    "FEES3ZW52HQ7U7LB3OGLUFQX2DCCWPJ2LIMXAH75KYROBZBQRN3Q5OR3GI",
];

/// One leaderboard entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Holder {
    pub address: String,
    /// Balance in whole units
    pub balance: f64,
}

pub fn micro_to_units(amount: u64) -> f64 {
    amount as f64 / MICROUNITS_PER_UNIT
}

/// Balance in whole units from a node account document
pub fn parse_account_balance(address: &str, account: &Value) -> Result<f64> {
    account
        .get("amount")
        .and_then(Value::as_u64)
        .map(micro_to_units)
        .ok_or_else(|| PollError::parse_error(format!("account {address}"), "response lacks amount"))
}

/// Addresses listed under `bparts` and `bots` of a ballast document
pub fn parse_ballast(document: &Value) -> Result<BTreeSet<String>> {
    let mut addresses = BTreeSet::new();
    for group in ["bparts", "bots"] {
        let members = document
            .get(group)
            .and_then(Value::as_object)
            .ok_or_else(|| PollError::parse_error("ballast", format!("response lacks {group}")))?;
        addresses.extend(members.keys().cloned());
    }
    Ok(addresses)
}

/// Holders from an indexer accounts page, richest first, without `excluded`
pub fn rank_holders(document: &Value, excluded: &BTreeSet<String>) -> Result<Vec<Holder>> {
    let accounts = document
        .get("accounts")
        .and_then(Value::as_array)
        .ok_or_else(|| PollError::parse_error("accounts", "response lacks an accounts array"))?;

    let mut holders = Vec::with_capacity(accounts.len());
    let mut skipped = 0usize;
    for account in accounts {
        let address = account.get("address").and_then(Value::as_str);
        let amount = account.get("amount").and_then(Value::as_u64);
        match (address, amount) {
            (Some(address), _) if excluded.contains(address) => {}
            (Some(address), Some(amount)) => holders
                .push(Holder { address: address.to_string(), balance: micro_to_units(amount) }),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = holders.len(), "Skipped malformed account entries");
    }

    holders.sort_by(|a, b| b.balance.total_cmp(&a.balance));
    Ok(holders)
}

/// Leaderboard source reading holders from the indexer
pub struct HoldersSource {
    client: Client,
    accounts_url: String,
    ballast_url: String,
    timeout: Duration,
}

impl HoldersSource {
    pub fn new(config: &HoldersConfig) -> Result<Self> {
        config.validate()?;
        let indexer = parse_base_url("indexer_url", &config.indexer_url)?;
        let ballast = parse_base_url("ballast_url", &config.ballast_url)?;
        let timeout = config.request_timeout();

        Ok(Self {
            client: http_client(timeout)?,
            accounts_url: format!(
                "{}/v2/accounts?limit={}&currency-greater-than={}",
                indexer.as_str().trim_end_matches('/'),
                config.limit,
                config.min_balance
            ),
            ballast_url: ballast.to_string(),
            timeout,
        })
    }

    /// Fixed exclusions plus the current ballast list. Without a ballast
    /// list only the fixed accounts are excluded.
    async fn excluded_accounts(&self) -> BTreeSet<String> {
        let mut excluded: BTreeSet<String> =
            EXCLUDED_ACCOUNTS.iter().map(|address| address.to_string()).collect();

        let ballast = fetch_json(&self.client, &self.ballast_url, self.timeout)
            .await
            .and_then(|document| parse_ballast(&document));
        match ballast {
            Ok(addresses) => {
                debug!(count = addresses.len(), "Loaded ballast accounts");
                excluded.extend(addresses);
            }
            Err(e) => warn!(error = %e, "Ballast list unavailable, excluding fixed accounts only"),
        }

        excluded
    }
}

#[async_trait::async_trait]
impl FeedSource for HoldersSource {
    type Item = Holder;

    async fn fetch(&self) -> Result<Vec<Holder>> {
        let excluded = self.excluded_accounts().await;
        let document = fetch_json(&self.client, &self.accounts_url, self.timeout).await?;
        rank_holders(&document, &excluded)
    }

    fn name(&self) -> &str {
        &self.accounts_url
    }
}

/// Balance lookups against the node account endpoint
///
/// Proposal statistics are scored per unit of stake with
/// [`ProposerStats::proposer_score`](super::ProposerStats::proposer_score);
/// this supplies those balances.
#[derive(Clone)]
pub struct BalanceLookup {
    client: Client,
    algod_base: String,
    timeout: Duration,
}

impl BalanceLookup {
    pub fn new(config: &PollerConfig) -> Result<Self> {
        config.validate()?;
        let algod = parse_base_url("algod_url", &config.algod_url)?;
        let timeout = config.request_timeout();

        Ok(Self {
            client: http_client(timeout)?,
            algod_base: algod.as_str().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn account_url(&self, address: &str) -> String {
        format!("{}/v2/accounts/{}", self.algod_base, address)
    }

    /// Balance of one account in whole units
    pub async fn balance(&self, address: &str) -> Result<f64> {
        let account = fetch_json(&self.client, &self.account_url(address), self.timeout).await?;
        parse_account_balance(address, &account)
    }

    /// Balances of several accounts, looked up concurrently. Accounts whose
    /// lookup fails are left out.
    pub async fn balances<'a>(
        &self,
        addresses: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, f64> {
        let lookups = addresses
            .into_iter()
            .map(|address| async move { (address, self.balance(address).await) });

        let mut balances = BTreeMap::new();
        for (address, result) in join_all(lookups).await {
            match result {
                Ok(balance) => {
                    balances.insert(address.to_string(), balance);
                }
                Err(e) => warn!(address, error = %e, "Balance lookup failed"),
            }
        }
        balances
    }
}
