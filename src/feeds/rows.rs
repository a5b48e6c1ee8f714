//! Positional row decoding for analytics feeds
//!
//! The analytics services answer with `{ "data": [[...], [...]] }`, where each
//! row is an array of loosely typed columns. Numbers may arrive either as JSON
//! numbers or as numeric strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{PollError, Result};

/// A row type decoded from one positional feed row
pub trait FeedRow: Sized + Send + Sync + 'static {
    /// Decode a row, or `None` when a required column is missing or malformed
    fn from_row(row: &[Value]) -> Option<Self>;
}

/// Decode every row of a feed document. Malformed rows are skipped.
pub fn decode_rows<R: FeedRow>(context: &str, document: &Value) -> Result<Vec<R>> {
    let rows = document
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| PollError::parse_error(context.to_string(), "response lacks a data array"))?;

    let mut decoded = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        match row.as_array().and_then(|columns| R::from_row(columns)) {
            Some(item) => decoded.push(item),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(context, skipped, kept = decoded.len(), "Skipped malformed feed rows");
    }

    Ok(decoded)
}

fn text(row: &[Value], index: usize) -> Option<String> {
    match row.get(index)? {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn optional_text(row: &[Value], index: usize) -> Option<String> {
    text(row, index).filter(|s| !s.is_empty())
}

fn float(row: &[Value], index: usize) -> Option<f64> {
    match row.get(index)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-negative integer column. Fractions truncate toward zero; a negative
/// value is malformed, so a required count column rejects the row.
fn count(row: &[Value], index: usize) -> Option<u64> {
    match row.get(index)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Per-node health scores from the hourly/daily analytics tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct NodeScore {
    pub host: String,
    pub name: String,
    pub score: f64,
    pub liveness_score: f64,
    pub voting_score: f64,
    pub network_score: f64,
    pub address_count: u64,
    pub soft_votes: u64,
    pub cert_votes: u64,
    pub proposals: u64,
    pub missed_blocks: u64,
}

impl FeedRow for NodeScore {
    fn from_row(row: &[Value]) -> Option<Self> {
        Some(Self {
            host: text(row, 0)?,
            name: text(row, 1)?,
            score: float(row, 2)?,
            liveness_score: float(row, 3)?,
            voting_score: float(row, 4)?,
            network_score: float(row, 5)?,
            address_count: count(row, 6)?,
            soft_votes: count(row, 7)?,
            cert_votes: count(row, 8)?,
            proposals: count(row, 9)?,
            missed_blocks: count(row, 10)?,
        })
    }
}

/// Daily consensus participation of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ProposerStats {
    pub sender: String,
    pub soft_votes: u64,
    pub soft_tokens: f64,
    pub cert_votes: u64,
    pub cert_tokens: f64,
    pub q05_latency: Option<f64>,
    pub proposals: u64,
    pub last_soft_vote: Option<String>,
    pub last_cert_vote: Option<String>,
    pub last_proposal: Option<String>,
    pub avg_pct_on_time: Option<f64>,
}

impl ProposerStats {
    /// Accepted proposals per 100k of stake. An unknown or zero balance counts as 1.
    pub fn proposer_score(&self, balance: Option<f64>) -> f64 {
        let balance = balance.filter(|b| *b > 0.0).unwrap_or(1.0);
        self.proposals as f64 / balance * 100_000.0
    }
}

impl FeedRow for ProposerStats {
    fn from_row(row: &[Value]) -> Option<Self> {
        Some(Self {
            sender: text(row, 0)?,
            soft_votes: count(row, 1).unwrap_or(0),
            soft_tokens: float(row, 2).unwrap_or(0.0),
            cert_votes: count(row, 3).unwrap_or(0),
            cert_tokens: float(row, 4).unwrap_or(0.0),
            q05_latency: float(row, 5),
            proposals: count(row, 6)?,
            last_soft_vote: optional_text(row, 7),
            last_cert_vote: optional_text(row, 8),
            last_proposal: optional_text(row, 9),
            avg_pct_on_time: float(row, 10),
        })
    }
}
