//! Persistent string preferences
//!
//! A small string-keyed store for view preferences such as the selected node
//! and table name filters. It is read once when opened and written through on
//! every change. Each key has a single writer, so the last write wins.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{PollError, Result};

/// Key holding the node shown on the "my node" view
pub const SELECTED_NODE_KEY: &str = "node.selected";

/// Key holding the name filter of the node score table
pub const NODE_FILTER_KEY: &str = "filters.nodes";

/// Key holding the name filter of the consensus table
pub const CONSENSUS_FILTER_KEY: &str = "filters.consensus";

/// Node selected when nothing has been stored yet
pub const DEFAULT_SELECTED_NODE: &str = "Boeieruurd-Cloud-Node";

/// String key/value preferences, optionally backed by a YAML file
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

impl PreferenceStore {
    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_yaml_ng::from_str(&content)
                .map_err(|err| PollError::store_error(path.clone(), err))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No preference file yet, starting empty");
                BTreeMap::new()
            }
            Err(err) => return Err(PollError::store_error(path, err)),
        };

        Ok(Self { path: Some(path), values })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Store `value` under `key` and persist the store
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        if self.values.get(&key) == Some(&value) {
            return Ok(());
        }

        let mut values = self.values.clone();
        values.insert(key, value);
        self.commit(values)
    }

    /// Remove `key`, returning its previous value
    pub fn remove(&mut self, key: &str) -> Result<Option<String>> {
        if !self.values.contains_key(key) {
            return Ok(None);
        }

        let mut values = self.values.clone();
        let previous = values.remove(key);
        self.commit(values)?;
        Ok(previous)
    }

    /// The node shown on the "my node" view
    pub fn selected_node(&self) -> &str {
        self.get(SELECTED_NODE_KEY).unwrap_or(DEFAULT_SELECTED_NODE)
    }

    pub fn set_selected_node(&mut self, name: impl Into<String>) -> Result<()> {
        self.set(SELECTED_NODE_KEY, name)
    }

    /// The name filter stored under `key`. An unreadable value counts as no filter.
    pub fn name_filter(&self, key: &str) -> NameFilter {
        let Some(raw) = self.get(key) else {
            return NameFilter::default();
        };

        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(names) => NameFilter::new(names),
            Err(err) => {
                warn!(key, error = %err, "Ignoring unreadable name filter");
                NameFilter::default()
            }
        }
    }

    pub fn set_name_filter(&mut self, key: &str, filter: &NameFilter) -> Result<()> {
        let encoded = serde_json::to_string(&filter.names)?;
        self.set(key, encoded)
    }

    /// Persist `values` and adopt them only once they are on disk
    fn commit(&mut self, values: BTreeMap<String, String>) -> Result<()> {
        self.persist(&values)?;
        self.values = values;
        Ok(())
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let encoded = serde_yaml_ng::to_string(values)
            .map_err(|err| PollError::store_error(path.clone(), err))?;

        // Write beside the target and rename so a crash never leaves half a file
        let staging = path.with_extension("tmp");
        fs::write(&staging, encoded).map_err(|err| PollError::store_error(staging.clone(), err))?;
        fs::rename(&staging, path).map_err(|err| PollError::store_error(path.clone(), err))?;

        debug!(path = %path.display(), keys = values.len(), "Preferences saved");
        Ok(())
    }
}

/// A set of selected names. An empty filter selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    names: Vec<String>,
}

impl NameFilter {
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
