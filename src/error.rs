//! Error types for round polling.
//!
//! All errors implement the `std::error::Error` trait and carry enough context
//! to tell a transport failure apart from a malformed payload in the logs.
//!
//! ## Error Categories
//!
//! - **Network Errors**: Transport failures and non-success HTTP statuses
//! - **Parse Errors**: A successful response that lacks an expected field
//! - **Empty Responses**: An auxiliary payload without a usable record list
//! - **Timeouts**: A request exceeded the configured timeout
//! - **Config Errors**: Invalid endpoints or delays
//! - **Store Errors**: Preference file I/O or encoding failures
//!
//! ## Recovery and Retry
//!
//! The poller absorbs every retryable error itself. Errors still describe
//! whether they are worth retrying:
//!
//! ```rust
//! use roundwatch::PollError;
//!
//! let error = PollError::network_failed("connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for polling operations.
pub type Result<T, E = PollError> = std::result::Result<T, E>;

/// Main error type for polling operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PollError {
    #[error("Network request failed: {reason}")]
    Network {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Empty response from {endpoint}")]
    EmptyResponse { endpoint: String },

    #[error("Request timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Preference store error: {path}")]
    Store {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PollError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Parse errors are retried by the poller like network errors; the remote
    /// side may simply have served a partial document.
    pub fn is_retryable(&self) -> bool {
        match self {
            PollError::Network { .. } => true,
            PollError::Timeout { .. } => true,
            PollError::Parse { .. } => true,
            PollError::EmptyResponse { .. } => false,
            PollError::Config { .. } => false,
            PollError::Store { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PollError::Network { .. } => vec![
                "Check network connectivity to the node API",
                "Verify the configured algod and indexer URLs",
                "Wait for the remote service to recover",
            ],
            PollError::Parse { .. } => vec![
                "Check that the endpoint serves the expected API version",
                "Verify the response is JSON and not an error page",
            ],
            PollError::EmptyResponse { .. } => vec![
                "Check that the indexer has caught up with the requested round",
                "Treat the record count as zero for this round",
            ],
            PollError::Timeout { .. } => vec![
                "Increase request_timeout_ms above the network's round time",
                "Check the remote service latency",
            ],
            PollError::Config { .. } => vec![
                "Check URLs include a scheme such as https://",
                "Use non-zero delays and timeouts",
            ],
            PollError::Store { .. } => vec![
                "Check the preference file is readable and writable",
                "Remove a corrupted preference file to start fresh",
            ],
        }
    }

    /// Helper constructor for network errors.
    pub fn network_failed(reason: impl Into<String>) -> Self {
        PollError::Network { reason: reason.into(), source: None }
    }

    /// Helper constructor for network errors with source.
    pub fn network_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        PollError::Network { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        PollError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for empty auxiliary payloads.
    pub fn empty_response(endpoint: impl Into<String>) -> Self {
        PollError::EmptyResponse { endpoint: endpoint.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        PollError::Config { reason: reason.into() }
    }

    /// Helper constructor for preference store errors with path context.
    pub fn store_error(
        path: PathBuf,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        PollError::Store { path, source: source.into() }
    }

    /// Short label used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Network { .. } => "network",
            PollError::Parse { .. } => "parse",
            PollError::EmptyResponse { .. } => "empty_response",
            PollError::Timeout { .. } => "timeout",
            PollError::Config { .. } => "config",
            PollError::Store { .. } => "store",
        }
    }
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return PollError::Parse { context: "response body".to_string(), details: err.to_string() };
        }

        let reason = match err.url() {
            Some(url) => format!("request to {} failed", url),
            None => "request failed".to_string(),
        };
        PollError::Network { reason, source: Some(Box::new(err)) }
    }
}

impl From<serde_json::Error> for PollError {
    fn from(err: serde_json::Error) -> Self {
        PollError::Parse { context: "JSON payload".to_string(), details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_format_correctly_with_arbitrary_context(
            reason in ".*",
            context in "\\w+",
            details in ".*",
            duration_ms in 1u64..60000u64
          ) {
            let network_error = PollError::network_failed(reason.clone());
            let parse_error = PollError::parse_error(context.clone(), details.clone());
            let timeout_error = PollError::Timeout { duration: Duration::from_millis(duration_ms) };

            prop_assert!(network_error.to_string().contains(&reason));

            let parse_msg = parse_error.to_string();
            prop_assert!(parse_msg.contains(&context));
            prop_assert!(parse_msg.contains(&details));

            prop_assert!(!timeout_error.to_string().is_empty());
          }

          #[test]
          fn error_source_chaining_preserves_information(
            base_message in ".*",
            reasons in prop::collection::vec(".*", 1..5)
          ) {
            let mut current: Box<dyn std::error::Error + Send + Sync> =
              Box::new(std::io::Error::other(base_message.clone()));

            for reason in &reasons {
              current = Box::new(PollError::network_failed_with_source(reason.clone(), current));
            }

            let mut depth = 0;
            let mut found_base = false;
            let mut cursor = std::error::Error::source(current.as_ref());
            while let Some(source) = cursor {
              depth += 1;
              if source.to_string().contains(&base_message) {
                found_base = true;
              }
              cursor = std::error::Error::source(source);
            }

            prop_assert_eq!(depth, reasons.len());
            prop_assert!(found_base);
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<PollError>();

        let error = PollError::network_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn network_and_parse_errors_share_retry_policy() {
        assert!(PollError::network_failed("down").is_retryable());
        assert!(PollError::parse_error("status", "missing last-round").is_retryable());
        assert!(PollError::Timeout { duration: Duration::from_secs(60) }.is_retryable());

        assert!(!PollError::empty_response("/v2/transactions").is_retryable());
        assert!(!PollError::config_error("bad url").is_retryable());

        // Same policy, different diagnostics
        assert_ne!(PollError::network_failed("x").kind(), PollError::parse_error("y", "z").kind());
    }

    #[test]
    fn recovery_suggestions_are_descriptive() {
        let errors = [
            PollError::network_failed("test"),
            PollError::parse_error("status", "missing field"),
            PollError::empty_response("transactions"),
            PollError::config_error("zero delay"),
            PollError::store_error(PathBuf::from("/tmp/prefs.yaml"), std::io::Error::other("denied")),
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }

    #[test]
    fn serde_json_errors_become_parse_errors() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let converted: PollError = err.into();
        assert!(matches!(converted, PollError::Parse { .. }));
    }
}
