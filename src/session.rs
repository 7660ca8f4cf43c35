//! Process-wide session shared by every remote client.
//!
//! A [`Session`] is created once at startup and handed to each component as
//! an `Arc`. It owns the HTTP connection pool, the loaded configuration and
//! the operator's transaction sequence, so there is exactly one owner of the
//! signing identity per process.

use crate::chain::{RetryPolicy, SignerSequence};
use crate::config::SweepConfig;
use crate::{Error, Result};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Connect timeout applied to every client built here.
const CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Shared state for one operator process.
#[derive(Debug)]
pub struct Session {
    config: SweepConfig,
    http: Client,
    signer: SignerSequence,
    retry: RetryPolicy,
}

impl Session {
    /// Creates a session from loaded configuration.
    #[must_use]
    pub fn new(config: SweepConfig) -> Self {
        let http = build_http_client(config.timing.request_timeout_ms);
        let retry = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            http,
            signer: SignerSequence::new(),
            retry,
        }
    }

    /// Creates a shared session.
    #[must_use]
    pub fn shared(config: SweepConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Pooled blocking HTTP client.
    #[must_use]
    pub const fn http(&self) -> &Client {
        &self.http
    }

    /// The operator's transaction sequence.
    #[must_use]
    pub const fn signer(&self) -> &SignerSequence {
        &self.signer
    }

    /// Retry policy for idempotent reads.
    #[must_use]
    pub const fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// Builds a blocking HTTP client with request and connect timeouts.
#[must_use]
pub fn build_http_client(timeout_ms: u64) -> Client {
    let mut builder = Client::builder().connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS));
    if timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build HTTP client: {err}");
        Client::new()
    })
}

/// Builds an [`Error::Upstream`] for `operation`.
pub(crate) fn upstream(operation: &str, cause: impl std::fmt::Display) -> Error {
    Error::Upstream {
        operation: operation.to_string(),
        cause: cause.to_string(),
    }
}

/// Checks the status of a sent request and decodes its JSON body.
///
/// Non-success statuses become `HTTP <code>` upstream errors carrying the
/// start of the response body.
pub(crate) fn decode_json<T: DeserializeOwned>(
    response: reqwest::Result<Response>,
    operation: &str,
) -> Result<T> {
    let response = response.map_err(|e| upstream(operation, format!("request failed: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(upstream(
            operation,
            format!("HTTP {} {snippet}", status.as_u16()),
        ));
    }
    response
        .json::<T>()
        .map_err(|e| upstream(operation, format!("invalid response body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_exposes_config() {
        let config = SweepConfig::default().with_data_dir("/tmp/sweep-session");
        let session = Session::shared(config);
        assert_eq!(
            session.config().data_dir,
            std::path::PathBuf::from("/tmp/sweep-session")
        );
        assert_eq!(session.signer().peek(), None);
        assert_eq!(session.retry().max_retries(), 2);
    }

    #[test]
    fn test_upstream_error_shape() {
        let err = upstream("graphql_counts", "HTTP 503");
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "upstream 'graphql_counts' failed: HTTP 503");
    }
}
