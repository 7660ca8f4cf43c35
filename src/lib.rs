//! # Spacesweep
//!
//! Batched, governance-aware bulk deletion for knowledge-graph spaces.
//!
//! Spacesweep enumerates the entities and relations of a space through a
//! GraphQL read replica, partitions them into bounded batches, and drives
//! each batch through the space's write protocol: a single direct publish
//! for personal spaces, or propose, vote, threshold-check and execute for
//! governed spaces.
//!
//! ## Features
//!
//! - Cursor-paginated enumeration with type allow/deny filters
//! - Deterministic, relations-first batch planning with op-cost estimates
//! - One author identity per space, reused across batches and runs
//! - Sequential single-writer submission with on-chain confirmation waits
//! - Drain mode: repeat passes until the space is empty or stops shrinking
//! - Append-only JSONL progress trail per target space
//!
//! ## Example
//!
//! ```rust,ignore
//! use spacesweep::graph::{GovernanceScript, InMemorySpace};
//! use spacesweep::sweep::{SweepOptions, SweepRunner};
//! use spacesweep::GovernanceMode;
//!
//! let space = InMemorySpace::new(space_id).with_governance(GovernanceScript::AutoExecute);
//! let options = SweepOptions::new(space_id, GovernanceMode::Governed)
//!     .with_voter_space(Some(personal_space_id));
//! let report = SweepRunner::new(&space, &space, options).run()?;
//! println!("{}", report.summary());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod chain;
pub mod config;
pub mod graph;
pub mod models;
pub mod observability;
pub mod session;
pub mod sweep;

pub use config::SweepConfig;
pub use models::{
    Batch, Deletion, Entity, GovernanceMode, GraphObject, ObjectCounts, ObjectId, ObjectKind,
    ProgressRecord, ProposalId, Relation, SpaceId,
};
pub use session::Session;
pub use sweep::{SweepOptions, SweepReport, SweepRunner};

/// Error type for spacesweep operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed ids, zero batch size, missing endpoint configuration |
/// | `OperationFailed` | Local I/O or serialization failures |
/// | `Upstream` | GraphQL, gateway or RPC requests fail or return errors |
/// | `Enumeration` | The enumeration step of a pass failed |
/// | `TransactionReverted` | A confirmed transaction has a failed receipt |
/// | `Timeout` | Waiting for on-chain confirmation exceeded its budget |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A local operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A remote service call failed.
    ///
    /// Raised when:
    /// - the HTTP request cannot be sent or times out
    /// - the service answers with a non-success status
    /// - a GraphQL response carries `errors`
    /// - a JSON-RPC response carries `error`
    #[error("upstream '{operation}' failed: {cause}")]
    Upstream {
        /// The remote operation.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Enumerating the target set failed; the pass is aborted.
    #[error("enumeration failed: {cause}")]
    Enumeration {
        /// The underlying cause.
        cause: String,
    },

    /// A transaction was mined but reverted.
    #[error("transaction {tx_hash} reverted")]
    TransactionReverted {
        /// Hash of the reverted transaction.
        tx_hash: String,
    },

    /// Waiting for an on-chain confirmation exceeded its budget.
    #[error("timed out after {waited_ms}ms waiting for {operation}")]
    Timeout {
        /// What was being waited on.
        operation: String,
        /// How long the wait lasted.
        waited_ms: u64,
    },
}

impl Error {
    /// Returns `true` when retrying the same idempotent call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }
}

/// Result type alias for spacesweep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Safely converts a `Duration` to milliseconds, capping at `u64::MAX`.
#[inline]
#[must_use]
pub fn duration_to_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("batch size must be positive".to_string());
        assert_eq!(err.to_string(), "invalid input: batch size must be positive");

        let err = Error::Upstream {
            operation: "graphql_entities".to_string(),
            cause: "HTTP 502".to_string(),
        };
        assert_eq!(err.to_string(), "upstream 'graphql_entities' failed: HTTP 502");

        let err = Error::Timeout {
            operation: "receipt 0xabc".to_string(),
            waited_ms: 1500,
        };
        assert_eq!(
            err.to_string(),
            "timed out after 1500ms waiting for receipt 0xabc"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            Error::Upstream {
                operation: "x".to_string(),
                cause: "y".to_string()
            }
            .is_transient()
        );
        assert!(!Error::InvalidInput("x".to_string()).is_transient());
        assert!(
            !Error::TransactionReverted {
                tx_hash: "0x1".to_string()
            }
            .is_transient()
        );
    }
}
