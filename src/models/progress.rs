//! Progress records.

use super::id::SpaceId;
use super::object::ObjectCounts;
use super::space::GovernanceMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable entry in a target's progress trail, written once per pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// When the pass finished.
    pub timestamp: DateTime<Utc>,
    /// Target space.
    pub space_id: SpaceId,
    /// One-based pass number within the run.
    pub pass: u32,
    /// Write path used.
    pub mode: GovernanceMode,
    /// Configured batch size.
    pub batch_size: usize,
    /// Counts observed before the pass.
    pub counts_before: ObjectCounts,
    /// Counts observed after the pass.
    pub counts_after: ObjectCounts,
    /// Logical ops submitted.
    pub ops_attempted: usize,
    /// Batches whose transactions went through (including pending proposals).
    pub batches_completed: usize,
    /// Batches that failed at any step.
    pub batches_failed: usize,
    /// Completed batches whose proposal still awaits other voters.
    #[serde(default)]
    pub batches_pending_threshold: usize,
    /// Wall-clock duration of the pass.
    pub elapsed_ms: u64,
    /// The pass stopped early.
    #[serde(default)]
    pub aborted: bool,
    /// Why the pass was aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressRecord {
    /// Objects that disappeared during the pass.
    #[must_use]
    pub const fn removed(&self) -> u64 {
        self.counts_before.removed_since(&self.counts_after)
    }
}
