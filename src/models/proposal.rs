//! Governance proposals.

use super::id::ProposalId;
use serde::{Deserialize, Serialize};

/// Voting mode requested for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VotingMode {
    /// Short voting window; may auto-execute once the threshold is met.
    #[default]
    Fast,
    /// Full voting window.
    Slow,
}

impl VotingMode {
    /// Parses a mode string. Unknown values fall back to `Fast`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("slow") {
            Self::Slow
        } else {
            Self::Fast
        }
    }
}

/// Vote option cast on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteOption {
    /// Affirmative vote.
    Yes,
    /// Negative vote.
    No,
}

/// Lifecycle of a proposal created by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    /// Propose transaction confirmed.
    Created,
    /// Operator's affirmative vote confirmed.
    Voted,
    /// Proposal took effect.
    Executed,
    /// Waiting on votes from other members.
    PendingThreshold,
}

/// Read-only status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStatus {
    /// The proposal has been executed (possibly in the vote transaction).
    pub executed: bool,
    /// Support has reached the execution threshold.
    pub threshold_reached: bool,
}

/// A proposal created for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Proposal id.
    pub id: ProposalId,
    /// Number of ops carried.
    pub op_count: usize,
    /// Requested voting mode.
    pub voting_mode: VotingMode,
    /// Creation time (Unix milliseconds).
    pub created_at: u64,
    /// Current state.
    pub state: ProposalState,
}

/// Result of the vote phase for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    /// Proposal voted on.
    pub proposal_id: ProposalId,
    /// The vote was confirmed.
    pub voted: bool,
    /// The proposal is executed.
    pub executed: bool,
    /// Execution happened inside the vote transaction.
    pub auto_executed: bool,
}
