//! Write-side abstraction.

use crate::Result;
use crate::models::{AuthorIdentity, ProposalId, ProposalStatus, SpaceId, VoteOption, VotingMode};
use crate::sweep::Op;

/// A write transaction that has been mined successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Transaction hash.
    pub tx_hash: String,
    /// Block the transaction was mined in, when known.
    pub block_number: Option<u64>,
    /// Proposal created by the transaction, for propose calls.
    pub proposal_id: Option<ProposalId>,
}

impl Confirmation {
    /// Creates a confirmation for `tx_hash`.
    #[must_use]
    pub fn new(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            block_number: None,
            proposal_id: None,
        }
    }

    /// Sets the block number.
    #[must_use]
    pub const fn with_block_number(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    /// Sets the created proposal.
    #[must_use]
    pub const fn with_proposal(mut self, proposal_id: ProposalId) -> Self {
        self.proposal_id = Some(proposal_id);
        self
    }
}

/// Submits mutations to a space and reports governance state.
///
/// Every write method blocks until its transaction is confirmed (or fails).
/// Implementations must not retry writes.
pub trait ChainWriter {
    /// Publishes `ops` directly to an ungoverned space.
    ///
    /// # Errors
    ///
    /// Returns an error if submission or confirmation fails.
    fn publish(
        &self,
        space: SpaceId,
        author: &AuthorIdentity,
        name: &str,
        ops: &[Op],
    ) -> Result<Confirmation>;

    /// Creates a proposal carrying `ops` in a governed space.
    ///
    /// The returned confirmation carries the new proposal id.
    ///
    /// # Errors
    ///
    /// Returns an error if submission or confirmation fails, or if no
    /// proposal id can be determined.
    fn propose(
        &self,
        space: SpaceId,
        author: &AuthorIdentity,
        ops: &[Op],
        voting_mode: VotingMode,
    ) -> Result<Confirmation>;

    /// Casts a vote on `proposal` from the operator's `voter_space`.
    ///
    /// # Errors
    ///
    /// Returns an error if submission or confirmation fails.
    fn vote(
        &self,
        proposal: ProposalId,
        voter_space: SpaceId,
        option: VoteOption,
    ) -> Result<Confirmation>;

    /// Executes a proposal whose threshold has been reached.
    ///
    /// # Errors
    ///
    /// Returns an error if submission or confirmation fails.
    fn execute(&self, proposal: ProposalId) -> Result<Confirmation>;

    /// Reads whether `proposal` has executed or reached its threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be read.
    fn proposal_status(&self, proposal: ProposalId) -> Result<ProposalStatus>;
}
