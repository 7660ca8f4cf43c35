//! Per-batch write state machine.
//!
//! A batch moves through one of two paths chosen per space:
//!
//! ```text
//! direct:   Built -> Submitted -> Confirmed
//! governed: Built -> Submitted -> Proposed -> Voted -> AutoExecuted
//!                                                   -> ThresholdReached -> Executed
//!                                                   -> PendingThreshold
//! ```
//!
//! Any step may end in `Failed`. Failures are returned as values so the run
//! loop can count them and move on.

use super::ops::Op;
use crate::chain::ChainWriter;
use crate::models::{
    AuthorIdentity, Batch, GovernanceMode, Proposal, ProposalState, SpaceId, VoteOption,
    VoteResult, VotingMode,
};
use crate::{Error, Result};
use std::fmt;
use std::time::Instant;

/// State of one batch's write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    /// Ops assembled, nothing sent.
    Built,
    /// Transaction sent.
    Submitted,
    /// Direct publish mined.
    Confirmed,
    /// Propose transaction mined; proposal id known.
    Proposed,
    /// Operator's vote mined.
    Voted,
    /// The vote executed the proposal.
    AutoExecuted,
    /// Support threshold met; execution pending.
    ThresholdReached,
    /// Explicit execute mined.
    Executed,
    /// Waiting on other voters.
    PendingThreshold,
    /// A step failed.
    Failed,
}

impl TxState {
    /// States reachable from `self`.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Built => &[Self::Submitted, Self::Failed],
            Self::Submitted => &[Self::Confirmed, Self::Proposed, Self::Failed],
            Self::Proposed => &[Self::Voted, Self::Failed],
            Self::Voted => &[
                Self::AutoExecuted,
                Self::ThresholdReached,
                Self::PendingThreshold,
                Self::Failed,
            ],
            Self::ThresholdReached => &[Self::Executed, Self::Failed],
            Self::Confirmed
            | Self::AutoExecuted
            | Self::Executed
            | Self::PendingThreshold
            | Self::Failed => &[],
        }
    }

    /// Returns `true` if `self -> to` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Returns `true` if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Step at which a batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Re-resolving the author before submission.
    Author,
    /// Direct publish.
    Publish,
    /// Proposal creation.
    Propose,
    /// Operator vote.
    Vote,
    /// Proposal status read.
    Status,
    /// Explicit execution.
    Execute,
}

impl FailureStage {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Publish => "publish",
            Self::Propose => "propose",
            Self::Vote => "vote",
            Self::Status => "status",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Direct publish confirmed.
    Confirmed,
    /// Proposal executed, by the vote itself when `auto`.
    Executed {
        /// Executed inside the vote transaction.
        auto: bool,
    },
    /// Proposal created and voted, awaiting other voters.
    PendingThreshold,
    /// A step failed.
    Failed {
        /// Where it failed.
        stage: FailureStage,
        /// Error text.
        error: String,
    },
}

impl BatchOutcome {
    /// Returns `true` if every transaction of the batch went through.
    ///
    /// Pending proposals count: their transactions succeeded, and the
    /// remaining work belongs to other voters.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Metric label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Executed { auto: true } => "auto_executed",
            Self::Executed { auto: false } => "executed",
            Self::PendingThreshold => "pending_threshold",
            Self::Failed { .. } => "failed",
        }
    }
}

/// What happened to one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Batch position.
    pub index: usize,
    /// Deletions in the batch.
    pub items: usize,
    /// Ops submitted, author creation included.
    pub ops: usize,
    /// Final outcome.
    pub outcome: BatchOutcome,
    /// States visited, in order.
    pub states: Vec<TxState>,
    /// Hashes of mined transactions.
    pub tx_hashes: Vec<String>,
    /// Proposal created, on the governed path.
    pub proposal: Option<Proposal>,
    /// Vote result, on the governed path.
    pub vote: Option<VoteResult>,
    /// Wall-clock time spent on the batch.
    pub elapsed_ms: u64,
}

impl BatchReport {
    /// A batch that failed before anything was submitted.
    #[must_use]
    pub fn not_submitted(batch: &Batch, stage: FailureStage, error: &Error) -> Self {
        Self {
            index: batch.index,
            items: batch.len(),
            ops: 0,
            outcome: BatchOutcome::Failed {
                stage,
                error: error.to_string(),
            },
            states: vec![TxState::Built, TxState::Failed],
            tx_hashes: Vec::new(),
            proposal: None,
            vote: None,
            elapsed_ms: 0,
        }
    }

    /// Final state.
    #[must_use]
    pub fn final_state(&self) -> TxState {
        self.states.last().copied().unwrap_or(TxState::Built)
    }
}

/// Drives batches through a space's write protocol.
#[derive(Debug)]
pub struct Transactor<'a, W: ChainWriter> {
    writer: &'a W,
    space: SpaceId,
    mode: GovernanceMode,
    voting_mode: VotingMode,
    voter_space: Option<SpaceId>,
}

struct Run {
    states: Vec<TxState>,
    tx_hashes: Vec<String>,
    proposal: Option<Proposal>,
    vote: Option<VoteResult>,
}

impl Run {
    fn new() -> Self {
        Self {
            states: vec![TxState::Built],
            tx_hashes: Vec::new(),
            proposal: None,
            vote: None,
        }
    }

    fn current(&self) -> TxState {
        self.states.last().copied().unwrap_or(TxState::Built)
    }

    fn advance(&mut self, to: TxState) -> Result<()> {
        let from = self.current();
        if !from.can_transition_to(to) {
            return Err(Error::OperationFailed {
                operation: "batch_transition".to_string(),
                cause: format!("illegal transition {from:?} -> {to:?}"),
            });
        }
        self.states.push(to);
        Ok(())
    }
}

impl<'a, W: ChainWriter> Transactor<'a, W> {
    /// Creates a transactor for `space` using `mode` for every batch.
    #[must_use]
    pub const fn new(writer: &'a W, space: SpaceId, mode: GovernanceMode) -> Self {
        Self {
            writer,
            space,
            mode,
            voting_mode: VotingMode::Fast,
            voter_space: None,
        }
    }

    /// Sets the voting mode for proposals.
    #[must_use]
    pub const fn with_voting_mode(mut self, voting_mode: VotingMode) -> Self {
        self.voting_mode = voting_mode;
        self
    }

    /// Sets the operator's personal space, used as the voter.
    #[must_use]
    pub const fn with_voter_space(mut self, voter_space: Option<SpaceId>) -> Self {
        self.voter_space = voter_space;
        self
    }

    /// The write path in use.
    #[must_use]
    pub const fn mode(&self) -> GovernanceMode {
        self.mode
    }

    /// Drives one batch to a terminal state.
    ///
    /// `ops` must already include any author-creation ops.
    pub fn drive(&self, batch: &Batch, ops: &[Op], author: &AuthorIdentity) -> BatchReport {
        let start = Instant::now();
        let mut run = Run::new();

        let outcome = match self.mode {
            GovernanceMode::Personal => self.drive_direct(batch, ops, author, &mut run),
            GovernanceMode::Governed => self.drive_governed(ops, author, &mut run),
        };
        let outcome = outcome.unwrap_or_else(|(stage, err)| {
            // Failed is reachable from every non-terminal state.
            if !run.current().is_terminal() {
                run.states.push(TxState::Failed);
            }
            BatchOutcome::Failed {
                stage,
                error: err.to_string(),
            }
        });

        BatchReport {
            index: batch.index,
            items: batch.len(),
            ops: ops.len(),
            outcome,
            states: run.states,
            tx_hashes: run.tx_hashes,
            proposal: run.proposal,
            vote: run.vote,
            elapsed_ms: crate::duration_to_millis(start.elapsed()),
        }
    }

    fn drive_direct(
        &self,
        batch: &Batch,
        ops: &[Op],
        author: &AuthorIdentity,
        run: &mut Run,
    ) -> std::result::Result<BatchOutcome, (FailureStage, Error)> {
        let stage = FailureStage::Publish;
        let name = format!(
            "spacesweep batch {}: delete {} objects",
            batch.index + 1,
            batch.len()
        );
        run.advance(TxState::Submitted).map_err(|e| (stage, e))?;
        let confirmation = self
            .writer
            .publish(self.space, author, &name, ops)
            .map_err(|e| (stage, e))?;
        run.tx_hashes.push(confirmation.tx_hash);
        run.advance(TxState::Confirmed).map_err(|e| (stage, e))?;
        Ok(BatchOutcome::Confirmed)
    }

    fn drive_governed(
        &self,
        ops: &[Op],
        author: &AuthorIdentity,
        run: &mut Run,
    ) -> std::result::Result<BatchOutcome, (FailureStage, Error)> {
        let stage = FailureStage::Propose;
        run.advance(TxState::Submitted).map_err(|e| (stage, e))?;
        let confirmation = self
            .writer
            .propose(self.space, author, ops, self.voting_mode)
            .map_err(|e| (stage, e))?;
        let proposal_id = confirmation.proposal_id.ok_or_else(|| {
            (
                stage,
                Error::Upstream {
                    operation: "propose".to_string(),
                    cause: "confirmation carried no proposal id".to_string(),
                },
            )
        })?;
        run.tx_hashes.push(confirmation.tx_hash);
        run.proposal = Some(Proposal {
            id: proposal_id,
            op_count: ops.len(),
            voting_mode: self.voting_mode,
            created_at: crate::current_timestamp_ms(),
            state: ProposalState::Created,
        });
        run.advance(TxState::Proposed).map_err(|e| (stage, e))?;
        tracing::debug!(proposal = %proposal_id, ops = ops.len(), "Proposal created");

        let stage = FailureStage::Vote;
        let voter_space = self.voter_space.ok_or_else(|| {
            (
                stage,
                Error::InvalidInput("no personal space configured to vote from".to_string()),
            )
        })?;
        let confirmation = self
            .writer
            .vote(proposal_id, voter_space, VoteOption::Yes)
            .map_err(|e| (stage, e))?;
        run.tx_hashes.push(confirmation.tx_hash);
        run.advance(TxState::Voted).map_err(|e| (stage, e))?;
        set_proposal_state(run, ProposalState::Voted);
        let mut vote = VoteResult {
            proposal_id,
            voted: true,
            executed: false,
            auto_executed: false,
        };
        run.vote = Some(vote);

        let stage = FailureStage::Status;
        let status = self
            .writer
            .proposal_status(proposal_id)
            .map_err(|e| (stage, e))?;

        if status.executed {
            run.advance(TxState::AutoExecuted).map_err(|e| (stage, e))?;
            set_proposal_state(run, ProposalState::Executed);
            vote.executed = true;
            vote.auto_executed = true;
            run.vote = Some(vote);
            return Ok(BatchOutcome::Executed { auto: true });
        }

        if !status.threshold_reached {
            run.advance(TxState::PendingThreshold)
                .map_err(|e| (stage, e))?;
            set_proposal_state(run, ProposalState::PendingThreshold);
            tracing::info!(proposal = %proposal_id, "Proposal awaits more votes");
            return Ok(BatchOutcome::PendingThreshold);
        }

        run.advance(TxState::ThresholdReached)
            .map_err(|e| (stage, e))?;
        let stage = FailureStage::Execute;
        let confirmation = self.writer.execute(proposal_id).map_err(|e| (stage, e))?;
        run.tx_hashes.push(confirmation.tx_hash);
        run.advance(TxState::Executed).map_err(|e| (stage, e))?;
        set_proposal_state(run, ProposalState::Executed);
        vote.executed = true;
        run.vote = Some(vote);
        Ok(BatchOutcome::Executed { auto: false })
    }
}

fn set_proposal_state(run: &mut Run, state: ProposalState) {
    if let Some(proposal) = run.proposal.as_mut() {
        proposal.state = state;
    }
}
