//! Data models for spacesweep.

mod author;
mod batch;
mod id;
mod object;
mod progress;
mod proposal;
mod space;

pub use author::{AuthorIdentity, AuthorSource};
pub use batch::{Batch, Deletion, ObjectKind};
pub use id::{ObjectId, ProposalId, SpaceId};
pub use object::{Entity, GraphObject, ObjectCounts, Relation};
pub use progress::ProgressRecord;
pub use proposal::{Proposal, ProposalState, ProposalStatus, VoteOption, VoteResult, VotingMode};
pub use space::GovernanceMode;
