//! In-process space for tests and local rehearsal.
//!
//! [`InMemorySpace`] implements both [`GraphReader`] and [`ChainWriter`], so
//! the whole pipeline can run against it. Governance outcomes are scripted
//! with [`GovernanceScript`], and failures can be injected per write kind.

use super::reader::{CountScope, EntityOrder, EntityQuery, GraphReader, Page};
use crate::chain::{ChainWriter, Confirmation};
use crate::config::SchemaConfig;
use crate::models::{
    AuthorIdentity, Entity, ObjectCounts, ObjectId, ProposalId, ProposalStatus, Relation, SpaceId,
    VoteOption, VotingMode,
};
use crate::sweep::Op;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// What happens to a proposal once the operator has voted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GovernanceScript {
    /// The vote transaction executes the proposal.
    #[default]
    AutoExecute,
    /// The vote reaches the threshold; an explicit execute is needed.
    ThresholdReached,
    /// The threshold is not reached; other members must vote.
    Pending,
}

/// Kind of write call, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// Direct publish.
    Publish,
    /// Proposal creation.
    Propose,
    /// Vote.
    Vote,
    /// Explicit execution.
    Execute,
}

/// A successful write, as recorded by the space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    /// Direct publish of `ops`.
    Publish {
        /// Author recorded on the edit.
        author: ObjectId,
        /// Ops published.
        ops: Vec<Op>,
    },
    /// Proposal created.
    Propose {
        /// New proposal.
        proposal: ProposalId,
        /// Author recorded on the proposal.
        author: ObjectId,
        /// Ops carried.
        ops: Vec<Op>,
    },
    /// Vote cast.
    Vote {
        /// Proposal voted on.
        proposal: ProposalId,
        /// Voting space.
        voter_space: SpaceId,
    },
    /// Explicit execution.
    Execute {
        /// Proposal executed.
        proposal: ProposalId,
    },
}

impl WriteCall {
    /// Ops carried by a publish or propose call.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        match self {
            Self::Publish { ops, .. } | Self::Propose { ops, .. } => ops,
            Self::Vote { .. } | Self::Execute { .. } => &[],
        }
    }
}

#[derive(Debug)]
struct StoredEntity {
    entity: Entity,
    updated: u64,
}

#[derive(Debug)]
struct StoredProposal {
    ops: Vec<Op>,
    voted: bool,
    threshold_reached: bool,
    executed: bool,
}

#[derive(Debug, Default)]
struct SpaceState {
    clock: u64,
    tx_seq: u64,
    // Insertion order is creation order.
    entities: Vec<StoredEntity>,
    relations: Vec<Relation>,
    proposals: HashMap<ProposalId, StoredProposal>,
    script: GovernanceScript,
    write_failures: HashMap<WriteKind, u32>,
    read_failures: u32,
    relation_read_failures: u32,
    writes: Vec<WriteCall>,
}

impl SpaceState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn next_tx(&mut self) -> Confirmation {
        self.tx_seq += 1;
        Confirmation::new(format!("0x{:064x}", self.tx_seq)).with_block_number(self.tx_seq)
    }

    fn take_write_failure(&mut self, kind: WriteKind) -> bool {
        match self.write_failures.get_mut(&kind) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            },
            _ => false,
        }
    }

    fn entity_mut(&mut self, id: ObjectId) -> Option<&mut StoredEntity> {
        self.entities.iter_mut().find(|e| e.entity.id == id)
    }

    fn apply(&mut self, ops: &[Op], types_property_id: ObjectId) {
        for op in ops {
            let now = self.tick();
            match op {
                Op::DeleteRelation { id } => self.relations.retain(|r| r.id != *id),
                Op::DeleteEntity { id } => self.entities.retain(|e| e.entity.id != *id),
                Op::UnsetEntityValues { id, properties } => {
                    if let Some(stored) = self.entity_mut(*id) {
                        stored.entity.property_ids.retain(|p| !properties.contains(p));
                        stored.updated = now;
                    }
                },
                Op::UpdateEntity { id, values } => {
                    let name = values.first().map(|v| v.value.clone());
                    let properties = values.iter().map(|v| v.property);
                    if let Some(stored) = self.entity_mut(*id) {
                        if name.is_some() {
                            stored.entity.name = name;
                        }
                        for property in properties {
                            if !stored.entity.property_ids.contains(&property) {
                                stored.entity.property_ids.push(property);
                            }
                        }
                        stored.updated = now;
                    } else {
                        let mut entity = Entity::new(*id);
                        entity.name = name;
                        entity.property_ids = properties.collect();
                        self.entities.push(StoredEntity {
                            entity,
                            updated: now,
                        });
                    }
                },
                Op::CreateRelation {
                    id,
                    relation_type,
                    from_entity,
                    to_entity,
                } => {
                    // Same id replaces, so replayed creation ops leave one relation.
                    self.relations.retain(|r| r.id != *id);
                    self.relations.push(Relation {
                        id: *id,
                        type_id: *relation_type,
                        from_id: *from_entity,
                        to_id: *to_entity,
                    });
                    if *relation_type == types_property_id {
                        if let Some(stored) = self.entity_mut(*from_entity) {
                            if !stored.entity.type_ids.contains(to_entity) {
                                stored.entity.type_ids.push(*to_entity);
                            }
                            stored.updated = now;
                        }
                    }
                },
            }
        }
    }
}

/// A single space held in memory.
#[derive(Debug)]
pub struct InMemorySpace {
    space: SpaceId,
    types_property_id: ObjectId,
    state: RwLock<SpaceState>,
}

impl InMemorySpace {
    /// Creates an empty space using the default schema ids.
    #[must_use]
    pub fn new(space: SpaceId) -> Self {
        Self {
            space,
            types_property_id: SchemaConfig::default().types_property_id,
            state: RwLock::new(SpaceState::default()),
        }
    }

    /// Uses `schema` to recognise type-assigning relations.
    #[must_use]
    pub const fn with_schema(mut self, schema: &SchemaConfig) -> Self {
        self.types_property_id = schema.types_property_id;
        self
    }

    /// Sets the governance script.
    #[must_use]
    pub fn with_governance(self, script: GovernanceScript) -> Self {
        self.set_governance(script);
        self
    }

    /// The space id.
    #[must_use]
    pub const fn space_id(&self) -> SpaceId {
        self.space
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SpaceState>> {
        self.state.read().map_err(|_| Error::OperationFailed {
            operation: "memory_space_read".to_string(),
            cause: "Lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SpaceState>> {
        self.state.write().map_err(|_| Error::OperationFailed {
            operation: "memory_space_write".to_string(),
            cause: "Lock poisoned".to_string(),
        })
    }

    fn check_space(&self, space: SpaceId, operation: &str) -> Result<()> {
        if space == self.space {
            Ok(())
        } else {
            Err(Error::Upstream {
                operation: operation.to_string(),
                cause: format!("unknown space {space}"),
            })
        }
    }

    /// Inserts an entity as the newest object.
    pub fn insert_entity(&self, entity: Entity) {
        if let Ok(mut state) = self.state.write() {
            let updated = state.tick();
            state.entities.push(StoredEntity { entity, updated });
        }
    }

    /// Inserts a relation as the newest object.
    pub fn insert_relation(&self, relation: Relation) {
        if let Ok(mut state) = self.state.write() {
            state.tick();
            state.relations.push(relation);
        }
    }

    /// Changes the governance script for later votes.
    pub fn set_governance(&self, script: GovernanceScript) {
        if let Ok(mut state) = self.state.write() {
            state.script = script;
        }
    }

    /// Makes the next `times` writes of `kind` fail.
    pub fn fail_next(&self, kind: WriteKind, times: u32) {
        if let Ok(mut state) = self.state.write() {
            state.write_failures.insert(kind, times);
        }
    }

    /// Makes the next `times` page or count reads fail.
    pub fn fail_reads(&self, times: u32) {
        if let Ok(mut state) = self.state.write() {
            state.read_failures = times;
        }
    }

    /// Makes the next `times` relation page reads fail; counts still succeed.
    pub fn fail_relation_pages(&self, times: u32) {
        if let Ok(mut state) = self.state.write() {
            state.relation_read_failures = times;
        }
    }

    /// Successful writes so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteCall> {
        self.state
            .read()
            .map(|s| s.writes.clone())
            .unwrap_or_default()
    }

    /// Unfiltered object counts.
    #[must_use]
    pub fn object_counts(&self) -> ObjectCounts {
        self.state
            .read()
            .map(|s| ObjectCounts::new(s.entities.len() as u64, s.relations.len() as u64))
            .unwrap_or_default()
    }

    /// Returns `true` if an entity with `id` exists.
    #[must_use]
    pub fn contains_entity(&self, id: ObjectId) -> bool {
        self.state
            .read()
            .is_ok_and(|s| s.entities.iter().any(|e| e.entity.id == id))
    }

    /// Proposals voted on but not yet executed.
    #[must_use]
    pub fn pending_proposals(&self) -> Vec<ProposalId> {
        self.state
            .read()
            .map(|s| {
                s.proposals
                    .iter()
                    .filter(|(_, p)| !p.executed)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Simulates other members approving and executing `proposal`.
    ///
    /// # Errors
    ///
    /// Returns an error if the proposal is unknown.
    pub fn approve_externally(&self, proposal: ProposalId) -> Result<()> {
        let mut state = self.write()?;
        let ops = match state.proposals.get_mut(&proposal) {
            Some(p) if !p.executed => {
                p.executed = true;
                p.threshold_reached = true;
                p.ops.clone()
            },
            Some(_) => return Ok(()),
            None => {
                return Err(Error::InvalidInput(format!("unknown proposal {proposal}")));
            },
        };
        state.apply(&ops, self.types_property_id);
        Ok(())
    }

    fn fail_read(&self, operation: &str) -> Result<()> {
        let mut state = self.write()?;
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(Error::Upstream {
                operation: operation.to_string(),
                cause: "injected read failure".to_string(),
            });
        }
        Ok(())
    }

    fn fail_write(state: &mut SpaceState, kind: WriteKind, operation: &str) -> Result<()> {
        if state.take_write_failure(kind) {
            return Err(Error::Upstream {
                operation: operation.to_string(),
                cause: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

fn paginate<T: Clone>(items: &[T], first: usize, after: Option<&str>) -> Result<Page<T>> {
    let offset = match after {
        Some(cursor) => cursor
            .parse::<usize>()
            .map_err(|_| Error::InvalidInput(format!("bad cursor '{cursor}'")))?,
        None => 0,
    };
    let end = offset.saturating_add(first).min(items.len());
    let start = offset.min(end);
    let has_next_page = end < items.len();
    Ok(Page {
        items: items[start..end].to_vec(),
        has_next_page,
        end_cursor: Some(end.to_string()),
    })
}

impl GraphReader for InMemorySpace {
    fn entities_page(
        &self,
        space: SpaceId,
        query: &EntityQuery,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<Entity>> {
        self.check_space(space, "memory_entities")?;
        self.fail_read("memory_entities")?;
        let state = self.read()?;
        let mut matching: Vec<&StoredEntity> = state
            .entities
            .iter()
            .filter(|e| query.matches(&e.entity))
            .collect();
        if query.order == EntityOrder::UpdatedDesc {
            matching.sort_by(|a, b| b.updated.cmp(&a.updated));
        }
        let entities: Vec<Entity> = matching.into_iter().map(|e| e.entity.clone()).collect();
        paginate(&entities, first, after)
    }

    fn relations_page(
        &self,
        space: SpaceId,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<Relation>> {
        self.check_space(space, "memory_relations")?;
        self.fail_read("memory_relations")?;
        {
            let mut state = self.write()?;
            if state.relation_read_failures > 0 {
                state.relation_read_failures -= 1;
                return Err(Error::Upstream {
                    operation: "memory_relations".to_string(),
                    cause: "injected relation page failure".to_string(),
                });
            }
        }
        let state = self.read()?;
        paginate(&state.relations, first, after)
    }

    fn counts(&self, space: SpaceId, scope: &CountScope) -> Result<ObjectCounts> {
        self.check_space(space, "memory_counts")?;
        self.fail_read("memory_counts")?;
        let state = self.read()?;
        let entities = state
            .entities
            .iter()
            .filter(|e| scope.counts_entity(&e.entity))
            .count();
        let relations = state
            .relations
            .iter()
            .filter(|r| scope.counts_relation(r))
            .count();
        Ok(ObjectCounts::new(entities as u64, relations as u64))
    }
}

impl ChainWriter for InMemorySpace {
    fn publish(
        &self,
        space: SpaceId,
        author: &AuthorIdentity,
        _name: &str,
        ops: &[Op],
    ) -> Result<Confirmation> {
        self.check_space(space, "publish")?;
        let mut state = self.write()?;
        Self::fail_write(&mut state, WriteKind::Publish, "publish")?;
        state.apply(ops, self.types_property_id);
        state.writes.push(WriteCall::Publish {
            author: author.id,
            ops: ops.to_vec(),
        });
        Ok(state.next_tx())
    }

    fn propose(
        &self,
        space: SpaceId,
        author: &AuthorIdentity,
        ops: &[Op],
        _voting_mode: VotingMode,
    ) -> Result<Confirmation> {
        self.check_space(space, "propose")?;
        let mut state = self.write()?;
        Self::fail_write(&mut state, WriteKind::Propose, "propose")?;
        let proposal = ProposalId::new(ObjectId::generate());
        state.proposals.insert(
            proposal,
            StoredProposal {
                ops: ops.to_vec(),
                voted: false,
                threshold_reached: false,
                executed: false,
            },
        );
        state.writes.push(WriteCall::Propose {
            proposal,
            author: author.id,
            ops: ops.to_vec(),
        });
        Ok(state.next_tx().with_proposal(proposal))
    }

    fn vote(
        &self,
        proposal: ProposalId,
        voter_space: SpaceId,
        option: VoteOption,
    ) -> Result<Confirmation> {
        let mut state = self.write()?;
        Self::fail_write(&mut state, WriteKind::Vote, "vote")?;
        let script = state.script;
        let stored = state.proposals.get_mut(&proposal).ok_or_else(|| Error::Upstream {
            operation: "vote".to_string(),
            cause: format!("unknown proposal {proposal}"),
        })?;
        if stored.voted {
            return Err(Error::Upstream {
                operation: "vote".to_string(),
                cause: format!("already voted on {proposal}"),
            });
        }
        stored.voted = true;
        let ops = if option == VoteOption::Yes {
            match script {
                GovernanceScript::AutoExecute => {
                    stored.threshold_reached = true;
                    stored.executed = true;
                    Some(stored.ops.clone())
                },
                GovernanceScript::ThresholdReached => {
                    stored.threshold_reached = true;
                    None
                },
                GovernanceScript::Pending => None,
            }
        } else {
            None
        };
        if let Some(ops) = ops {
            state.apply(&ops, self.types_property_id);
        }
        state.writes.push(WriteCall::Vote {
            proposal,
            voter_space,
        });
        Ok(state.next_tx())
    }

    fn execute(&self, proposal: ProposalId) -> Result<Confirmation> {
        let mut state = self.write()?;
        Self::fail_write(&mut state, WriteKind::Execute, "execute")?;
        let stored = state.proposals.get_mut(&proposal).ok_or_else(|| Error::Upstream {
            operation: "execute".to_string(),
            cause: format!("unknown proposal {proposal}"),
        })?;
        if stored.executed || !stored.threshold_reached {
            return Err(Error::TransactionReverted {
                tx_hash: format!("execute {proposal}"),
            });
        }
        stored.executed = true;
        let ops = stored.ops.clone();
        state.apply(&ops, self.types_property_id);
        state.writes.push(WriteCall::Execute { proposal });
        Ok(state.next_tx())
    }

    fn proposal_status(&self, proposal: ProposalId) -> Result<ProposalStatus> {
        let state = self.read()?;
        state
            .proposals
            .get(&proposal)
            .map(|p| ProposalStatus {
                executed: p.executed,
                threshold_reached: p.threshold_reached,
            })
            .ok_or_else(|| Error::Upstream {
                operation: "proposal_status".to_string(),
                cause: format!("unknown proposal {proposal}"),
            })
    }
}
