//! Deterministic batch planning.
//!
//! Relations are always retired before entities, so a failed relation batch
//! never leaves a dangling entity deletion behind it. Within each kind the
//! enumeration order is kept, which makes a re-run of an interrupted pass
//! replay the same sequence.

use super::enumerator::{Caps, Snapshot};
use crate::models::{Batch, Deletion};
use crate::{Error, Result};
use std::fmt;

/// Ordered batches for one pass, with totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Batches in submission order.
    pub batches: Vec<Batch>,
    /// Deletions across all batches.
    pub total_items: usize,
    /// Relation deletions.
    pub relations: usize,
    /// Entity deletions.
    pub entities: usize,
    /// Entity deletions that also unset values.
    pub entities_with_properties: usize,
    /// Estimated logical ops.
    pub estimated_ops: usize,
}

impl Plan {
    /// Returns `true` if there is nothing to submit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batches, {} items ({} relations, {} entities, {} with values), ~{} ops",
            self.batches.len(),
            self.total_items,
            self.relations,
            self.entities,
            self.entities_with_properties,
            self.estimated_ops
        )
    }
}

/// Partitions `snapshot` into batches of at most `batch_size` deletions.
///
/// Caps are applied before partitioning: per-kind caps first, then the
/// combined cap, which keeps relations and trims entities.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `batch_size` is zero.
pub fn plan(snapshot: &Snapshot, caps: Caps, batch_size: usize) -> Result<Plan> {
    if batch_size == 0 {
        return Err(Error::InvalidInput(
            "batch size must be at least 1".to_string(),
        ));
    }

    let relation_take = caps
        .relation_limit()
        .map_or(snapshot.relations.len(), |l| l.min(snapshot.relations.len()));
    let entity_take = caps
        .entity_limit(relation_take)
        .map_or(snapshot.entities.len(), |l| l.min(snapshot.entities.len()));

    let deletions: Vec<Deletion> = snapshot.relations[..relation_take]
        .iter()
        .map(Deletion::relation)
        .chain(snapshot.entities[..entity_take].iter().map(Deletion::entity))
        .collect();

    let batches: Vec<Batch> = deletions
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            deletions: chunk.to_vec(),
        })
        .collect();

    let entities_with_properties = batches.iter().map(Batch::entities_with_properties).sum();
    let estimated_ops = batches.iter().map(Batch::estimated_ops).sum();

    Ok(Plan {
        total_items: deletions.len(),
        relations: relation_take,
        entities: entity_take,
        entities_with_properties,
        estimated_ops,
        batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, ObjectId, ObjectKind, Relation};

    fn snapshot(relations: usize, bare: usize, valued: usize) -> Snapshot {
        let anchor = ObjectId::generate();
        Snapshot {
            relations: (0..relations)
                .map(|_| Relation {
                    id: ObjectId::generate(),
                    type_id: anchor,
                    from_id: anchor,
                    to_id: anchor,
                })
                .collect(),
            entities: (0..bare)
                .map(|_| Entity::new(ObjectId::generate()))
                .chain((0..valued).map(|_| Entity::new(ObjectId::generate()).with_property(anchor)))
                .collect(),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_small_space_fits_one_batch() {
        let plan = plan(&snapshot(3, 1, 1), Caps::none(), 10).expect("plan");
        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.total_items, 5);
        assert_eq!(plan.estimated_ops, 6);
        assert_eq!(plan.entities_with_properties, 1);
    }

    #[test]
    fn test_large_space_splits_evenly() {
        let plan = plan(&snapshot(4_000, 8_000, 0), Caps::none(), 5_000).expect("plan");
        let sizes: Vec<usize> = plan.batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![5_000, 5_000, 2_000]);
        assert_eq!(
            plan.batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_relations_come_first() {
        let plan = plan(&snapshot(3, 3, 0), Caps::none(), 2).expect("plan");
        let kinds: Vec<ObjectKind> = plan
            .batches
            .iter()
            .flat_map(|b| b.deletions.iter().map(|d| d.kind))
            .collect();
        let first_entity = kinds
            .iter()
            .position(|k| *k == ObjectKind::Entity)
            .expect("entity");
        assert!(kinds[first_entity..].iter().all(|k| *k == ObjectKind::Entity));
        assert_eq!(first_entity, 3);
    }

    #[test]
    fn test_combined_cap_trims_entities_first() {
        let caps = Caps::none().with_max_items(4);
        let plan = plan(&snapshot(3, 5, 0), caps, 10).expect("plan");
        assert_eq!((plan.relations, plan.entities), (3, 1));

        let plan = super::plan(&snapshot(6, 5, 0), caps, 10).expect("plan");
        assert_eq!((plan.relations, plan.entities), (4, 0));
    }

    #[test]
    fn test_per_kind_caps() {
        let caps = Caps {
            max_items: None,
            max_relations: Some(1),
            max_entities: Some(2),
        };
        let plan = plan(&snapshot(3, 5, 0), caps, 10).expect("plan");
        assert_eq!((plan.relations, plan.entities), (1, 2));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(matches!(
            plan(&snapshot(1, 0, 0), Caps::none(), 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_snapshot_plans_nothing() {
        let plan = plan(&Snapshot::default(), Caps::none(), 10).expect("plan");
        assert!(plan.is_empty());
        assert_eq!(plan.estimated_ops, 0);
    }
}
