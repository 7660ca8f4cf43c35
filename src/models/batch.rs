//! Deletion descriptors and batches.

use super::id::ObjectId;
use super::object::{Entity, Relation};
use serde::{Deserialize, Serialize};

/// Kind of object a deletion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A relation.
    Relation,
    /// An entity.
    Entity,
}

impl ObjectKind {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Relation => "relation",
            Self::Entity => "entity",
        }
    }
}

/// One object to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deletion {
    /// Object kind.
    pub kind: ObjectKind,
    /// Object id.
    pub id: ObjectId,
    /// Property values to unset before deleting an entity.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_ids: Vec<ObjectId>,
}

impl Deletion {
    /// Deletion of a relation.
    #[must_use]
    pub const fn relation(relation: &Relation) -> Self {
        Self {
            kind: ObjectKind::Relation,
            id: relation.id,
            property_ids: Vec::new(),
        }
    }

    /// Deletion of an entity, unsetting its property values first.
    #[must_use]
    pub fn entity(entity: &Entity) -> Self {
        Self {
            kind: ObjectKind::Entity,
            id: entity.id,
            property_ids: entity.property_ids.clone(),
        }
    }

    /// Logical operations this deletion costs.
    ///
    /// Relations cost one op. Entities cost one op to delete plus one op to
    /// unset their values when they have any.
    #[must_use]
    pub const fn estimated_ops(&self) -> usize {
        match self.kind {
            ObjectKind::Relation => 1,
            ObjectKind::Entity if self.property_ids.is_empty() => 1,
            ObjectKind::Entity => 2,
        }
    }
}

/// An ordered, bounded group of deletions submitted as one write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Zero-based position within the pass.
    pub index: usize,
    /// Deletions in submission order.
    pub deletions: Vec<Deletion>,
}

impl Batch {
    /// Number of deletions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deletions.len()
    }

    /// Returns `true` if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }

    /// Number of relation deletions.
    #[must_use]
    pub fn relations(&self) -> usize {
        self.count_kind(ObjectKind::Relation)
    }

    /// Number of entity deletions.
    #[must_use]
    pub fn entities(&self) -> usize {
        self.count_kind(ObjectKind::Entity)
    }

    /// Number of entity deletions that also unset property values.
    #[must_use]
    pub fn entities_with_properties(&self) -> usize {
        self.deletions
            .iter()
            .filter(|d| d.kind == ObjectKind::Entity && !d.property_ids.is_empty())
            .count()
    }

    /// Estimated logical operations for the whole batch.
    #[must_use]
    pub fn estimated_ops(&self) -> usize {
        self.deletions.iter().map(Deletion::estimated_ops).sum()
    }

    fn count_kind(&self, kind: ObjectKind) -> usize {
        self.deletions.iter().filter(|d| d.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> ObjectId {
        ObjectId::parse(&format!("{n:032x}")).expect("id")
    }

    #[test]
    fn test_entity_cost_depends_on_properties() {
        let bare = Entity::new(id(1));
        let valued = Entity::new(id(2)).with_property(id(100));
        assert_eq!(Deletion::entity(&bare).estimated_ops(), 1);
        assert_eq!(Deletion::entity(&valued).estimated_ops(), 2);
    }

    #[test]
    fn test_batch_counts() {
        let relation = Relation {
            id: id(10),
            type_id: id(11),
            from_id: id(1),
            to_id: id(2),
        };
        let batch = Batch {
            index: 0,
            deletions: vec![
                Deletion::relation(&relation),
                Deletion::entity(&Entity::new(id(1)).with_property(id(100))),
                Deletion::entity(&Entity::new(id(2))),
            ],
        };
        assert_eq!(batch.relations(), 1);
        assert_eq!(batch.entities(), 2);
        assert_eq!(batch.entities_with_properties(), 1);
        assert_eq!(batch.estimated_ops(), 4);
    }
}
