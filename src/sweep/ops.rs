//! Mutation ops handed to the write side.
//!
//! The pipeline never inspects op encodings beyond counting them; the gateway
//! translates these into the graph's wire format.

use crate::config::SchemaConfig;
use crate::models::{Deletion, ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

/// One graph mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Op {
    /// Delete a relation.
    DeleteRelation {
        /// Relation id.
        id: ObjectId,
    },
    /// Remove an entity's values for the given properties.
    UnsetEntityValues {
        /// Entity id.
        id: ObjectId,
        /// Properties to clear.
        properties: Vec<ObjectId>,
    },
    /// Delete an entity.
    DeleteEntity {
        /// Entity id.
        id: ObjectId,
    },
    /// Create or update an entity with text values.
    UpdateEntity {
        /// Entity id.
        id: ObjectId,
        /// `(property, value)` pairs to set.
        values: Vec<OpValue>,
    },
    /// Create a relation.
    CreateRelation {
        /// Relation id.
        id: ObjectId,
        /// Relation type.
        #[serde(rename = "relationType")]
        relation_type: ObjectId,
        /// Source entity.
        from_entity: ObjectId,
        /// Target entity.
        to_entity: ObjectId,
    },
}

/// A text value set on an entity property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpValue {
    /// Property id.
    pub property: ObjectId,
    /// Text value.
    pub value: String,
}

/// Builds mutation ops for deletions and author creation.
pub trait OpsBuilder {
    /// Ops deleting one relation.
    fn delete_relation(&self, id: ObjectId) -> Vec<Op>;

    /// Ops unsetting `property_ids` on an entity and then deleting it.
    fn delete_entity(&self, id: ObjectId, property_ids: &[ObjectId]) -> Vec<Op>;

    /// Ops creating an author object named after `address`.
    fn create_author(&self, id: ObjectId, address: &str) -> Vec<Op>;

    /// Ops for one deletion descriptor.
    fn ops_for(&self, deletion: &Deletion) -> Vec<Op> {
        match deletion.kind {
            ObjectKind::Relation => self.delete_relation(deletion.id),
            ObjectKind::Entity => self.delete_entity(deletion.id, &deletion.property_ids),
        }
    }
}

/// Default ops builder for the knowledge graph's schema.
#[derive(Debug, Clone)]
pub struct GraphOps {
    account_type_id: ObjectId,
    types_property_id: ObjectId,
    name_property_id: ObjectId,
}

impl GraphOps {
    /// Creates a builder using the configured schema ids.
    #[must_use]
    pub const fn new(schema: &SchemaConfig) -> Self {
        Self {
            account_type_id: schema.account_type_id,
            types_property_id: schema.types_property_id,
            name_property_id: schema.name_property_id,
        }
    }
}

impl Default for GraphOps {
    fn default() -> Self {
        Self::new(&SchemaConfig::default())
    }
}

impl OpsBuilder for GraphOps {
    fn delete_relation(&self, id: ObjectId) -> Vec<Op> {
        vec![Op::DeleteRelation { id }]
    }

    fn delete_entity(&self, id: ObjectId, property_ids: &[ObjectId]) -> Vec<Op> {
        let mut ops = Vec::with_capacity(2);
        if !property_ids.is_empty() {
            ops.push(Op::UnsetEntityValues {
                id,
                properties: property_ids.to_vec(),
            });
        }
        ops.push(Op::DeleteEntity { id });
        ops
    }

    fn create_author(&self, id: ObjectId, address: &str) -> Vec<Op> {
        vec![
            Op::UpdateEntity {
                id,
                values: vec![OpValue {
                    property: self.name_property_id,
                    value: address.to_string(),
                }],
            },
            Op::CreateRelation {
                id: ObjectId::derive(id, &format!("types:{}", self.account_type_id)),
                relation_type: self.types_property_id,
                from_entity: id,
                to_entity: self.account_type_id,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;

    #[test]
    fn test_entity_ops_match_cost_model() {
        let ops = GraphOps::default();
        let bare = Deletion::entity(&Entity::new(ObjectId::generate()));
        let valued = Deletion::entity(
            &Entity::new(ObjectId::generate())
                .with_property(ObjectId::generate())
                .with_property(ObjectId::generate()),
        );
        assert_eq!(ops.ops_for(&bare).len(), bare.estimated_ops());
        assert_eq!(ops.ops_for(&valued).len(), valued.estimated_ops());
        assert!(matches!(
            ops.ops_for(&valued).last(),
            Some(Op::DeleteEntity { .. })
        ));
    }

    #[test]
    fn test_author_ops_link_account_type() {
        let schema = SchemaConfig::default();
        let author = ObjectId::generate();
        let ops = GraphOps::new(&schema).create_author(author, "0xabc");
        assert_eq!(ops.len(), 2);
        assert_eq!(ops, GraphOps::new(&schema).create_author(author, "0xabc"));
        assert!(ops.iter().any(|op| matches!(
            op,
            Op::CreateRelation { from_entity, to_entity, .. }
                if *from_entity == author && *to_entity == schema.account_type_id
        )));
    }

    #[test]
    fn test_op_serialization_is_tagged() {
        let id = ObjectId::parse("5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b").expect("id");
        let json = serde_json::to_value(Op::DeleteRelation { id }).expect("serialize");
        assert_eq!(json["type"], "DELETE_RELATION");
        assert_eq!(json["id"], "5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b");
    }
}
