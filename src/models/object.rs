//! Graph objects as observed on the read replica.

use super::id::ObjectId;
use serde::{Deserialize, Serialize};

/// An entity node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Entity id.
    pub id: ObjectId,
    /// Display name, if the entity has one.
    pub name: Option<String>,
    /// Types the entity is an instance of.
    pub type_ids: Vec<ObjectId>,
    /// Properties the entity currently holds values for.
    pub property_ids: Vec<ObjectId>,
}

impl Entity {
    /// Creates an entity with no types or property values.
    #[must_use]
    pub const fn new(id: ObjectId) -> Self {
        Self {
            id,
            name: None,
            type_ids: Vec::new(),
            property_ids: Vec::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a type.
    #[must_use]
    pub fn with_type(mut self, type_id: ObjectId) -> Self {
        self.type_ids.push(type_id);
        self
    }

    /// Adds a property value.
    #[must_use]
    pub fn with_property(mut self, property_id: ObjectId) -> Self {
        self.property_ids.push(property_id);
        self
    }

    /// Returns `true` if the entity carries any property values.
    #[must_use]
    pub fn has_properties(&self) -> bool {
        !self.property_ids.is_empty()
    }
}

/// A typed edge between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Relation id.
    pub id: ObjectId,
    /// Relation type.
    pub type_id: ObjectId,
    /// Source entity.
    pub from_id: ObjectId,
    /// Target entity.
    pub to_id: ObjectId,
}

impl Relation {
    /// Returns `true` if either endpoint is `entity`.
    #[must_use]
    pub fn touches(&self, entity: ObjectId) -> bool {
        self.from_id == entity || self.to_id == entity
    }
}

/// Either kind of graph object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GraphObject {
    /// An entity.
    Entity(Entity),
    /// A relation.
    Relation(Relation),
}

impl GraphObject {
    /// Returns the object's id.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        match self {
            Self::Entity(e) => e.id,
            Self::Relation(r) => r.id,
        }
    }
}

impl From<Entity> for GraphObject {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<Relation> for GraphObject {
    fn from(relation: Relation) -> Self {
        Self::Relation(relation)
    }
}

/// Entity and relation counts for a space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCounts {
    /// Number of entities.
    pub entities: u64,
    /// Number of relations.
    pub relations: u64,
}

impl ObjectCounts {
    /// Creates a count pair.
    #[must_use]
    pub const fn new(entities: u64, relations: u64) -> Self {
        Self {
            entities,
            relations,
        }
    }

    /// Total objects.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.entities.saturating_add(self.relations)
    }

    /// Returns `true` when nothing is left.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entities == 0 && self.relations == 0
    }

    /// How many objects disappeared between `self` and `after`.
    #[must_use]
    pub const fn removed_since(&self, after: &Self) -> u64 {
        self.total().saturating_sub(after.total())
    }
}

impl std::fmt::Display for ObjectCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} entities / {} relations", self.entities, self.relations)
    }
}
