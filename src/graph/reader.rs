//! Read-side abstraction.

use crate::Result;
use crate::models::{Entity, ObjectCounts, ObjectId, Relation, SpaceId};
use std::collections::HashSet;

/// Entity ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityOrder {
    /// Oldest first; stable across repeated enumeration.
    #[default]
    CreatedAsc,
    /// Most recently updated first.
    UpdatedDesc,
}

/// Server-side entity filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityQuery {
    /// Only entities carrying this type.
    pub type_id: Option<ObjectId>,
    /// Only entities with exactly this name (case-insensitive).
    pub name: Option<String>,
    /// Only entities whose name starts with this prefix.
    pub name_prefix: Option<String>,
    /// Result ordering.
    pub order: EntityOrder,
}

impl EntityQuery {
    /// Every entity, creation-ascending.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Entities of `type_id`, most recently updated first.
    #[must_use]
    pub fn of_type(type_id: ObjectId) -> Self {
        Self {
            type_id: Some(type_id),
            order: EntityOrder::UpdatedDesc,
            ..Self::default()
        }
    }

    /// Entities named `name`, most recently updated first.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            order: EntityOrder::UpdatedDesc,
            ..Self::default()
        }
    }

    /// Entities whose name starts with `prefix`, most recently updated first.
    #[must_use]
    pub fn name_starts_with(prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: Some(prefix.into()),
            order: EntityOrder::UpdatedDesc,
            ..Self::default()
        }
    }

    /// Returns `true` if `entity` passes the filter (ordering aside).
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        let type_ok = self
            .type_id
            .is_none_or(|t| entity.type_ids.contains(&t));
        let name = entity.name.as_deref().unwrap_or_default();
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|n| !name.is_empty() && name.eq_ignore_ascii_case(n));
        let prefix_ok = self
            .name_prefix
            .as_deref()
            .is_none_or(|p| name.starts_with(p));
        type_ok && name_ok && prefix_ok
    }
}

/// Type allow-list and deny-list.
///
/// An entity passes when any of its types is allowed (or the allow-list is
/// empty) and none is denied. A relation is judged by its own type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    /// Allowed types; empty allows everything.
    pub include: Vec<ObjectId>,
    /// Denied types.
    pub exclude: Vec<ObjectId>,
}

impl TypeFilter {
    /// A filter that accepts everything.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Adds an allowed type.
    #[must_use]
    pub fn with_include(mut self, type_id: ObjectId) -> Self {
        self.include.push(type_id);
        self
    }

    /// Adds a denied type.
    #[must_use]
    pub fn with_exclude(mut self, type_id: ObjectId) -> Self {
        self.exclude.push(type_id);
        self
    }

    /// Returns `true` if the filter accepts everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    fn accepts(&self, types: &[ObjectId]) -> bool {
        let allowed = self.include.is_empty() || types.iter().any(|t| self.include.contains(t));
        let denied = types.iter().any(|t| self.exclude.contains(t));
        allowed && !denied
    }

    /// Returns `true` if `entity` passes.
    #[must_use]
    pub fn matches_entity(&self, entity: &Entity) -> bool {
        self.accepts(&entity.type_ids)
    }

    /// Returns `true` if `relation` passes.
    #[must_use]
    pub fn matches_relation(&self, relation: &Relation) -> bool {
        self.accepts(std::slice::from_ref(&relation.type_id))
    }
}

/// What a count covers.
///
/// Protected entities, and relations touching them, are never counted. The
/// type filter applies as it does during enumeration, so a count measures
/// exactly the set a sweep would act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountScope {
    /// Entities left out of the counts.
    pub protected: HashSet<ObjectId>,
    /// Type filter for the target set.
    pub filter: TypeFilter,
}

impl CountScope {
    /// Counts everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Leaves `protected` out of the counts.
    #[must_use]
    pub fn with_protected(mut self, protected: HashSet<ObjectId>) -> Self {
        self.protected = protected;
        self
    }

    /// Restricts the counts to objects passing `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: TypeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Returns `true` if `entity` is counted.
    #[must_use]
    pub fn counts_entity(&self, entity: &Entity) -> bool {
        !self.protected.contains(&entity.id) && self.filter.matches_entity(entity)
    }

    /// Returns `true` if `relation` is counted.
    #[must_use]
    pub fn counts_relation(&self, relation: &Relation) -> bool {
        !self.protected.contains(&relation.from_id)
            && !self.protected.contains(&relation.to_id)
            && self.filter.matches_relation(relation)
    }
}

/// One page of a cursor-paginated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// More pages follow.
    pub has_next_page: bool,
    /// Cursor to pass as `after` for the next page.
    pub end_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A final page with no successors.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self {
            items,
            has_next_page: false,
            end_cursor: None,
        }
    }
}

/// Paginated reads over a space.
pub trait GraphReader {
    /// Fetches one page of entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream query fails.
    fn entities_page(
        &self,
        space: SpaceId,
        query: &EntityQuery,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<Entity>>;

    /// Fetches one page of relations, creation-ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream query fails.
    fn relations_page(
        &self,
        space: SpaceId,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<Relation>>;

    /// Counts the entities and relations within `scope` without paginating.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream query fails.
    fn counts(&self, space: SpaceId, scope: &CountScope) -> Result<ObjectCounts>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_matching() {
        let marker = ObjectId::generate();
        let entity = Entity::new(ObjectId::generate())
            .with_name("0xAbC")
            .with_type(marker);

        assert!(EntityQuery::all().matches(&entity));
        assert!(EntityQuery::of_type(marker).matches(&entity));
        assert!(!EntityQuery::of_type(ObjectId::generate()).matches(&entity));
        assert!(EntityQuery::named("0xabc").matches(&entity));
        assert!(EntityQuery::name_starts_with("0x").matches(&entity));
        assert!(!EntityQuery::name_starts_with("Ox").matches(&entity));
        assert!(!EntityQuery::named("").matches(&Entity::new(ObjectId::generate())));
    }

    #[test]
    fn test_count_scope_matches_enumeration_rules() {
        let person = ObjectId::generate();
        let guarded = Entity::new(ObjectId::generate()).with_type(person);
        let counted = Entity::new(ObjectId::generate()).with_type(person);
        let untyped = Entity::new(ObjectId::generate());
        let scope = CountScope::all()
            .with_protected(HashSet::from([guarded.id]))
            .with_filter(TypeFilter::any().with_include(person));

        assert!(!scope.counts_entity(&guarded));
        assert!(scope.counts_entity(&counted));
        assert!(!scope.counts_entity(&untyped));

        let touching = Relation {
            id: ObjectId::generate(),
            type_id: person,
            from_id: counted.id,
            to_id: guarded.id,
        };
        let free = Relation {
            to_id: counted.id,
            ..touching
        };
        assert!(!scope.counts_relation(&touching));
        assert!(scope.counts_relation(&free));
        assert!(CountScope::all().counts_relation(&touching));
    }
}
