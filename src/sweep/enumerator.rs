//! Paginated enumeration of a space's deletable objects.

use crate::graph::{CountScope, EntityQuery, GraphReader};
use crate::models::{Entity, ObjectCounts, ObjectId, Relation, SpaceId};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

pub use crate::graph::TypeFilter;

/// Names shaped like a wallet address mark objects created by the write
/// process itself.
// The pattern is a literal; `test_wallet_pattern` covers it compiling.
#[allow(clippy::expect_used)]
static WALLET_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex: wallet address"));

/// Returns `true` if `name` looks like a wallet address.
#[must_use]
pub fn is_wallet_address(name: &str) -> bool {
    WALLET_ADDRESS.is_match(name)
}

/// Upper bounds on how much a pass takes.
///
/// Per-kind caps apply first; `max_items` then bounds the combined total,
/// consuming relations before entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caps {
    /// Combined cap.
    pub max_items: Option<usize>,
    /// Relation cap.
    pub max_relations: Option<usize>,
    /// Entity cap.
    pub max_entities: Option<usize>,
}

impl Caps {
    /// No caps.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_items: None,
            max_relations: None,
            max_entities: None,
        }
    }

    /// Lowers the combined cap to `limit`.
    #[must_use]
    pub fn with_max_items(mut self, limit: usize) -> Self {
        self.max_items = Some(self.max_items.map_or(limit, |m| m.min(limit)));
        self
    }

    /// Relations to take.
    #[must_use]
    pub fn relation_limit(&self) -> Option<usize> {
        min_opt(self.max_relations, self.max_items)
    }

    /// Entities to take once `relations` relations have been taken.
    #[must_use]
    pub fn entity_limit(&self, relations: usize) -> Option<usize> {
        min_opt(
            self.max_entities,
            self.max_items.map(|m| m.saturating_sub(relations)),
        )
    }
}

fn min_opt(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// The objects a pass will act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Relations, creation-ascending.
    pub relations: Vec<Relation>,
    /// Entities, creation-ascending.
    pub entities: Vec<Entity>,
    /// Protected entities left alone.
    pub skipped_entities: usize,
    /// Relations touching protected entities, left alone.
    pub skipped_relations: usize,
    /// Objects rejected by the type filter.
    pub filtered_out: usize,
    /// More matching objects exist beyond the caps.
    pub truncated: bool,
}

impl Snapshot {
    /// Objects to delete.
    #[must_use]
    pub fn total(&self) -> usize {
        self.relations.len() + self.entities.len()
    }

    /// Returns `true` if there is nothing to delete.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty() && self.entities.is_empty()
    }
}

/// Walks a space's connections page by page.
#[derive(Debug)]
pub struct Enumerator<'a, R: GraphReader> {
    reader: &'a R,
    page_size: usize,
    account_type_id: ObjectId,
    operator_address: Option<String>,
}

impl<'a, R: GraphReader> Enumerator<'a, R> {
    /// Creates an enumerator.
    #[must_use]
    pub fn new(reader: &'a R, page_size: usize, account_type_id: ObjectId) -> Self {
        Self {
            reader,
            page_size: page_size.max(1),
            account_type_id,
            operator_address: None,
        }
    }

    /// Also protects entities named after the operator's address.
    #[must_use]
    pub fn with_operator_address(mut self, address: Option<String>) -> Self {
        self.operator_address = address;
        self
    }

    /// Counts the objects a sweep with `filter` would delete.
    ///
    /// Protected entities and relations touching them are left out under the
    /// same rules [`enumerate`](Self::enumerate) applies, so a space whose
    /// target set is gone counts as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the protected-id lookup or the count query fails.
    pub fn counts(&self, space: SpaceId, filter: &TypeFilter) -> Result<ObjectCounts> {
        let scope = CountScope::all()
            .with_protected(self.protected_ids(space)?)
            .with_filter(filter.clone());
        self.reader.counts(space, &scope)
    }

    /// Enumerates matching objects up to `caps`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Enumeration`] if any page fails.
    pub fn enumerate(&self, space: SpaceId, filter: &TypeFilter, caps: Caps) -> Result<Snapshot> {
        self.enumerate_inner(space, filter, caps)
            .map_err(|e| match e {
                Error::Enumeration { .. } => e,
                other => Error::Enumeration {
                    cause: other.to_string(),
                },
            })
    }

    fn enumerate_inner(&self, space: SpaceId, filter: &TypeFilter, caps: Caps) -> Result<Snapshot> {
        let protected = self.protected_ids(space)?;
        let mut snapshot = Snapshot::default();

        let relation_limit = caps.relation_limit();
        let mut cursor: Option<String> = None;
        'relations: loop {
            let page = self
                .reader
                .relations_page(space, self.page_size, cursor.as_deref())?;
            for relation in page.items {
                if protected.contains(&relation.from_id) || protected.contains(&relation.to_id) {
                    snapshot.skipped_relations += 1;
                } else if !filter.matches_relation(&relation) {
                    snapshot.filtered_out += 1;
                } else if relation_limit.is_some_and(|l| snapshot.relations.len() >= l) {
                    snapshot.truncated = true;
                    break 'relations;
                } else {
                    snapshot.relations.push(relation);
                }
            }
            if !page.has_next_page || page.end_cursor.is_none() {
                break;
            }
            cursor = page.end_cursor;
        }

        let entity_limit = caps.entity_limit(snapshot.relations.len());
        let query = EntityQuery::all();
        let mut cursor: Option<String> = None;
        'entities: loop {
            let page = self
                .reader
                .entities_page(space, &query, self.page_size, cursor.as_deref())?;
            for entity in page.items {
                if protected.contains(&entity.id) || self.is_protected(&entity) {
                    snapshot.skipped_entities += 1;
                } else if !filter.matches_entity(&entity) {
                    snapshot.filtered_out += 1;
                } else if entity_limit.is_some_and(|l| snapshot.entities.len() >= l) {
                    snapshot.truncated = true;
                    break 'entities;
                } else {
                    snapshot.entities.push(entity);
                }
            }
            if !page.has_next_page || page.end_cursor.is_none() {
                break;
            }
            cursor = page.end_cursor;
        }

        tracing::debug!(
            space = %space,
            relations = snapshot.relations.len(),
            entities = snapshot.entities.len(),
            skipped_entities = snapshot.skipped_entities,
            skipped_relations = snapshot.skipped_relations,
            filtered_out = snapshot.filtered_out,
            truncated = snapshot.truncated,
            "Enumerated space"
        );
        Ok(snapshot)
    }

    fn is_protected(&self, entity: &Entity) -> bool {
        if entity.type_ids.contains(&self.account_type_id) {
            return true;
        }
        entity.name.as_deref().is_some_and(|name| {
            is_wallet_address(name)
                || self
                    .operator_address
                    .as_deref()
                    .is_some_and(|a| a.eq_ignore_ascii_case(name))
        })
    }

    /// Ids of account-typed, wallet-named and operator-named entities.
    ///
    /// Fetched up front so relations can be screened before the entity walk
    /// reaches their endpoints.
    fn protected_ids(&self, space: SpaceId) -> Result<HashSet<ObjectId>> {
        let mut ids = HashSet::new();
        let mut queries = vec![
            EntityQuery::of_type(self.account_type_id),
            EntityQuery::name_starts_with("0x"),
        ];
        if let Some(address) = self.operator_address.as_deref() {
            queries.push(EntityQuery::named(address));
        }
        for query in queries {
            let mut cursor: Option<String> = None;
            loop {
                let page = self
                    .reader
                    .entities_page(space, &query, self.page_size, cursor.as_deref())?;
                ids.extend(
                    page.items
                        .iter()
                        .filter(|e| self.is_protected(e))
                        .map(|e| e.id),
                );
                if !page.has_next_page || page.end_cursor.is_none() {
                    break;
                }
                cursor = page.end_cursor;
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemorySpace;

    fn setup() -> (InMemorySpace, SpaceId, ObjectId) {
        let space = SpaceId::new(ObjectId::generate());
        let account_type = ObjectId::generate();
        (InMemorySpace::new(space), space, account_type)
    }

    fn relation(from: ObjectId, to: ObjectId, type_id: ObjectId) -> Relation {
        Relation {
            id: ObjectId::generate(),
            type_id,
            from_id: from,
            to_id: to,
        }
    }

    #[test]
    fn test_wallet_pattern() {
        assert!(is_wallet_address("0x1111111111111111111111111111111111111111"));
        assert!(is_wallet_address("0xAbCdEf1111111111111111111111111111111111"));
        assert!(!is_wallet_address("0x111"));
        assert!(!is_wallet_address("wallet 0x1111111111111111111111111111111111111111"));
    }

    #[test]
    fn test_empty_space_is_ok() {
        let (memory, space, account) = setup();
        let snapshot = Enumerator::new(&memory, 10, account)
            .enumerate(space, &TypeFilter::any(), Caps::none())
            .expect("enumerate");
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_protected_objects_are_skipped() {
        let (memory, space, account) = setup();
        let author = Entity::new(ObjectId::generate()).with_type(account);
        let wallet = Entity::new(ObjectId::generate())
            .with_name("0x2222222222222222222222222222222222222222");
        let plain = Entity::new(ObjectId::generate()).with_name("Plain");
        let t = ObjectId::generate();
        memory.insert_entity(author.clone());
        memory.insert_entity(wallet.clone());
        memory.insert_entity(plain.clone());
        memory.insert_relation(relation(author.id, account, t));
        memory.insert_relation(relation(plain.id, wallet.id, t));
        let kept = relation(plain.id, plain.id, t);
        memory.insert_relation(kept);

        let snapshot = Enumerator::new(&memory, 2, account)
            .enumerate(space, &TypeFilter::any(), Caps::none())
            .expect("enumerate");
        assert_eq!(snapshot.entities, vec![plain]);
        assert_eq!(snapshot.relations, vec![kept]);
        assert_eq!(snapshot.skipped_entities, 2);
        assert_eq!(snapshot.skipped_relations, 2);
    }

    #[test]
    fn test_counts_skip_untyped_wallet_author() {
        let (memory, space, account) = setup();
        let legacy = Entity::new(ObjectId::generate())
            .with_name("0x3333333333333333333333333333333333333333");
        let named = Entity::new(ObjectId::generate()).with_name("Operator wallet");
        let t = ObjectId::generate();
        memory.insert_entity(legacy.clone());
        memory.insert_entity(named.clone());
        memory.insert_relation(relation(legacy.id, account, t));

        let base = Enumerator::new(&memory, 10, account);
        let counts = base.counts(space, &TypeFilter::any()).expect("counts");
        assert_eq!(counts, ObjectCounts::new(1, 0));

        let with_operator = Enumerator::new(&memory, 10, account)
            .with_operator_address(Some("Operator wallet".to_string()));
        let counts = with_operator
            .counts(space, &TypeFilter::any())
            .expect("counts");
        assert!(counts.is_empty());
    }

    #[test]
    fn test_counts_follow_type_filter() {
        let (memory, space, account) = setup();
        let person = ObjectId::generate();
        let place = ObjectId::generate();
        for _ in 0..3 {
            memory.insert_entity(Entity::new(ObjectId::generate()).with_type(person));
            memory.insert_entity(Entity::new(ObjectId::generate()).with_type(place));
        }
        let enumerator = Enumerator::new(&memory, 4, account);

        let people = TypeFilter::any().with_include(person);
        assert_eq!(
            enumerator.counts(space, &people).expect("counts"),
            ObjectCounts::new(3, 0)
        );
        let snapshot = enumerator
            .enumerate(space, &people, Caps::none())
            .expect("enumerate");
        assert_eq!(snapshot.total(), 3);
        assert_eq!(
            enumerator.counts(space, &TypeFilter::any()).expect("counts"),
            ObjectCounts::new(6, 0)
        );
    }

    #[test]
    fn test_type_filter() {
        let (memory, space, account) = setup();
        let person = ObjectId::generate();
        let place = ObjectId::generate();
        let a = Entity::new(ObjectId::generate()).with_type(person);
        let b = Entity::new(ObjectId::generate()).with_type(person).with_type(place);
        let c = Entity::new(ObjectId::generate()).with_type(place);
        for e in [&a, &b, &c] {
            memory.insert_entity(e.clone());
        }

        let filter = TypeFilter::any().with_include(person).with_exclude(place);
        let snapshot = Enumerator::new(&memory, 10, account)
            .enumerate(space, &filter, Caps::none())
            .expect("enumerate");
        assert_eq!(snapshot.entities, vec![a]);
        assert_eq!(snapshot.filtered_out, 2);
    }

    #[test]
    fn test_combined_cap_prefers_relations() {
        let (memory, space, account) = setup();
        let t = ObjectId::generate();
        let anchor = ObjectId::generate();
        for _ in 0..3 {
            memory.insert_entity(Entity::new(ObjectId::generate()));
            memory.insert_relation(relation(anchor, anchor, t));
        }

        let snapshot = Enumerator::new(&memory, 2, account)
            .enumerate(space, &TypeFilter::any(), Caps::none().with_max_items(4))
            .expect("enumerate");
        assert_eq!(snapshot.relations.len(), 3);
        assert_eq!(snapshot.entities.len(), 1);
        assert!(snapshot.truncated);
    }

    #[test]
    fn test_read_failure_becomes_enumeration_error() {
        let (memory, space, account) = setup();
        memory.fail_reads(1);
        let err = Enumerator::new(&memory, 10, account)
            .enumerate(space, &TypeFilter::any(), Caps::none())
            .expect_err("fails");
        assert!(matches!(err, Error::Enumeration { .. }));
    }
}
