//! Author identity resolution.
//!
//! Every batch is attributed to one author object per space. The resolver
//! finds an existing one or synthesises creation ops for a new one, and then
//! caches the result for the life of the process so lookups and creation
//! happen once, not once per batch. A synthesised author's id depends only on
//! the space and the operator address.

use super::enumerator::is_wallet_address;
use super::ops::{Op, OpsBuilder};
use crate::graph::{EntityQuery, GraphReader};
use crate::models::{AuthorIdentity, AuthorSource, Entity, ObjectId, SpaceId};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Lookup candidates fetched per query; the first match wins.
const LOOKUP_PAGE: usize = 20;

/// A resolved author plus the ops needed to create it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuthor {
    /// The author identity.
    pub identity: AuthorIdentity,
    /// Ops creating the author; empty once it exists.
    pub creation_ops: Vec<Op>,
}

#[derive(Debug, Clone)]
struct CachedAuthor {
    identity: AuthorIdentity,
    creation_ops: Vec<Op>,
}

/// Finds or synthesises the author object of a space.
#[derive(Debug)]
pub struct AuthorResolver<'a, R: GraphReader, B: OpsBuilder> {
    reader: &'a R,
    ops: &'a B,
    account_type_id: ObjectId,
    operator_address: Option<String>,
    cache: RwLock<HashMap<SpaceId, CachedAuthor>>,
}

impl<'a, R: GraphReader, B: OpsBuilder> AuthorResolver<'a, R, B> {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        reader: &'a R,
        ops: &'a B,
        account_type_id: ObjectId,
        operator_address: Option<String>,
    ) -> Self {
        Self {
            reader,
            ops,
            account_type_id,
            operator_address,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves the author for `space`, using the cache when possible.
    ///
    /// Until [`mark_created`](Self::mark_created) is called, a synthesised
    /// author keeps returning its creation ops, so they ride along with the
    /// first batch that goes through.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails, or if an author must be created
    /// and no operator address is configured.
    pub fn resolve(&self, space: SpaceId) -> Result<ResolvedAuthor> {
        if let Some(cached) = self.cached(space) {
            return Ok(ResolvedAuthor {
                identity: cached.identity,
                creation_ops: cached.creation_ops,
            });
        }

        let cached = match self.lookup(space)? {
            Some(identity) => {
                tracing::info!(
                    space = %space,
                    author = %identity.id,
                    source = ?identity.source,
                    "Reusing existing author"
                );
                CachedAuthor {
                    identity,
                    creation_ops: Vec::new(),
                }
            },
            None => {
                let address = self.operator_address.clone().ok_or_else(|| {
                    Error::InvalidInput(
                        "no author exists and no operator address is configured to create one"
                            .to_string(),
                    )
                })?;
                let id = synthesized_author_id(space, &address);
                let creation_ops = self.ops.create_author(id, &address);
                tracing::info!(space = %space, author = %id, "Synthesising new author");
                CachedAuthor {
                    identity: AuthorIdentity {
                        id,
                        space,
                        address,
                        source: AuthorSource::Synthesized,
                    },
                    creation_ops,
                }
            },
        };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(space, cached.clone());
        }
        Ok(ResolvedAuthor {
            identity: cached.identity,
            creation_ops: cached.creation_ops,
        })
    }

    /// Read-only lookup of an existing author.
    ///
    /// Tries the account type marker (most recently updated first), then the
    /// operator's address as name, then any wallet-address name.
    ///
    /// # Errors
    ///
    /// Returns an error if a lookup query fails.
    pub fn lookup(&self, space: SpaceId) -> Result<Option<AuthorIdentity>> {
        let by_marker = self.first_match(space, &EntityQuery::of_type(self.account_type_id), |e| {
            e.type_ids.contains(&self.account_type_id)
        })?;
        if let Some(entity) = by_marker {
            return Ok(Some(self.identity(space, &entity, AuthorSource::TypeMarker)));
        }

        if let Some(address) = self.operator_address.as_deref() {
            let by_address = self.first_match(space, &EntityQuery::named(address), |e| {
                e.name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(address))
            })?;
            if let Some(entity) = by_address {
                return Ok(Some(self.identity(
                    space,
                    &entity,
                    AuthorSource::OperatorAddress,
                )));
            }
        }

        let by_pattern = self.first_match(space, &EntityQuery::name_starts_with("0x"), |e| {
            e.name.as_deref().is_some_and(is_wallet_address)
        })?;
        Ok(by_pattern.map(|entity| self.identity(space, &entity, AuthorSource::AddressPattern)))
    }

    /// Records that the batch carrying the creation ops went through.
    pub fn mark_created(&self, space: SpaceId) {
        if let Ok(mut cache) = self.cache.write() {
            if let Some(entry) = cache.get_mut(&space) {
                if !entry.creation_ops.is_empty() {
                    tracing::debug!(space = %space, author = %entry.identity.id, "Author created");
                    entry.creation_ops.clear();
                }
            }
        }
    }

    /// Drops a not-yet-created author so the next resolve looks it up again.
    ///
    /// Authors that already exist stay cached.
    pub fn forget_uncreated(&self, space: SpaceId) {
        if let Ok(mut cache) = self.cache.write() {
            if cache
                .get(&space)
                .is_some_and(|entry| !entry.creation_ops.is_empty())
            {
                cache.remove(&space);
            }
        }
    }

    fn cached(&self, space: SpaceId) -> Option<CachedAuthor> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&space).cloned())
    }

    fn first_match<F>(&self, space: SpaceId, query: &EntityQuery, accept: F) -> Result<Option<Entity>>
    where
        F: Fn(&Entity) -> bool,
    {
        let page = self.reader.entities_page(space, query, LOOKUP_PAGE, None)?;
        Ok(page.items.into_iter().find(|e| accept(e)))
    }

    fn identity(&self, space: SpaceId, entity: &Entity, source: AuthorSource) -> AuthorIdentity {
        AuthorIdentity {
            id: entity.id,
            space,
            address: entity
                .name
                .clone()
                .or_else(|| self.operator_address.clone())
                .unwrap_or_default(),
            source,
        }
    }
}

/// Id of the author the operator at `address` creates in `space`.
///
/// Derived rather than random: a run that cannot see an earlier run's
/// still-pending creation proposes the same object again, and applying both
/// proposals leaves one author.
#[must_use]
pub fn synthesized_author_id(space: SpaceId, address: &str) -> ObjectId {
    ObjectId::derive(space.id(), &format!("author:{}", address.to_ascii_lowercase()))
}
