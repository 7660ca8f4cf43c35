//! GraphQL read-replica client.

use super::queries::{
    COUNTS_QUERY, CountsData, ENTITIES_QUERY, EntitiesData, GraphqlResponse, RELATIONS_QUERY,
    RelationsData, counts_variables, entities_variables, relations_variables,
};
use super::reader::{CountScope, EntityQuery, GraphReader, Page};
use crate::Result;
use crate::models::{Entity, ObjectCounts, Relation, SpaceId};
use crate::session::{Session, decode_json};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

/// [`GraphReader`] over the GraphQL read replica.
///
/// All queries are idempotent and go through the session's retry policy.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    session: Arc<Session>,
}

impl GraphqlClient {
    /// Creates a client for the session's GraphQL endpoint.
    #[must_use]
    pub const fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    fn query<T: DeserializeOwned>(&self, operation: &str, query: &str, variables: &Value) -> Result<T> {
        let url = &self.session.config().endpoints.graphql_url;
        let body = json!({ "query": query, "variables": variables });
        let start = Instant::now();

        let data = self.session.retry().run(operation, || {
            let response = self.session.http().post(url).json(&body).send();
            let envelope: GraphqlResponse<T> = decode_json(response, operation)?;
            envelope.into_data(operation)
        })?;

        tracing::trace!(
            operation,
            elapsed_ms = crate::duration_to_millis(start.elapsed()),
            "GraphQL query complete"
        );
        Ok(data)
    }
}

impl GraphReader for GraphqlClient {
    fn entities_page(
        &self,
        space: SpaceId,
        query: &EntityQuery,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<Entity>> {
        let variables = entities_variables(&space.id().to_dashed(), query, first, after);
        let data: EntitiesData = self.query("graphql_entities", ENTITIES_QUERY, &variables)?;
        let connection = data.entities_connection;
        Ok(Page {
            items: connection.nodes.into_iter().map(Entity::from).collect(),
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }

    fn relations_page(
        &self,
        space: SpaceId,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<Relation>> {
        let variables = relations_variables(&space.id().to_dashed(), first, after);
        let data: RelationsData = self.query("graphql_relations", RELATIONS_QUERY, &variables)?;
        let connection = data.relations_connection;
        Ok(Page {
            items: connection.nodes.into_iter().map(Relation::from).collect(),
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }

    fn counts(&self, space: SpaceId, scope: &CountScope) -> Result<ObjectCounts> {
        let variables = counts_variables(&space.id().to_dashed(), scope);
        let data: CountsData = self.query("graphql_counts", COUNTS_QUERY, &variables)?;
        Ok(ObjectCounts::new(
            data.entities_connection.total_count,
            data.relations_connection.total_count,
        ))
    }
}
