//! GraphQL documents and their response schemas.
//!
//! Every response is decoded into explicit structs; a missing or mistyped
//! field fails at the deserialization boundary instead of later.

use super::reader::{CountScope, EntityOrder, EntityQuery};
use crate::models::{Entity, ObjectId, Relation};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Value, json};

/// Entity page query.
pub const ENTITIES_QUERY: &str = r"
query Entities($spaceId: UUID!, $first: Int!, $after: Cursor, $orderBy: [EntitiesOrderBy!], $filter: EntityFilter) {
  entitiesConnection(spaceId: $spaceId, first: $first, after: $after, orderBy: $orderBy, filter: $filter) {
    totalCount
    pageInfo { hasNextPage endCursor }
    nodes { id name typeIds createdAt updatedAt values { propertyId } }
  }
}";

/// Relation page query.
pub const RELATIONS_QUERY: &str = r"
query Relations($spaceId: UUID!, $first: Int!, $after: Cursor) {
  relationsConnection(spaceId: $spaceId, first: $first, after: $after, orderBy: CREATED_AT_ASC) {
    totalCount
    pageInfo { hasNextPage endCursor }
    nodes { id typeId fromEntityId toEntityId createdAt }
  }
}";

/// Count-only query for both kinds.
pub const COUNTS_QUERY: &str = r"
query Counts($spaceId: UUID!, $entityFilter: EntityFilter, $relationFilter: RelationFilter) {
  entitiesConnection(spaceId: $spaceId, first: 0, filter: $entityFilter) { totalCount }
  relationsConnection(spaceId: $spaceId, first: 0, filter: $relationFilter) { totalCount }
}";

/// Top-level GraphQL envelope.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    /// Payload, absent on hard errors.
    pub data: Option<T>,
    /// Reported errors.
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

/// One GraphQL error.
#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    /// Error message.
    pub message: String,
}

impl<T> GraphqlResponse<T> {
    /// Returns the payload, or an upstream error naming every reported error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] when `errors` is non-empty or `data` is null.
    pub fn into_data(self, operation: &str) -> Result<T> {
        if !self.errors.is_empty() {
            let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(Error::Upstream {
                operation: operation.to_string(),
                cause: messages.join("; "),
            });
        }
        self.data.ok_or_else(|| Error::Upstream {
            operation: operation.to_string(),
            cause: "response carried no data".to_string(),
        })
    }
}

/// Cursor pagination info.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// More pages follow.
    pub has_next_page: bool,
    /// Cursor of the last node.
    pub end_cursor: Option<String>,
}

/// A paginated connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<N> {
    /// Total matching nodes.
    pub total_count: Option<u64>,
    /// Pagination info.
    pub page_info: PageInfo,
    /// Nodes on this page.
    #[serde(default = "Vec::new")]
    pub nodes: Vec<N>,
}

/// A count-only connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountConnection {
    /// Total matching nodes.
    pub total_count: u64,
}

/// Payload of [`ENTITIES_QUERY`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesData {
    /// Entity connection.
    pub entities_connection: Connection<EntityNode>,
}

/// Payload of [`RELATIONS_QUERY`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationsData {
    /// Relation connection.
    pub relations_connection: Connection<RelationNode>,
}

/// Payload of [`COUNTS_QUERY`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountsData {
    /// Entity count.
    pub entities_connection: CountConnection,
    /// Relation count.
    pub relations_connection: CountConnection,
}

/// Entity node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityNode {
    /// Entity id.
    pub id: ObjectId,
    /// Name, if any.
    pub name: Option<String>,
    /// Type ids.
    #[serde(default)]
    pub type_ids: Vec<ObjectId>,
    /// Property values; only the property id is selected.
    #[serde(default)]
    pub values: Vec<ValueNode>,
}

/// Value node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueNode {
    /// Property the value belongs to.
    pub property_id: ObjectId,
}

/// Relation node.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationNode {
    /// Relation id.
    pub id: ObjectId,
    /// Relation type.
    pub type_id: ObjectId,
    /// Source entity.
    pub from_entity_id: ObjectId,
    /// Target entity.
    pub to_entity_id: ObjectId,
}

impl From<EntityNode> for Entity {
    fn from(node: EntityNode) -> Self {
        // One property may carry several values; each is unset once.
        let mut property_ids: Vec<ObjectId> = Vec::with_capacity(node.values.len());
        for value in node.values {
            if !property_ids.contains(&value.property_id) {
                property_ids.push(value.property_id);
            }
        }
        Self {
            id: node.id,
            name: node.name.filter(|n| !n.is_empty()),
            type_ids: node.type_ids,
            property_ids,
        }
    }
}

impl From<RelationNode> for Relation {
    fn from(node: RelationNode) -> Self {
        Self {
            id: node.id,
            type_id: node.type_id,
            from_id: node.from_entity_id,
            to_id: node.to_entity_id,
        }
    }
}

/// Variables for [`ENTITIES_QUERY`].
#[must_use]
pub fn entities_variables(
    space: &str,
    query: &EntityQuery,
    first: usize,
    after: Option<&str>,
) -> Value {
    let order = match query.order {
        EntityOrder::CreatedAsc => "CREATED_AT_ASC",
        EntityOrder::UpdatedDesc => "UPDATED_AT_DESC",
    };
    let mut filter = serde_json::Map::new();
    if let Some(type_id) = query.type_id {
        filter.insert(
            "typeIds".to_string(),
            json!({ "anyEqualTo": type_id.to_dashed() }),
        );
    }
    if let Some(name) = &query.name {
        filter.insert("name".to_string(), json!({ "equalToInsensitive": name }));
    } else if let Some(prefix) = &query.name_prefix {
        filter.insert("name".to_string(), json!({ "startsWith": prefix }));
    }

    let filter = if filter.is_empty() {
        Value::Null
    } else {
        Value::Object(filter)
    };

    json!({
        "spaceId": space,
        "first": first,
        "after": after,
        "orderBy": [order],
        "filter": filter,
    })
}

/// Variables for [`RELATIONS_QUERY`].
#[must_use]
pub fn relations_variables(space: &str, first: usize, after: Option<&str>) -> Value {
    json!({ "spaceId": space, "first": first, "after": after })
}

/// Variables for [`COUNTS_QUERY`].
#[must_use]
pub fn counts_variables(space: &str, scope: &CountScope) -> Value {
    let mut protected: Vec<String> = scope.protected.iter().map(ObjectId::to_dashed).collect();
    protected.sort_unstable();
    let include = dashed(&scope.filter.include);
    let exclude = dashed(&scope.filter.exclude);

    let mut entity = Vec::new();
    let mut relation = Vec::new();
    if !protected.is_empty() {
        entity.push(json!({ "id": { "notIn": protected } }));
        relation.push(json!({ "fromEntityId": { "notIn": protected } }));
        relation.push(json!({ "toEntityId": { "notIn": protected } }));
    }
    if !include.is_empty() {
        entity.push(json!({ "typeIds": { "overlaps": include } }));
        relation.push(json!({ "typeId": { "in": include } }));
    }
    if !exclude.is_empty() {
        entity.push(json!({ "not": { "typeIds": { "overlaps": exclude } } }));
        relation.push(json!({ "typeId": { "notIn": exclude } }));
    }

    json!({
        "spaceId": space,
        "entityFilter": all_of(entity),
        "relationFilter": all_of(relation),
    })
}

fn dashed(ids: &[ObjectId]) -> Vec<String> {
    ids.iter().map(ObjectId::to_dashed).collect()
}

fn all_of(conditions: Vec<Value>) -> Value {
    if conditions.is_empty() {
        Value::Null
    } else {
        json!({ "and": conditions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_node_decodes_and_dedupes_properties() {
        let json = r#"{
            "entitiesConnection": {
                "totalCount": 1,
                "pageInfo": { "hasNextPage": true, "endCursor": "c1" },
                "nodes": [{
                    "id": "5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b",
                    "name": "Thing",
                    "typeIds": ["2f3c0b1a9e8d4c7b8a6f5e4d3c2b1a09"],
                    "createdAt": "1700000000",
                    "updatedAt": "1700000001",
                    "values": [
                        { "propertyId": "a126ca530c8e48d5b88882c734c38935" },
                        { "propertyId": "a126ca53-0c8e-48d5-b888-82c734c38935" }
                    ]
                }]
            }
        }"#;
        let data: EntitiesData = serde_json::from_str(json).expect("decode");
        assert!(data.entities_connection.page_info.has_next_page);
        let entity: Entity = data
            .entities_connection
            .nodes
            .into_iter()
            .next()
            .map(Entity::from)
            .expect("node");
        assert_eq!(entity.property_ids.len(), 1);
        assert_eq!(entity.name.as_deref(), Some("Thing"));
    }

    #[test]
    fn test_malformed_node_is_rejected() {
        let json = r#"{"relationsConnection":{"pageInfo":{"hasNextPage":false},"nodes":[{"id":"x"}]}}"#;
        assert!(serde_json::from_str::<RelationsData>(json).is_err());
    }

    #[test]
    fn test_errors_become_upstream() {
        let response: GraphqlResponse<CountsData> =
            serde_json::from_str(r#"{"data":null,"errors":[{"message":"rate limited"}]}"#)
                .expect("decode");
        let err = response.into_data("graphql_counts").expect_err("errors");
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn test_entity_variables() {
        let marker = ObjectId::parse("2f3c0b1a9e8d4c7b8a6f5e4d3c2b1a09").expect("id");
        let vars = entities_variables("s", &EntityQuery::of_type(marker), 100, Some("cur"));
        assert_eq!(vars["orderBy"][0], "UPDATED_AT_DESC");
        assert_eq!(
            vars["filter"]["typeIds"]["anyEqualTo"],
            "2f3c0b1a-9e8d-4c7b-8a6f-5e4d3c2b1a09"
        );
        assert_eq!(vars["after"], "cur");

        let vars = entities_variables("s", &EntityQuery::all(), 100, None);
        assert!(vars["filter"].is_null());
        assert_eq!(vars["orderBy"][0], "CREATED_AT_ASC");
    }

    #[test]
    fn test_count_variables_follow_scope() {
        let vars = counts_variables("s", &CountScope::all());
        assert!(vars["entityFilter"].is_null());
        assert!(vars["relationFilter"].is_null());

        let guarded = ObjectId::parse("2f3c0b1a9e8d4c7b8a6f5e4d3c2b1a09").expect("id");
        let person = ObjectId::parse("5e6f9b0c2a8d4e1f9a3b7c6d5e4f3a2b").expect("id");
        let scope = CountScope::all()
            .with_protected(std::collections::HashSet::from([guarded]))
            .with_filter(crate::graph::TypeFilter::any().with_include(person));
        let vars = counts_variables("s", &scope);

        let entity = &vars["entityFilter"]["and"];
        assert_eq!(entity[0]["id"]["notIn"][0], "2f3c0b1a-9e8d-4c7b-8a6f-5e4d3c2b1a09");
        assert_eq!(entity[1]["typeIds"]["overlaps"][0], "5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b");
        let relation = &vars["relationFilter"]["and"];
        assert_eq!(relation.as_array().map(Vec::len), Some(3));
        assert_eq!(relation[1]["toEntityId"]["notIn"][0], "2f3c0b1a-9e8d-4c7b-8a6f-5e4d3c2b1a09");
        assert_eq!(relation[2]["typeId"]["in"][0], "5e6f9b0c-2a8d-4e1f-9a3b-7c6d5e4f3a2b");
    }
}
