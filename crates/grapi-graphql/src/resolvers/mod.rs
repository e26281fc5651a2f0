//! GraphQL resolvers for platform resources.
//!
//! This module provides the resolver implementations for the fixed schema:
//! - `query`: root fields (`apps(limit:)`, `app(guid:)`, `_health`)
//! - `attribute`: plain attributes read from the parent node's JSON
//! - `relation`: one-hop relations following a hyperlink of the parent
//! - `routes`: the multi-hop `Process.routes` relation
//! - `prefetch`: early dispatch of the relations selected below a field
//!
//! Parent nodes travel between resolvers as [`ResourceNode`]s wrapped in
//! `FieldValue::owned_any`. Resolvers never talk to the upstream directly;
//! every fetch goes through the request's [`DataLoaders`](crate::loaders::DataLoaders).

mod attribute;
mod prefetch;
mod query;
mod relation;
mod routes;

pub use attribute::AttributeResolver;
pub use query::{AppResolver, AppsResolver, HealthResolver};
pub use relation::{
    APP_RELATIONS, Hyperlink, PROCESS_RELATIONS, ROUTE_RELATIONS, Relation, RelationResolver,
    relations_of,
};
pub use routes::{ProcessRoutesResolver, process_routes};

use async_graphql::dynamic::{FieldValue, ResolverContext};
use async_graphql::{Error as GraphQLError, Value};

use crate::context::GraphQLContext;
use crate::error::FetchError;
use crate::model::ResourceNode;

/// Helper to extract GraphQL context from resolver context.
pub(crate) fn get_graphql_context<'a>(
    ctx: &'a ResolverContext<'_>,
) -> Result<&'a GraphQLContext, GraphQLError> {
    ctx.data::<GraphQLContext>()
        .map_err(|_| GraphQLError::new("GraphQL context not available"))
}

/// Helper to extract the parent node of a field.
pub(crate) fn parent_node<'a>(
    ctx: &'a ResolverContext<'_>,
) -> Result<&'a ResourceNode, GraphQLError> {
    ctx.parent_value
        .try_downcast_ref::<ResourceNode>()
        .map_err(|_| GraphQLError::new("Parent value is not a resource node"))
}

/// Wraps one node as a field value.
pub(crate) fn node_value<'a>(node: ResourceNode) -> FieldValue<'a> {
    FieldValue::owned_any(node)
}

/// Wraps a list of nodes as a field value.
pub(crate) fn node_list<'a>(nodes: Vec<ResourceNode>) -> FieldValue<'a> {
    FieldValue::list(nodes.into_iter().map(node_value))
}

/// Converts a failed fetch into a field-level error.
pub(crate) fn fetch_error(error: &FetchError) -> GraphQLError {
    error.to_graphql_error()
}

/// Convert a serde_json::Value to async_graphql::Value.
pub(crate) fn json_to_graphql_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                Value::Number(
                    async_graphql::Number::from_f64(f)
                        .unwrap_or_else(|| async_graphql::Number::from(0)),
                )
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => {
            Value::List(arr.into_iter().map(json_to_graphql_value).collect())
        }
        serde_json::Value::Object(obj) => {
            let map: async_graphql::indexmap::IndexMap<async_graphql::Name, Value> = obj
                .into_iter()
                .map(|(k, v)| (async_graphql::Name::new(k), json_to_graphql_value(v)))
                .collect();
            Value::Object(map)
        }
    }
}
