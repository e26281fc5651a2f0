//! Attribute resolver.
//!
//! Reads a scalar straight from the parent node's JSON. Upstream attribute
//! names are snake_case and sometimes nested (`usage.cpu` on instance stats),
//! so every field is bound to a JSON pointer rather than to its GraphQL name.

use async_graphql::dynamic::{FieldFuture, ResolverContext};

use super::{json_to_graphql_value, parent_node};

/// Resolver for plain node attributes.
pub struct AttributeResolver;

impl AttributeResolver {
    /// Creates a resolver returning the value at `pointer` in the parent node.
    ///
    /// Missing attributes and explicit JSON nulls both resolve to `null`.
    pub fn resolve(
        pointer: &'static str,
    ) -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        move |ctx| {
            FieldFuture::new(async move {
                let node = parent_node(&ctx)?;
                let value = node
                    .pointer(pointer)
                    .filter(|value| !value.is_null())
                    .cloned()
                    .map(json_to_graphql_value);
                Ok(value)
            })
        }
    }
}
