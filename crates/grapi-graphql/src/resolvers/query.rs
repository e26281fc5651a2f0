//! Root query resolvers.
//!
//! Root fields have no parent node, so their loader keys are built from the
//! field arguments as paths relative to the upstream API base URL.

use async_graphql::Value;
use async_graphql::dynamic::{FieldFuture, ResolverContext};
use tracing::{debug, warn};

use super::prefetch::prefetch_selected;
use super::{fetch_error, get_graphql_context, node_list, node_value};
use crate::loaders::ResourceLoad;
use crate::model::ResourceNode;
use crate::schema::APP_TYPE;

/// Resolver for `apps(limit: Int)`.
pub struct AppsResolver;

impl AppsResolver {
    /// Returns the upstream path for an app listing.
    ///
    /// A limit of zero means no limit; negative limits are rejected.
    pub fn path(limit: Option<i64>) -> Result<String, async_graphql::Error> {
        match limit {
            Some(limit) if limit < 0 => Err(async_graphql::Error::new(format!(
                "Argument 'limit' must not be negative, got {limit}"
            ))),
            Some(limit) if limit > 0 => Ok(format!("/v3/apps?per_page={limit}")),
            _ => Ok("/v3/apps".to_string()),
        }
    }

    /// Creates the resolver function.
    pub fn resolve() -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        |ctx| {
            FieldFuture::new(async move {
                let limit = ctx
                    .args
                    .get("limit")
                    .filter(|value| !value.is_null())
                    .map(|value| value.i64())
                    .transpose()?;
                let path = Self::path(limit)?;

                let gql_ctx = get_graphql_context(&ctx)?;
                debug!(request_id = %gql_ctx.request_id, path = %path, "Resolving app listing");

                let apps = gql_ctx
                    .loaders
                    .resources
                    .load_by_relative_path(&path)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Failed to list apps");
                        fetch_error(&e)
                    })?;

                let apps = ResourceNode::list(apps);
                prefetch_selected(&ctx, &gql_ctx.loaders, APP_TYPE, &apps);
                Ok(Some(node_list(apps)))
            })
        }
    }
}

/// Resolver for `app(guid: String!)`.
pub struct AppResolver;

impl AppResolver {
    /// Returns the upstream path for one app.
    ///
    /// GUIDs are interpolated into the path, so only URL-safe identifier
    /// characters are accepted.
    pub fn path(guid: &str) -> Result<String, async_graphql::Error> {
        let valid = !guid.is_empty()
            && guid
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(async_graphql::Error::new(format!(
                "Argument 'guid' is not a valid GUID: {guid:?}"
            )));
        }
        Ok(format!("/v3/apps/{guid}"))
    }

    /// Creates the resolver function.
    pub fn resolve() -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        |ctx| {
            FieldFuture::new(async move {
                let guid = ctx
                    .args
                    .get("guid")
                    .and_then(|v| v.string().ok())
                    .ok_or_else(|| async_graphql::Error::new("Missing required argument 'guid'"))?;
                let path = Self::path(guid)?;

                let gql_ctx = get_graphql_context(&ctx)?;
                debug!(request_id = %gql_ctx.request_id, guid = %guid, "Resolving app");

                let app = gql_ctx
                    .loaders
                    .raw
                    .load_by_relative_path(&path)
                    .await
                    .map_err(|e| fetch_error(&e))?;

                let app = ResourceNode::new(app);
                prefetch_selected(&ctx, &gql_ctx.loaders, APP_TYPE, std::slice::from_ref(&app));
                Ok(Some(node_value(app)))
            })
        }
    }
}

/// Resolver for `_health`.
pub struct HealthResolver;

impl HealthResolver {
    /// Creates the resolver function. Never touches the upstream.
    pub fn resolve() -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        |_ctx| FieldFuture::from_value(Some(Value::from("ok")))
    }
}
