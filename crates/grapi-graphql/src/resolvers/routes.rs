//! `Process.routes` resolver.
//!
//! Routes are not linked from a process. They hang off the process's app as
//! route mappings, each naming the process type it sends traffic to, so the
//! relation takes three dependent hops:
//!
//! 1. the parent app (`links.app`, bare object)
//! 2. the app's route mappings (`links.route_mappings`, list envelope)
//! 3. every route matched for this process type (`links.route`, entity
//!    envelope), loaded together
//!
//! Each hop goes through the request loaders, so processes of the same app
//! share the app and mapping fetches and a route mapped to several
//! processes is fetched once.

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, ResolverContext};
use tracing::{debug, warn};

use super::prefetch::prefetch_selected;
use super::relation::Hyperlink;
use super::{fetch_error, get_graphql_context, node_list, parent_node};
use crate::error::FetchError;
use crate::loaders::{DataLoaders, Envelope, LoaderKey, ResourceLoad};
use crate::model::{DEFAULT_PROCESS_TYPE, ResourceNode, RouteMapping};
use crate::schema::ROUTE_TYPE;

/// The process's app, the only hop known before anything is fetched.
pub(crate) const ROUTES_FIRST_HOP: (Hyperlink, Envelope) = (Hyperlink::Link("app"), Envelope::Raw);

/// Resolves the routes serving `process`, in mapping order.
///
/// A process without an app link, or an app without a route mappings link,
/// has no routes.
///
/// # Errors
///
/// Returns the first failed fetch. A failed route fails the whole list.
pub async fn process_routes(
    loaders: &DataLoaders,
    process: &ResourceNode,
) -> Result<Vec<ResourceNode>, Arc<FetchError>> {
    let (app_link, app_envelope) = ROUTES_FIRST_HOP;
    let Some(app_href) = app_link.href(process) else {
        return Ok(Vec::new());
    };
    let process_type = process.str_field("type").unwrap_or(DEFAULT_PROCESS_TYPE);

    let app_loader = loaders.for_envelope(app_envelope);
    let app = ResourceNode::new(app_loader.load_one(app_loader.key_for(&app_href)).await?);
    let Some(mappings_key) = app.link("route_mappings") else {
        return Ok(Vec::new());
    };

    let body = loaders.resources.load_one(mappings_key.clone()).await?;
    let mappings: Vec<RouteMapping> = serde_json::from_value(body).map_err(|e| {
        Arc::new(FetchError::Malformed {
            url: mappings_key.to_string(),
            reason: format!("invalid route mapping: {e}"),
        })
    })?;

    let mut seen = HashSet::new();
    let route_keys: Vec<LoaderKey> = mappings
        .iter()
        .filter(|mapping| mapping.targets_process(process_type))
        .filter_map(RouteMapping::route_key)
        .filter(|key| seen.insert(key.clone()))
        .collect();

    debug!(
        process_type = %process_type,
        mappings = mappings.len(),
        routes = route_keys.len(),
        "Matched route mappings"
    );

    let mut routes = loaders.entity.load_many(route_keys.clone()).await;
    route_keys
        .into_iter()
        .map(|key| -> Result<ResourceNode, Arc<FetchError>> {
            let body = routes.remove(&key).unwrap_or_else(|| {
                Err(Arc::new(FetchError::Malformed {
                    url: key.to_string(),
                    reason: "route missing from batch result".into(),
                }))
            })?;
            Ok(ResourceNode::with_guid_from(body, &key))
        })
        .collect()
}

/// Resolver for `Process.routes`.
pub struct ProcessRoutesResolver;

impl ProcessRoutesResolver {
    /// Creates the resolver function.
    pub fn resolve() -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        |ctx| {
            FieldFuture::new(async move {
                let process = parent_node(&ctx)?;
                let gql_ctx = get_graphql_context(&ctx)?;

                let routes = process_routes(&gql_ctx.loaders, process)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Failed to resolve process routes");
                        fetch_error(&e)
                    })?;

                prefetch_selected(&ctx, &gql_ctx.loaders, ROUTE_TYPE, &routes);
                Ok(Some(node_list(routes)))
            })
        }
    }
}
