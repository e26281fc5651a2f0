//! Early dispatch of child relations.
//!
//! The executor resolves the fields of a nested object one after another, so
//! a relation field only starts its fetch once the sibling before it has
//! settled. A resolver that produces nodes therefore submits the first
//! upstream hop of every relation selected below it before returning. The
//! hops of all produced nodes land in one batch window, and the field
//! resolvers find their keys pending or settled in the request cache.

use std::collections::HashSet;

use async_graphql::dynamic::ResolverContext;
use tracing::trace;

use super::relation::{Hyperlink, relations_of};
use super::routes::ROUTES_FIRST_HOP;
use crate::loaders::{DataLoaders, Envelope};
use crate::model::ResourceNode;
use crate::schema::PROCESS_TYPE;

/// First upstream hop of every loader-backed field of `type_name`.
fn first_hops(type_name: &str) -> Vec<(&'static str, Hyperlink, Envelope)> {
    let mut hops: Vec<_> = relations_of(type_name)
        .iter()
        .map(|relation| (relation.field, relation.hyperlink, relation.envelope))
        .collect();
    if type_name == PROCESS_TYPE {
        let (hyperlink, envelope) = ROUTES_FIRST_HOP;
        hops.push(("routes", hyperlink, envelope));
    }
    hops
}

/// Prefetches the relations selected under the current field for `nodes`
/// of type `type_name`.
pub(crate) fn prefetch_selected(
    ctx: &ResolverContext<'_>,
    loaders: &DataLoaders,
    type_name: &str,
    nodes: &[ResourceNode],
) -> usize {
    if nodes.is_empty() || first_hops(type_name).is_empty() {
        return 0;
    }
    let field = ctx.field();
    let selected: HashSet<String> = field
        .selection_set()
        .map(|child| child.name().to_string())
        .collect();
    prefetch_fields(loaders, type_name, &selected, nodes)
}

/// Submits the first hop of every `selected` relation of every node.
///
/// Returns the number of keys newly submitted.
pub(crate) fn prefetch_fields(
    loaders: &DataLoaders,
    type_name: &str,
    selected: &HashSet<String>,
    nodes: &[ResourceNode],
) -> usize {
    let mut submitted = 0;
    for (field, hyperlink, envelope) in first_hops(type_name) {
        if !selected.contains(field) {
            continue;
        }
        let loader = loaders.for_envelope(envelope);
        for href in nodes.iter().filter_map(|node| hyperlink.href(node)) {
            if loader.prefetch(loader.key_for(&href)) {
                submitted += 1;
            }
        }
    }
    if submitted > 0 {
        trace!(type_name, nodes = nodes.len(), submitted, "Prefetched child relations");
    }
    submitted
}
