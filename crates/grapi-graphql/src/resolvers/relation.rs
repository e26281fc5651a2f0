//! One-hop relation resolver.
//!
//! Follows one hyperlink of the parent node through the loader matching the
//! target's envelope. `Resources` targets resolve to lists, `Raw` and
//! `Entity` targets to a single node.

use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use tracing::{debug, warn};

use super::prefetch::prefetch_selected;
use super::{fetch_error, get_graphql_context, node_list, node_value, parent_node};
use crate::loaders::{Envelope, LoaderKey, ResourceLoad};
use crate::model::ResourceNode;
use crate::schema::{
    APP_TYPE, DOMAIN_TYPE, DROPLET_TYPE, INSTANCE_TYPE, PACKAGE_TYPE, PROCESS_TYPE, ROUTE_TYPE,
};

/// Where a relation's URL lives in the parent payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hyperlink {
    /// `links.<name>.href` of a v3 resource.
    Link(&'static str),
    /// A `*_url` attribute of a legacy entity, absolute or relative.
    Attribute(&'static str),
}

impl Hyperlink {
    /// Returns the href named by this hyperlink, if the node has one.
    #[must_use]
    pub fn href(self, node: &ResourceNode) -> Option<String> {
        match self {
            Self::Link(name) => node.link(name).map(|key| key.as_str().to_string()),
            Self::Attribute(name) => node.str_field(name).map(str::to_string),
        }
    }
}

/// A field that is one fetch away from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// GraphQL field name.
    pub field: &'static str,
    /// GraphQL type of the target node(s).
    pub target: &'static str,
    /// Where the target's URL is found in the parent.
    pub hyperlink: Hyperlink,
    /// How the fetched payload is unwrapped. `Resources` means a list field.
    pub envelope: Envelope,
    /// Field description.
    pub description: &'static str,
}

pub const APP_RELATIONS: &[Relation] = &[
    Relation {
        field: "packages",
        target: PACKAGE_TYPE,
        hyperlink: Hyperlink::Link("packages"),
        envelope: Envelope::Resources,
        description: "Packages of the app",
    },
    Relation {
        field: "processes",
        target: PROCESS_TYPE,
        hyperlink: Hyperlink::Link("processes"),
        envelope: Envelope::Resources,
        description: "Processes of the app",
    },
    Relation {
        field: "droplets",
        target: DROPLET_TYPE,
        hyperlink: Hyperlink::Link("droplets"),
        envelope: Envelope::Resources,
        description: "Droplets of the app",
    },
    Relation {
        field: "currentDroplet",
        target: DROPLET_TYPE,
        hyperlink: Hyperlink::Link("current_droplet"),
        envelope: Envelope::Raw,
        description: "The droplet the app currently runs",
    },
];

pub const PROCESS_RELATIONS: &[Relation] = &[Relation {
    field: "stats",
    target: INSTANCE_TYPE,
    hyperlink: Hyperlink::Link("stats"),
    envelope: Envelope::Resources,
    description: "Runtime statistics of every instance",
}];

pub const ROUTE_RELATIONS: &[Relation] = &[Relation {
    field: "domain",
    target: DOMAIN_TYPE,
    hyperlink: Hyperlink::Attribute("domain_url"),
    envelope: Envelope::Entity,
    description: "Domain the route belongs to",
}];

/// Returns the one-hop relations of an object type.
#[must_use]
pub fn relations_of(type_name: &str) -> &'static [Relation] {
    match type_name {
        APP_TYPE => APP_RELATIONS,
        PROCESS_TYPE => PROCESS_RELATIONS,
        ROUTE_TYPE => ROUTE_RELATIONS,
        _ => &[],
    }
}

/// Resolver for relations that are one fetch away from the parent.
pub struct RelationResolver;

impl RelationResolver {
    /// Creates a resolver following `relation.hyperlink` and unwrapping with
    /// `relation.envelope`.
    ///
    /// A parent without the hyperlink resolves to `null`.
    pub fn resolve(
        relation: Relation,
    ) -> impl Fn(ResolverContext<'_>) -> FieldFuture<'_> + Send + Sync + Clone {
        move |ctx| {
            FieldFuture::new(async move {
                let node = parent_node(&ctx)?;
                let Some(href) = relation.hyperlink.href(node) else {
                    debug!(field = relation.field, "Parent has no hyperlink for relation");
                    return Ok(None::<FieldValue<'_>>);
                };

                let gql_ctx = get_graphql_context(&ctx)?;
                let loader = gql_ctx.loaders.for_envelope(relation.envelope);
                let key: LoaderKey = loader.key_for(&href);

                let body = loader.load_one(key.clone()).await.map_err(|e| {
                    warn!(error = %e, key = %key, "Failed to resolve relation");
                    fetch_error(&e)
                })?;

                let value = match relation.envelope {
                    Envelope::Resources => {
                        let nodes = ResourceNode::list(body);
                        prefetch_selected(&ctx, &gql_ctx.loaders, relation.target, &nodes);
                        node_list(nodes)
                    }
                    Envelope::Raw | Envelope::Entity => {
                        let node = ResourceNode::with_guid_from(body, &key);
                        prefetch_selected(
                            &ctx,
                            &gql_ctx.loaders,
                            relation.target,
                            std::slice::from_ref(&node),
                        );
                        node_value(node)
                    }
                };
                Ok(Some(value))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hyperlink_href() {
        let app = ResourceNode::new(json!({
            "links": {"packages": {"href": "http://api/v3/apps/a1/packages"}}
        }));
        let route = ResourceNode::new(json!({"domain_url": "/v2/shared_domains/d1"}));

        assert_eq!(
            Hyperlink::Link("packages").href(&app).as_deref(),
            Some("http://api/v3/apps/a1/packages")
        );
        assert_eq!(
            Hyperlink::Attribute("domain_url").href(&route).as_deref(),
            Some("/v2/shared_domains/d1")
        );
        assert_eq!(Hyperlink::Link("droplets").href(&app), None);
    }

    #[test]
    fn test_relations_of() {
        let app_fields: Vec<&str> = relations_of(APP_TYPE).iter().map(|r| r.field).collect();
        assert_eq!(app_fields, ["packages", "processes", "droplets", "currentDroplet"]);
        assert_eq!(relations_of(ROUTE_TYPE)[0].envelope, Envelope::Entity);
        assert!(relations_of(PACKAGE_TYPE).is_empty());
    }
}
