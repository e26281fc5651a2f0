//! Platform GraphQL schema builder.
//!
//! This module provides `PlatformSchemaBuilder`, which assembles the fixed
//! resource schema with async-graphql's dynamic schema API. Every object
//! type is a [`ResourceNode`](crate::model::ResourceNode) underneath; fields
//! are either attributes (JSON pointers into the node) or relations
//! (loader-backed resolvers).

use async_graphql::dynamic::{Field, InputValue, Object, Schema, TypeRef};
use tracing::{debug, trace};

use crate::error::GraphQLError;
use crate::loaders::Envelope;
use crate::resolvers::{
    APP_RELATIONS, AppResolver, AppsResolver, AttributeResolver, HealthResolver,
    PROCESS_RELATIONS, ProcessRoutesResolver, ROUTE_RELATIONS, Relation, RelationResolver,
};

pub const APP_TYPE: &str = "App";
pub const PACKAGE_TYPE: &str = "Package";
pub const DROPLET_TYPE: &str = "Droplet";
pub const PROCESS_TYPE: &str = "Process";
pub const INSTANCE_TYPE: &str = "Instance";
pub const ROUTE_TYPE: &str = "Route";
pub const DOMAIN_TYPE: &str = "Domain";

/// An attribute field: GraphQL name, scalar type, JSON pointer, description.
type AttributeDef = (&'static str, &'static str, &'static str, &'static str);

const APP_ATTRIBUTES: &[AttributeDef] = &[
    ("guid", TypeRef::STRING, "/guid", "Guid of the app"),
    ("name", TypeRef::STRING, "/name", "Name of the app"),
    ("state", TypeRef::STRING, "/state", "Desired state of the app (STARTED or STOPPED)"),
    ("createdAt", TypeRef::STRING, "/created_at", "Creation timestamp"),
    ("updatedAt", TypeRef::STRING, "/updated_at", "Last update timestamp"),
];

const PACKAGE_ATTRIBUTES: &[AttributeDef] = &[
    ("guid", TypeRef::STRING, "/guid", "Guid of the package"),
    ("type", TypeRef::STRING, "/type", "Package type (bits or docker)"),
    ("state", TypeRef::STRING, "/state", "State of the package"),
    ("createdAt", TypeRef::STRING, "/created_at", "Creation timestamp"),
];

const DROPLET_ATTRIBUTES: &[AttributeDef] = &[
    ("guid", TypeRef::STRING, "/guid", "Guid of the droplet"),
    ("state", TypeRef::STRING, "/state", "State of the droplet"),
    ("error", TypeRef::STRING, "/error", "Staging error, if staging failed"),
    ("stack", TypeRef::STRING, "/stack", "Root filesystem the droplet runs on"),
    ("createdAt", TypeRef::STRING, "/created_at", "Creation timestamp"),
];

const PROCESS_ATTRIBUTES: &[AttributeDef] = &[
    ("guid", TypeRef::STRING, "/guid", "Guid of the process"),
    ("type", TypeRef::STRING, "/type", "Identifier of the process within its app"),
    ("command", TypeRef::STRING, "/command", "Start command"),
    ("instances", TypeRef::INT, "/instances", "The number of instances to run"),
    ("memoryInMb", TypeRef::INT, "/memory_in_mb", "Memory limit per instance"),
    ("diskInMb", TypeRef::INT, "/disk_in_mb", "Disk limit per instance"),
];

const INSTANCE_ATTRIBUTES: &[AttributeDef] = &[
    ("index", TypeRef::INT, "/index", "Instance index"),
    ("state", TypeRef::STRING, "/state", "Instance state"),
    ("host", TypeRef::STRING, "/host", "Cell host the instance runs on"),
    ("uptime", TypeRef::INT, "/uptime", "Uptime in seconds"),
    ("cpu", TypeRef::FLOAT, "/usage/cpu", "CPU usage ratio"),
    ("memoryUsage", TypeRef::INT, "/usage/mem", "Memory usage in bytes"),
    ("diskUsage", TypeRef::INT, "/usage/disk", "Disk usage in bytes"),
    ("memoryQuota", TypeRef::INT, "/mem_quota", "Memory quota in bytes"),
    ("diskQuota", TypeRef::INT, "/disk_quota", "Disk quota in bytes"),
];

const ROUTE_ATTRIBUTES: &[AttributeDef] = &[
    ("guid", TypeRef::STRING, "/guid", "Guid of the route"),
    ("host", TypeRef::STRING, "/host", "Hostname part of the route"),
    ("path", TypeRef::STRING, "/path", "Path part of the route"),
    ("port", TypeRef::INT, "/port", "Port of a TCP route"),
];

const DOMAIN_ATTRIBUTES: &[AttributeDef] = &[
    ("guid", TypeRef::STRING, "/guid", "Guid of the domain"),
    ("name", TypeRef::STRING, "/name", "Domain name"),
];

/// Configuration for the schema builder.
#[derive(Debug, Clone)]
pub struct SchemaBuilderConfig {
    /// Maximum query depth allowed.
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    pub max_complexity: usize,

    /// Whether to enable introspection queries.
    pub introspection_enabled: bool,
}

impl Default for SchemaBuilderConfig {
    fn default() -> Self {
        Self {
            max_depth: 15,
            max_complexity: 500,
            introspection_enabled: true,
        }
    }
}

/// Builds the platform GraphQL schema.
///
/// # Example
///
/// ```ignore
/// let schema = PlatformSchemaBuilder::new(SchemaBuilderConfig::default()).build()?;
/// ```
pub struct PlatformSchemaBuilder {
    config: SchemaBuilderConfig,
}

impl PlatformSchemaBuilder {
    /// Creates a new schema builder.
    #[must_use]
    pub fn new(config: SchemaBuilderConfig) -> Self {
        Self { config }
    }

    /// Builds the GraphQL schema.
    ///
    /// # Errors
    ///
    /// Returns an error if schema construction fails.
    pub fn build(&self) -> Result<Schema, GraphQLError> {
        debug!("Starting GraphQL schema build");

        let mut schema_builder = Schema::build("Query", None, None)
            .register(Self::build_query_type())
            .register(Self::build_app_type())
            .register(Self::build_process_type())
            .register(Self::build_route_type());

        for (name, description, attributes) in [
            (
                PACKAGE_TYPE,
                "An application's source code, either raw bits or a pointer to them.",
                PACKAGE_ATTRIBUTES,
            ),
            (
                DROPLET_TYPE,
                "The result of staging an application package.",
                DROPLET_ATTRIBUTES,
            ),
            (
                INSTANCE_TYPE,
                "Runtime statistics of one running process instance.",
                INSTANCE_ATTRIBUTES,
            ),
            (
                DOMAIN_TYPE,
                "A domain routes are registered under.",
                DOMAIN_ATTRIBUTES,
            ),
        ] {
            let object = Object::new(name).description(description);
            schema_builder = schema_builder.register(with_attributes(object, attributes));
        }

        let mut schema_builder = schema_builder
            .limit_depth(self.config.max_depth)
            .limit_complexity(self.config.max_complexity);

        if !self.config.introspection_enabled {
            schema_builder = schema_builder.disable_introspection();
        }

        let schema = schema_builder
            .finish()
            .map_err(|e| GraphQLError::SchemaBuildFailed(e.to_string()))?;

        debug!("GraphQL schema build complete");
        Ok(schema)
    }

    /// Builds the Query root type.
    fn build_query_type() -> Object {
        Object::new("Query")
            .description("The root of all queries")
            .field(
                Field::new("apps", TypeRef::named_list(APP_TYPE), AppsResolver::resolve())
                    .argument(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
                    .description("List of apps, at most `limit` when given"),
            )
            .field(
                Field::new("app", TypeRef::named(APP_TYPE), AppResolver::resolve())
                    .argument(InputValue::new("guid", TypeRef::named_nn(TypeRef::STRING)))
                    .description("A single app by guid"),
            )
            .field(
                Field::new("_health", TypeRef::named(TypeRef::STRING), HealthResolver::resolve())
                    .description("Health check endpoint"),
            )
    }

    fn build_app_type() -> Object {
        let app = Object::new(APP_TYPE).description(
            "Top-level object linking together the packages, droplets and processes of an \
             application.",
        );
        trace!(type_name = APP_TYPE, "Building object type");

        with_relations(with_attributes(app, APP_ATTRIBUTES), APP_RELATIONS)
    }

    fn build_process_type() -> Object {
        let process = Object::new(PROCESS_TYPE).description("The runnable units of an app.");
        trace!(type_name = PROCESS_TYPE, "Building object type");

        with_relations(with_attributes(process, PROCESS_ATTRIBUTES), PROCESS_RELATIONS).field(
            Field::new(
                "routes",
                TypeRef::named_list(ROUTE_TYPE),
                ProcessRoutesResolver::resolve(),
            )
            .description("Routes mapped to this process type"),
        )
    }

    fn build_route_type() -> Object {
        let route =
            Object::new(ROUTE_TYPE).description("An address that sends traffic to an app.");
        trace!(type_name = ROUTE_TYPE, "Building object type");

        with_relations(with_attributes(route, ROUTE_ATTRIBUTES), ROUTE_RELATIONS)
    }
}

/// Adds attribute fields to an object type.
fn with_attributes(mut object: Object, attributes: &[AttributeDef]) -> Object {
    for &(name, type_name, pointer, description) in attributes {
        object = object.field(
            Field::new(name, TypeRef::named(type_name), AttributeResolver::resolve(pointer))
                .description(description),
        );
    }
    object
}

/// Adds loader-backed relation fields to an object type.
///
/// `Resources` relations are lists, the others single objects.
fn with_relations(mut object: Object, relations: &[Relation]) -> Object {
    for &relation in relations {
        let type_ref = match relation.envelope {
            Envelope::Resources => TypeRef::named_list(relation.target),
            Envelope::Raw | Envelope::Entity => TypeRef::named(relation.target),
        };
        object = object.field(
            Field::new(relation.field, type_ref, RelationResolver::resolve(relation))
                .description(relation.description),
        );
    }
    object
}
