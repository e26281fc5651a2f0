//! GraphQL schema building.
//!
//! The schema is fixed: a read-only `Query` root over apps and the resources
//! reachable from them. It is built once at startup and shared by every
//! request; per-request state travels in [`GraphQLContext`](crate::GraphQLContext).

mod builder;

pub use builder::{
    APP_TYPE, DOMAIN_TYPE, DROPLET_TYPE, INSTANCE_TYPE, PACKAGE_TYPE, PROCESS_TYPE,
    PlatformSchemaBuilder, ROUTE_TYPE, SchemaBuilderConfig,
};
