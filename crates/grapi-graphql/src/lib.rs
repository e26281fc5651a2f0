//! # grapi-graphql
//!
//! GraphQL facade over the platform's v3 REST API.
//!
//! This crate translates GraphQL queries over a fixed schema (apps and their
//! packages, processes, droplets, instances, routes and domains) into HTTP
//! GET calls against the upstream API. It supports:
//!
//! - Root queries `apps(limit:)` and `app(guid:)`
//! - Lazy, on-demand relation resolution along upstream hyperlinks
//! - Per-request batching and deduplication of upstream fetches
//! - Forwarding of the caller's `Authorization` header, per request
//!
//! ## Overview
//!
//! A query fans out across nested relations. Every resolver fetches through
//! the request's [`loaders::DataLoaders`], which coalesce the keys requested
//! in one scheduling turn into one batch and fetch every distinct URL at most
//! once per request, failures included.
//!
//! ## Endpoints
//!
//! - `POST /graphql` - GraphQL endpoint
//! - `GET /graphql` - GraphQL (query via URL param)
//!
//! ## Configuration
//!
//! Add to `grapi.toml`:
//!
//! ```toml
//! [graphql]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! batch_delay_ms = 1
//! max_batch_size = 100
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Configuration options
//! - [`upstream`] - Upstream HTTP fetcher
//! - [`loaders`] - Batched, deduplicating per-request loaders
//! - [`model`] - Resource graph nodes
//! - [`schema`] - Schema building
//! - [`resolvers`] - Field resolvers
//! - [`context`] - GraphQL execution context
//! - [`handler`] - Axum HTTP handlers
//! - [`error`] - Error types for GraphQL operations

pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod loaders;
pub mod model;
pub mod resolvers;
pub mod schema;
pub mod upstream;

// Re-export main types
pub use config::GraphQLConfig;
pub use context::{GraphQLContext, GraphQLContextBuilder};
pub use error::{FetchError, GraphQLError};
pub use handler::{GraphQLContextTemplate, GraphQLState, graphql_handler, graphql_handler_get};
pub use schema::{PlatformSchemaBuilder, SchemaBuilderConfig};
pub use upstream::{Credential, DynUpstream, HttpUpstream, UpstreamClient, UpstreamConfig};

/// Result type for GraphQL operations.
pub type Result<T> = std::result::Result<T, GraphQLError>;
