//! GraphQL execution context.
//!
//! The context is constructed per request and holds everything resolvers
//! need: the request id for log correlation and the request's
//! [`DataLoaders`], which in turn own the request cache and the forwarded
//! credential. Nothing in the context is shared with other requests.
//!
//! # Example
//!
//! ```ignore
//! use grapi_graphql::GraphQLContextBuilder;
//!
//! let context = GraphQLContextBuilder::new()
//!     .with_upstream(upstream.clone())
//!     .with_base_url("https://api.sys.example.com")
//!     .with_credential(Some(Credential::new("bearer ...")))
//!     .with_request_id("req-123")
//!     .build()?;
//! ```

use crate::loaders::{DataLoaders, LoaderSettings};
use crate::upstream::{Credential, DynUpstream};

/// GraphQL execution context.
///
/// Passed to the executor as request data; resolvers reach it through
/// [`crate::resolvers`] helpers.
#[derive(Clone, Debug)]
pub struct GraphQLContext {
    /// Request ID for tracing and correlation.
    pub request_id: String,

    /// DataLoaders for batched, deduplicated upstream loading.
    pub loaders: DataLoaders,
}

impl GraphQLContext {
    /// Creates a new builder for GraphQLContext.
    #[must_use]
    pub fn builder() -> GraphQLContextBuilder {
        GraphQLContextBuilder::default()
    }
}

/// Builder for constructing GraphQLContext.
#[derive(Default)]
pub struct GraphQLContextBuilder {
    upstream: Option<DynUpstream>,
    base_url: Option<String>,
    credential: Option<Credential>,
    request_id: Option<String>,
    loader_settings: LoaderSettings,
}

impl GraphQLContextBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the upstream client.
    #[must_use]
    pub fn with_upstream(mut self, upstream: DynUpstream) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Sets the upstream API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the credential forwarded to the upstream.
    #[must_use]
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Sets the batching parameters.
    #[must_use]
    pub fn with_loader_settings(mut self, settings: LoaderSettings) -> Self {
        self.loader_settings = settings;
        self
    }

    /// Builds the GraphQLContext.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<GraphQLContext, ContextBuilderError> {
        let upstream = self
            .upstream
            .ok_or(ContextBuilderError::MissingField("upstream"))?;

        let base_url = self
            .base_url
            .ok_or(ContextBuilderError::MissingField("base_url"))?;

        let request_id = self
            .request_id
            .ok_or(ContextBuilderError::MissingField("request_id"))?;

        // Fresh loaders, and with them a fresh request cache, for every request
        let loaders = DataLoaders::new(upstream, &base_url, self.credential, &self.loader_settings);

        Ok(GraphQLContext {
            request_id,
            loaders,
        })
    }
}

/// Errors that can occur when building a GraphQLContext.
#[derive(Debug, thiserror::Error)]
pub enum ContextBuilderError {
    /// A required field was not provided.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
