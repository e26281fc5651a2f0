//! Error types for GraphQL operations.
//!
//! Two families of errors live here:
//!
//! - [`FetchError`] - classified failures of a single upstream fetch. These are
//!   cached per key and surface as field-level GraphQL errors.
//! - [`GraphQLError`] - request-level failures that prevent a query from being
//!   executed at all and are rendered by the HTTP handler.

use std::fmt;

use async_graphql::ErrorExtensions;

/// A classified failure of one upstream fetch.
///
/// Fetch errors are shared as `Arc<FetchError>` because a failed key is
/// replayed, not re-fetched, for every later load within the same request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The upstream API answered with a non-2xx status.
    #[error("upstream returned HTTP {status} for {url}")]
    Upstream {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, if one could be read.
        body: Option<String>,
    },

    /// The upstream answered 2xx but the payload was unusable.
    #[error("malformed upstream response from {url}: {reason}")]
    Malformed {
        /// Requested URL.
        url: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// The upstream API could not be reached.
    #[error("failed to reach upstream at {url}: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        message: String,
    },
}

impl FetchError {
    /// Returns the URL of the failed fetch.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Upstream { url, .. }
            | Self::Malformed { url, .. }
            | Self::Transport { url, .. } => {
                url
            }
        }
    }

    /// Returns the upstream HTTP status, when the upstream answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the error code for GraphQL error extensions.
    ///
    /// Malformed payloads are reported as upstream errors.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Upstream { .. } | Self::Malformed { .. } => "UPSTREAM_ERROR",
            Self::Transport { .. } => "TRANSPORT_ERROR",
        }
    }

    /// Converts the failure into a field-level GraphQL error.
    #[must_use]
    pub fn to_graphql_error(&self) -> async_graphql::Error {
        let status = self.status();
        let body = match self {
            Self::Upstream { body, .. } => body.clone(),
            _ => None,
        };
        async_graphql::Error::new(self.to_string()).extend_with(|_, ext| {
            ext.set("code", self.error_code());
            ext.set("url", self.url());
            if let Some(status) = status {
                ext.set("status", status);
            }
            if let Some(body) = &body {
                ext.set("upstreamBody", body.as_str());
            }
        })
    }
}

/// Errors that prevent a GraphQL request from executing.
#[derive(Debug)]
pub enum GraphQLError {
    /// Schema build failed.
    SchemaBuildFailed(String),

    /// Invalid query syntax or request parameters.
    InvalidQuery(String),

    /// Internal server error, e.g. a request context that could not be
    /// assembled.
    Internal(String),
}

impl fmt::Display for GraphQLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaBuildFailed(msg) => {
                write!(f, "Failed to build GraphQL schema: {msg}")
            }
            Self::InvalidQuery(msg) => {
                write!(f, "Invalid GraphQL request: {msg}")
            }
            Self::Internal(msg) => {
                write!(f, "Internal error: {msg}")
            }
        }
    }
}

impl std::error::Error for GraphQLError {}

impl GraphQLError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidQuery(_) => 400,
            Self::SchemaBuildFailed(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for GraphQL error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaBuildFailed(_) => "SCHEMA_BUILD_FAILED",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Renders the error as a GraphQL-shaped JSON body.
    #[must_use]
    pub fn to_response_body(&self) -> serde_json::Value {
        serde_json::json!({
            "errors": [{
                "message": self.to_string(),
                "extensions": {
                    "code": self.error_code()
                }
            }]
        })
    }
}
