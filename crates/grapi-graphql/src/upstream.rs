//! Upstream platform API client.
//!
//! Every piece of data the GraphQL layer serves comes from a single
//! authenticated `GET` against the platform's REST API. This module defines
//! the fetcher seam ([`UpstreamClient`]) and its reqwest-backed
//! implementation ([`HttpUpstream`]).
//!
//! The fetcher never retries and never caches; deduplication and batching are
//! the loaders' job (see [`crate::loaders`]).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::FetchError;

/// Upstream connection settings, read from the `[upstream]` config section.
///
/// ```toml
/// [upstream]
/// api_url = "https://api.sys.example.com"
/// force_http = false
/// timeout_ms = 30000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamConfig {
    /// Base URL of the platform API. Relative paths are appended to it.
    #[serde(default)]
    pub api_url: String,

    /// Rewrite `https` URLs to `http` before fetching.
    /// Needed by deployments that terminate TLS in front of the API but
    /// still advertise `https` links in payloads.
    #[serde(default)]
    pub force_http: bool,

    /// Optional per-request timeout. Unset means no timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl UpstreamConfig {
    /// Creates a configuration for the given API base URL.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Enables or disables the https to http downgrade.
    #[must_use]
    pub fn with_force_http(mut self, force_http: bool) -> Self {
        self.force_http = force_http;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Returns the per-request timeout, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is missing or not an http(s) URL.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.trim().is_empty() {
            return Err("upstream.api_url is required".into());
        }
        let parsed = Url::parse(&self.api_url)
            .map_err(|e| format!("upstream.api_url is not a valid URL: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err("upstream.api_url must use http or https".into());
        }
        if self.timeout_ms == Some(0) {
            return Err("upstream.timeout_ms must be > 0 when set".into());
        }
        Ok(())
    }

    /// Returns the API base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

/// The `Authorization` header value of the incoming request.
///
/// Forwarded verbatim to every upstream fetch made on behalf of that request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw header value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Fetches one JSON document from the platform API.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Performs exactly one `GET` of `url`.
    ///
    /// Returns the parsed body for any 2xx response.
    async fn get_json(
        &self,
        url: &str,
        credential: Option<&Credential>,
    ) -> Result<serde_json::Value, FetchError>;
}

/// Shared handle to an upstream client.
pub type DynUpstream = Arc<dyn UpstreamClient>;

/// reqwest-backed [`UpstreamClient`].
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    force_http: bool,
}

impl HttpUpstream {
    /// Creates a client from the upstream configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            force_http: config.force_http,
        })
    }

    /// Wraps the client into a [`DynUpstream`].
    #[must_use]
    pub fn into_dyn(self) -> DynUpstream {
        Arc::new(self)
    }

    /// Resolves the URL actually requested, applying the scheme downgrade.
    fn target_url(&self, url: &str) -> Result<Url, FetchError> {
        let mut target = Url::parse(url).map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("invalid URL: {e}"),
        })?;

        if self.force_http && target.scheme() == "https" && target.set_scheme("http").is_err() {
            warn!(url = %url, "Could not downgrade upstream URL scheme");
        }

        Ok(target)
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn get_json(
        &self,
        url: &str,
        credential: Option<&Credential>,
    ) -> Result<serde_json::Value, FetchError> {
        let target = self.target_url(url)?;

        debug!(path = %target.path(), query = ?target.query(), "Upstream request");

        let mut request = self
            .client
            .get(target.as_str())
            .header(ACCEPT, "application/json");
        if let Some(credential) = credential {
            request = request.header(AUTHORIZATION, credential.as_str());
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Upstream request failed");
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!(
            path = %target.path(),
            status = status.as_u16(),
            bytes = body.len(),
            "Upstream response"
        );
        trace!(path = %target.path(), body = %body, "Upstream response body");

        if !status.is_success() {
            return Err(FetchError::Upstream {
                url: url.to_string(),
                status: status.as_u16(),
                body: Some(body).filter(|b| !b.is_empty()),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
