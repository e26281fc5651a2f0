//! DataLoaders for batched, deduplicated upstream loading.
//!
//! A GraphQL query fans out across nested relations (an app's packages and
//! processes, each process's routes, each route's domain). Without batching
//! every leaf would cost one HTTP call. The loaders in this module make sure
//! that within one request:
//!
//! - every distinct [`LoaderKey`] is fetched at most once, including keys
//!   requested concurrently while their fetch is still in flight;
//! - keys requested in the same scheduling turn are dispatched as one batch
//!   whose members settle independently;
//! - failures are memoized and replayed, never retried.
//!
//! ## Overview
//!
//! - [`UpstreamLoader`] - async-graphql batching engine over the fetcher
//! - [`RequestCache`] - per-request key to outcome table
//! - [`EnvelopeLoader`] - applies one [`Envelope`] policy, implements [`ResourceLoad`]
//! - [`DataLoaders`] - the set of loaders handed to resolvers
//!
//! ## Usage
//!
//! DataLoaders are created per-request and added to the GraphQL context:
//!
//! ```ignore
//! let loaders = DataLoaders::new(upstream, "https://api.example.com", credential, &settings);
//! let packages = loaders.resources.load_one(LoaderKey::new(href)).await?;
//! ```

mod batch;
mod cache;
mod envelope;

pub use batch::{FetchOutcome, LoadStats, UpstreamLoader};
pub use cache::{CacheState, RequestCache, RequestStats};
pub use envelope::{Envelope, EnvelopeLoader, ResourceLoad};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_graphql::dataloader::DataLoader;

use crate::error::FetchError;
use crate::upstream::{Credential, DynUpstream};

/// Result of a load after the envelope policy has been applied.
pub type LoadResult = Result<serde_json::Value, Arc<FetchError>>;

/// Identifies one fetchable upstream document by its absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderKey(String);

impl LoaderKey {
    /// Creates a key from an absolute URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Creates a key for a path relative to the API base URL.
    #[must_use]
    pub fn relative(base_url: &str, path: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        if path.starts_with('/') {
            Self(format!("{base}{path}"))
        } else {
            Self(format!("{base}/{path}"))
        }
    }

    /// Creates a key for an href taken from a payload.
    ///
    /// Absolute URLs are kept as they are; anything else is treated as a path
    /// relative to the API base URL (legacy entities carry `/v2/...` paths).
    #[must_use]
    pub fn resolve(base_url: &str, href: &str) -> Self {
        if href.starts_with("http://") || href.starts_with("https://") {
            Self::new(href)
        } else {
            Self::relative(base_url, href)
        }
    }

    /// Returns the URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Batching parameters of the per-request loaders.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// How long to wait for more keys before dispatching a batch.
    pub delay: Duration,
    /// Maximum number of keys in one batch.
    pub max_batch_size: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1),
            max_batch_size: 100,
        }
    }
}

/// Collection of all DataLoaders for a GraphQL request.
///
/// All three loaders share one batching engine and one [`RequestCache`], so
/// a URL reached through different relations is still fetched once. The
/// set is created once per request and must never be shared across
/// requests: it carries the request's credential.
#[derive(Clone)]
pub struct DataLoaders {
    /// Pass-through loader for bare objects.
    pub raw: EnvelopeLoader,

    /// Loader unwrapping `{"entity": {...}}` envelopes.
    pub entity: EnvelopeLoader,

    /// Loader unwrapping `{"resources": [...]}` envelopes.
    pub resources: EnvelopeLoader,

    cache: Arc<RequestCache>,
}

impl DataLoaders {
    /// Creates the loaders for one request.
    #[must_use]
    pub fn new(
        upstream: DynUpstream,
        base_url: &str,
        credential: Option<Credential>,
        settings: &LoaderSettings,
    ) -> Self {
        let stats = Arc::new(LoadStats::default());
        let engine = DataLoader::new(
            UpstreamLoader::new(upstream, credential, Arc::clone(&stats)),
            tokio::spawn,
        )
        .delay(settings.delay)
        .max_batch_size(settings.max_batch_size);

        let cache = Arc::new(RequestCache::new(engine, stats));
        let base_url: Arc<str> = Arc::from(base_url.trim_end_matches('/'));

        Self {
            raw: EnvelopeLoader::new(Envelope::Raw, Arc::clone(&cache), Arc::clone(&base_url)),
            entity: EnvelopeLoader::new(
                Envelope::Entity,
                Arc::clone(&cache),
                Arc::clone(&base_url),
            ),
            resources: EnvelopeLoader::new(Envelope::Resources, Arc::clone(&cache), base_url),
            cache,
        }
    }

    /// Returns the loader applying `envelope`.
    #[must_use]
    pub fn for_envelope(&self, envelope: Envelope) -> &EnvelopeLoader {
        match envelope {
            Envelope::Raw => &self.raw,
            Envelope::Entity => &self.entity,
            Envelope::Resources => &self.resources,
        }
    }

    /// Returns the lifecycle state of the request cache.
    #[must_use]
    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Returns the upstream traffic counters of this request.
    #[must_use]
    pub fn stats(&self) -> RequestStats {
        self.cache.stats()
    }
}

impl fmt::Debug for DataLoaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoaders")
            .field("raw", &"EnvelopeLoader<Raw>")
            .field("entity", &"EnvelopeLoader<Entity>")
            .field("resources", &"EnvelopeLoader<Resources>")
            .field("stats", &self.stats())
            .finish()
    }
}
