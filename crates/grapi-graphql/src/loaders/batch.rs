//! Batching engine for upstream fetches.
//!
//! [`UpstreamLoader`] is the async-graphql [`Loader`] behind every per-request
//! loader. async-graphql collects the keys submitted within one batch window
//! and hands them over in a single call; every key of the batch is then
//! fetched concurrently and settles on its own.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_graphql::dataloader::Loader;
use futures_util::future::join_all;
use tracing::{debug, instrument, trace};

use super::LoaderKey;
use crate::error::FetchError;
use crate::upstream::{Credential, DynUpstream};

/// Raw result of one upstream fetch, as stored in the request cache.
pub type FetchOutcome = Result<Arc<serde_json::Value>, Arc<FetchError>>;

/// Counters describing the upstream traffic of one request.
#[derive(Debug, Default)]
pub struct LoadStats {
    batches: AtomicUsize,
    fetches: AtomicUsize,
    failures: AtomicUsize,
}

impl LoadStats {
    fn record_batch(&self, size: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.fetches.fetch_add(size, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of batches dispatched so far.
    #[must_use]
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    /// Number of upstream fetches issued so far.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of fetches that failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

/// DataLoader for fetching upstream documents by URL.
///
/// One instance exists per incoming request and carries that request's
/// credential, so fetches of concurrent requests never mix credentials.
pub struct UpstreamLoader {
    upstream: DynUpstream,
    credential: Option<Credential>,
    stats: Arc<LoadStats>,
}

impl UpstreamLoader {
    /// Creates a new upstream loader.
    #[must_use]
    pub fn new(
        upstream: DynUpstream,
        credential: Option<Credential>,
        stats: Arc<LoadStats>,
    ) -> Self {
        Self {
            upstream,
            credential,
            stats,
        }
    }
}

impl Loader<LoaderKey> for UpstreamLoader {
    type Value = FetchOutcome;
    type Error = Infallible;

    #[instrument(skip(self, keys), fields(key_count = keys.len()))]
    async fn load(
        &self,
        keys: &[LoaderKey],
    ) -> Result<HashMap<LoaderKey, Self::Value>, Self::Error> {
        debug!(key_count = keys.len(), "Dispatching upstream batch");
        self.stats.record_batch(keys.len());

        let fetches = keys.iter().map(|key| async move {
            trace!(key = %key, "Fetching upstream document");
            let outcome = self
                .upstream
                .get_json(key.as_str(), self.credential.as_ref())
                .await
                .map(Arc::new)
                .map_err(|e| {
                    debug!(key = %key, error = %e, "Upstream fetch failed");
                    self.stats.record_failure();
                    Arc::new(e)
                });
            (key.clone(), outcome)
        });

        let results: HashMap<LoaderKey, FetchOutcome> =
            join_all(fetches).await.into_iter().collect();

        debug!(
            requested = keys.len(),
            failed = results.values().filter(|r| r.is_err()).count(),
            "Upstream batch complete"
        );

        Ok(results)
    }
}
