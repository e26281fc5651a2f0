//! Per-request memoization of upstream fetches.
//!
//! The [`RequestCache`] maps every [`LoaderKey`] requested during one GraphQL
//! query to a shared future of its outcome. The first load of a key creates
//! the future and submits the key to the batching engine; every later load
//! of the same key, whether the first one is still pending or already
//! settled, gets a clone of the same future. Failed fetches are memoized
//! like successful ones.
//!
//! The cache is created empty with the request and dropped with it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_graphql::dataloader::DataLoader;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, trace};

use super::LoaderKey;
use super::batch::{FetchOutcome, LoadStats, UpstreamLoader};
use crate::error::FetchError;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Lifecycle of a request cache.
///
/// There is no `Discarded` variant: a cache is discarded by dropping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No key has been requested yet.
    Created,
    /// At least one key is pending or settled.
    Populated,
}

/// Snapshot of a request's upstream traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestStats {
    /// Distinct keys requested.
    pub keys: usize,
    /// Batches dispatched to the upstream.
    pub batches: usize,
    /// Upstream fetches issued.
    pub fetches: usize,
    /// Upstream fetches that failed.
    pub failures: usize,
}

/// Key to pending-or-settled outcome table for one request.
pub struct RequestCache {
    engine: Arc<DataLoader<UpstreamLoader>>,
    entries: Mutex<HashMap<LoaderKey, SharedFetch>>,
    stats: Arc<LoadStats>,
}

impl RequestCache {
    /// Creates an empty cache in front of a batching engine.
    #[must_use]
    pub fn new(engine: DataLoader<UpstreamLoader>, stats: Arc<LoadStats>) -> Self {
        Self {
            engine: Arc::new(engine),
            entries: Mutex::new(HashMap::new()),
            stats,
        }
    }

    /// Loads a key, reusing the pending or settled outcome when present.
    ///
    /// The returned future submits the key to the current batch window the
    /// first time any clone of it is polled.
    pub fn load(&self, key: LoaderKey) -> impl Future<Output = FetchOutcome> + Send + 'static {
        self.entry(key).0
    }

    /// Submits a key to the current batch window without waiting for it.
    ///
    /// Later loads of the key share the in-flight fetch. Returns `false` when
    /// the key was already requested.
    pub fn prefetch(&self, key: LoaderKey) -> bool {
        let (fetch, fresh) = self.entry(key);
        if fresh {
            tokio::spawn(fetch);
        }
        fresh
    }

    /// Returns the shared fetch of `key`, creating it on first use.
    fn entry(&self, key: LoaderKey) -> (SharedFetch, bool) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = entries.get(&key) {
            trace!(key = %key, "Request cache hit");
            return (existing.clone(), false);
        }

        trace!(key = %key, "Request cache miss");
        let engine = Arc::clone(&self.engine);
        let fetch = {
            let key = key.clone();
            async move {
                match engine.load_one(key.clone()).await {
                    Ok(Some(outcome)) => outcome,
                    Ok(None) => Err(Arc::new(FetchError::Malformed {
                        url: key.to_string(),
                        reason: "batch returned no result for key".into(),
                    })),
                    Err(never) => match never {},
                }
            }
            .boxed()
            .shared()
        };

        entries.insert(key, fetch.clone());
        (fetch, true)
    }

    /// Returns the number of distinct keys requested so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether no key has been requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the lifecycle state of the cache.
    #[must_use]
    pub fn state(&self) -> CacheState {
        if self.is_empty() {
            CacheState::Created
        } else {
            CacheState::Populated
        }
    }

    /// Returns the traffic counters of this request.
    #[must_use]
    pub fn stats(&self) -> RequestStats {
        RequestStats {
            keys: self.len(),
            batches: self.stats.batches(),
            fetches: self.stats.fetches(),
            failures: self.stats.failures(),
        }
    }
}

impl Drop for RequestCache {
    fn drop(&mut self) {
        let stats = self.stats();
        debug!(
            keys = stats.keys,
            batches = stats.batches,
            fetches = stats.fetches,
            failures = stats.failures,
            "Request cache discarded"
        );
    }
}
