//! Envelope-aware loaders.
//!
//! The platform API wraps payloads in one of three shapes: a list envelope
//! (`{"resources": [...]}`), a legacy single-entity envelope
//! (`{"entity": {...}}`), or a bare object. An [`EnvelopeLoader`] is bound
//! to one [`Envelope`] policy when it is built and applies it to every
//! payload it hands out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use super::cache::RequestCache;
use super::{LoadResult, LoaderKey};
use crate::error::FetchError;

/// How a fetched payload is unwrapped before it reaches a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Pass the payload through unchanged.
    Raw,
    /// Take the `entity` object.
    Entity,
    /// Take the `resources` list.
    Resources,
}

impl Envelope {
    /// Applies the policy to a payload fetched for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Malformed`] when the expected envelope field is
    /// missing or has the wrong shape.
    pub fn unwrap(self, key: &LoaderKey, payload: &serde_json::Value) -> LoadResult {
        let (field, unwrapped) = match self {
            Self::Raw => return Ok(payload.clone()),
            Self::Entity => ("entity", payload.get("entity").filter(|v| v.is_object())),
            Self::Resources => ("resources", payload.get("resources").filter(|v| v.is_array())),
        };

        unwrapped.cloned().ok_or_else(|| {
            Arc::new(FetchError::Malformed {
                url: key.to_string(),
                reason: format!("expected `{field}` in response envelope"),
            })
        })
    }
}

/// The capabilities every relation loader offers.
#[async_trait]
pub trait ResourceLoad: Send + Sync {
    /// Loads one key.
    async fn load_one(&self, key: LoaderKey) -> LoadResult;

    /// Loads several keys as one logical unit.
    ///
    /// Results are keyed; duplicate input keys yield one entry.
    async fn load_many(&self, keys: Vec<LoaderKey>) -> HashMap<LoaderKey, LoadResult>;

    /// Loads a path relative to the upstream API base URL.
    async fn load_by_relative_path(&self, path: &str) -> LoadResult;
}

/// A loader bound to one envelope policy over the request cache.
#[derive(Clone)]
pub struct EnvelopeLoader {
    envelope: Envelope,
    cache: Arc<RequestCache>,
    base_url: Arc<str>,
}

impl EnvelopeLoader {
    /// Creates a loader applying `envelope` to payloads from `cache`.
    #[must_use]
    pub fn new(envelope: Envelope, cache: Arc<RequestCache>, base_url: Arc<str>) -> Self {
        Self {
            envelope,
            cache,
            base_url,
        }
    }

    /// Resolves an href from a payload against the API base URL.
    #[must_use]
    pub fn key_for(&self, href: &str) -> LoaderKey {
        LoaderKey::resolve(&self.base_url, href)
    }

    /// Starts fetching `key` in the current batch window.
    ///
    /// Returns `false` when the key was already requested in this request.
    pub fn prefetch(&self, key: LoaderKey) -> bool {
        self.cache.prefetch(key)
    }
}

#[async_trait]
impl ResourceLoad for EnvelopeLoader {
    async fn load_one(&self, key: LoaderKey) -> LoadResult {
        let payload = self.cache.load(key.clone()).await?;
        self.envelope.unwrap(&key, &payload)
    }

    async fn load_many(&self, keys: Vec<LoaderKey>) -> HashMap<LoaderKey, LoadResult> {
        let mut unique = keys;
        unique.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        unique.dedup();

        let loads = unique.into_iter().map(|key| async move {
            let result = self.load_one(key.clone()).await;
            (key, result)
        });

        join_all(loads).await.into_iter().collect()
    }

    async fn load_by_relative_path(&self, path: &str) -> LoadResult {
        self.load_one(LoaderKey::relative(&self.base_url, path)).await
    }
}
