//! The two process-wide, bounded-capacity caches that let inference be
//! skipped across virtual users and page loads: one for a CSS body's own
//! parsed embedded-resource list, one for a document's fully built
//! inferred-request list keyed by its validator.
//!
//! Both are thin wrappers over [`moka::future::Cache`], the same backend
//! this crate's nearest relative uses for its own `MokaManager` — bounded,
//! async, safe to share across concurrently running schedulers without an
//! external lock.

use std::fmt;
use std::sync::Arc;

use moka::future::Cache;

use crate::error::{FetchError, Result};
use crate::types::{EmbeddedResource, InferredPageResources, InferredResourcesCacheKey};

/// Caches CSS bodies' parsed embedded-resource lists, keyed by the CSS
/// document's own URI.
#[derive(Clone)]
pub struct CssContentCache {
    inner: Cache<String, Arc<Vec<EmbeddedResource>>>,
}

impl fmt::Debug for CssContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CssContentCache")
            .field("entry_count", &self.inner.entry_count())
            .finish_non_exhaustive()
    }
}

impl CssContentCache {
    /// Build a cache with room for `capacity` entries.
    pub fn new(capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(FetchError::ZeroCapacity);
        }
        Ok(Self { inner: Cache::new(capacity) })
    }

    /// Fetch the cached resource list for `uri`, if any.
    pub async fn get(&self, uri: &str) -> Option<Arc<Vec<EmbeddedResource>>> {
        self.inner.get(uri).await
    }

    /// Returns the cached list for `uri`, computing and inserting it via
    /// `init` if absent. Concurrent callers for the same `uri` coalesce
    /// onto a single computation.
    pub async fn get_or_insert_with<F>(
        &self,
        uri: String,
        init: F,
    ) -> Arc<Vec<EmbeddedResource>>
    where
        F: std::future::Future<Output = Arc<Vec<EmbeddedResource>>>,
    {
        self.inner.get_with(uri, init).await
    }

    /// Drop any cached entry for `uri`, e.g. because its validator changed.
    pub async fn invalidate(&self, uri: &str) {
        self.inner.invalidate(uri).await;
    }
}

/// Caches a document's fully built inferred-request list, keyed by the
/// protocol it was inferred under and its own URI, guarded by the
/// validator the origin returned at inference time.
#[derive(Clone)]
pub struct InferredResourcesCache {
    inner: Cache<InferredResourcesCacheKey, InferredPageResources>,
}

impl fmt::Debug for InferredResourcesCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferredResourcesCache")
            .field("entry_count", &self.inner.entry_count())
            .finish_non_exhaustive()
    }
}

impl InferredResourcesCache {
    /// Build a cache with room for `capacity` entries.
    pub fn new(capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(FetchError::ZeroCapacity);
        }
        Ok(Self { inner: Cache::new(capacity) })
    }

    /// Fetch the cached inference result for `key`, if any.
    pub async fn get(
        &self,
        key: &InferredResourcesCacheKey,
    ) -> Option<InferredPageResources> {
        self.inner.get(key).await
    }

    /// Returns the cached entry for `key` if its stored validator equals
    /// `validator`; otherwise `None`, signaling the caller should re-infer.
    pub async fn get_if_validator_matches(
        &self,
        key: &InferredResourcesCacheKey,
        validator: &str,
    ) -> Option<InferredPageResources> {
        let entry = self.inner.get(key).await?;
        if entry.validator == validator {
            Some(entry)
        } else {
            None
        }
    }

    /// Insert or replace the inference result for `key`.
    pub async fn insert(
        &self,
        key: InferredResourcesCacheKey,
        resources: InferredPageResources,
    ) {
        self.inner.insert(key, resources).await;
    }
}

/// The pair of process-wide caches a scheduler's inference calls consult.
#[derive(Debug, Clone)]
pub struct ResourceCaches {
    /// CSS body → parsed embedded-resource list.
    pub css_content: CssContentCache,
    /// `(protocol, document URI)` → validator + built inferred requests.
    pub inferred: InferredResourcesCache,
}

impl ResourceCaches {
    /// Build both caches with the given capacities.
    pub fn new(css_capacity: u64, inferred_capacity: u64) -> Result<Self> {
        Ok(Self {
            css_content: CssContentCache::new(css_capacity)?,
            inferred: InferredResourcesCache::new(inferred_capacity)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpRequestDescriptor;
    use url::Url;

    fn sample_requests() -> Arc<Vec<HttpRequestDescriptor>> {
        Arc::new(vec![HttpRequestDescriptor {
            uri: Url::parse("http://a/x.png").unwrap(),
            kind: crate::types::ResourceKind::Regular,
            config: Arc::new(crate::types::RequestConfig::default()),
        }])
    }

    #[tokio::test]
    async fn validator_mismatch_misses() {
        let cache = InferredResourcesCache::new(10).unwrap();
        let key = InferredResourcesCacheKey::new(
            "proto",
            &Url::parse("http://a/p").unwrap(),
        );
        cache
            .insert(
                key.clone(),
                InferredPageResources {
                    validator: "v1".to_string(),
                    requests: sample_requests(),
                },
            )
            .await;

        assert!(cache.get_if_validator_matches(&key, "v1").await.is_some());
        assert!(cache.get_if_validator_matches(&key, "v2").await.is_none());
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            InferredResourcesCache::new(0),
            Err(FetchError::ZeroCapacity)
        ));
        assert!(matches!(
            CssContentCache::new(0),
            Err(FetchError::ZeroCapacity)
        ));
    }
}
