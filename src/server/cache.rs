//! Process-wide memo for the lookups every page view repeats

use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::store::{Boundary, BucketLists};
use crate::error::Result;

/// When cached lookups are computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CachePolicy {
    /// Query the store on every request
    None,
    /// Compute on first request, then reuse
    #[default]
    Lazy,
    /// Compute before the server starts listening
    Eager,
}

/// Memoized bucket lists and boundary polygons.
///
/// A failed build is not stored, so the next request retries it. The cache
/// never invalidates; restart the server after reloading the store.
#[derive(Debug, Default)]
pub struct LookupCache {
    policy: CachePolicy,
    buckets: OnceCell<Arc<BucketLists>>,
    boundaries: OnceCell<Arc<Vec<Boundary>>>,
}

impl LookupCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub async fn buckets<F, Fut>(&self, build: F) -> Result<Arc<BucketLists>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BucketLists>>,
    {
        memoize(&self.buckets, self.policy, "buckets", build).await
    }

    pub async fn boundaries<F, Fut>(&self, build: F) -> Result<Arc<Vec<Boundary>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Boundary>>>,
    {
        memoize(&self.boundaries, self.policy, "boundaries", build).await
    }

    pub fn is_warm(&self) -> bool {
        self.buckets.initialized() && self.boundaries.initialized()
    }
}

async fn memoize<T, F, Fut>(
    cell: &OnceCell<Arc<T>>,
    policy: CachePolicy,
    key: &'static str,
    build: F,
) -> Result<Arc<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if policy == CachePolicy::None {
        return build().await.map(Arc::new);
    }

    cell.get_or_try_init(|| async move {
        debug!(key, "building cached lookup");
        build().await.map(Arc::new)
    })
    .await
    .cloned()
}
