use std::sync::Arc;
use tracing::info;

use super::cache::{CachePolicy, LookupCache};
use super::store::{self, Boundary, BucketLists, Store};
use crate::error::Result;

/// Shared by every handler
#[derive(Debug)]
pub struct AppState {
    pub store: Store,
    pub cache: LookupCache,
}

impl AppState {
    pub fn new(store: Store, policy: CachePolicy) -> Arc<Self> {
        Arc::new(Self {
            store,
            cache: LookupCache::new(policy),
        })
    }

    pub async fn bucket_lists(&self) -> Result<Arc<BucketLists>> {
        self.cache
            .buckets(|| self.store.run(store::bucket_lists))
            .await
    }

    pub async fn boundaries(&self) -> Result<Arc<Vec<Boundary>>> {
        self.cache
            .boundaries(|| self.store.run(store::boundaries))
            .await
    }

    /// Fill the cache ahead of the first request
    pub async fn warm(&self) -> Result<()> {
        let buckets = self.bucket_lists().await?;
        let boundaries = self.boundaries().await?;
        info!(
            income_buckets = buckets.income_buckets.len(),
            population_buckets = buckets.population_buckets.len(),
            boundaries = boundaries.len(),
            "lookup cache warmed"
        );
        Ok(())
    }
}
