//! Per-collection directory listings with a staleness window.

use std::sync::Arc;
use std::time::Duration;

use bunko_core::{DirectoryListing, FetchError, ListingSource};
use tokio::time::Instant;

use crate::flight::SingleFlight;

pub struct DirectoryLister {
    source: Arc<dyn ListingSource>,
    ttl: Duration,
    timeout: Duration,
    cache: SingleFlight<String, (Instant, Arc<DirectoryListing>)>,
}

impl DirectoryLister {
    pub fn new(source: Arc<dyn ListingSource>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            source,
            ttl,
            timeout,
            cache: SingleFlight::new(),
        }
    }

    /// Known resource names for a collection. A failed listing yields an empty one
    /// and is not cached.
    pub async fn list(&self, collection_id: &str) -> Arc<DirectoryListing> {
        let ttl = self.ttl;
        let loaded = self
            .cache
            .get_or_try_load(
                collection_id.to_string(),
                |(fetched_at, _)| fetched_at.elapsed() <= ttl,
                || self.fetch(collection_id),
            )
            .await;

        match loaded {
            Ok((_, listing)) => listing,
            Err(err) => {
                tracing::warn!(collection = collection_id, %err, "directory listing unavailable");
                Arc::new(DirectoryListing::empty(collection_id))
            }
        }
    }

    pub fn invalidate(&self, collection_id: &str) {
        self.cache.invalidate(&collection_id.to_string());
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    async fn fetch(
        &self,
        collection_id: &str,
    ) -> Result<(Instant, Arc<DirectoryListing>), FetchError> {
        let names = match tokio::time::timeout(self.timeout, self.source.list(collection_id)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
        };
        let listing = DirectoryListing::new(collection_id, names);
        tracing::debug!(
            collection = collection_id,
            names = listing.names.len(),
            "directory listing fetched"
        );
        Ok((Instant::now(), Arc::new(listing)))
    }
}
