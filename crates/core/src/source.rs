//! Seams to the outside world: remote sources and the local document cache.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{Resolved, Strategy};

/// Why a single remote fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }
}

/// Supplies the bulk catalog payload (tab- or comma-separated text).
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<String, FetchError>;
}

/// Lists the resource names that actually exist in a collection.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn list(&self, collection_id: &str) -> Result<Vec<String>, FetchError>;
}

/// Fetches the raw bytes of one resource.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, collection_id: &str, resource_name: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocument {
    pub resource_name: String,
    pub strategy: Strategy,
    pub raw_bytes: Vec<u8>,
}

impl From<CachedDocument> for Resolved {
    fn from(doc: CachedDocument) -> Self {
        Resolved {
            resource_name: doc.resource_name,
            raw_bytes: doc.raw_bytes,
            strategy: doc.strategy,
        }
    }
}

/// Local store of documents that were already resolved, keyed by the catalog pair.
pub trait DocumentCache: Send {
    fn lookup(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
    ) -> anyhow::Result<Option<CachedDocument>>;

    fn store(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
        resolved: &Resolved,
    ) -> anyhow::Result<()>;
}
