//! Consumer-facing service: catalog lookups plus resolve-and-decode.

use std::sync::Arc;

use bunko_core::{
    BodyNode, CachedDocument, CatalogRecord, CatalogSource, DocumentCache, DocumentSource,
    Exhausted, ListingSource, ResolutionOutcome, Resolved, SearchField, Settings, Strategy,
    StructuredDocument,
};
use bunko_engine::Engine;
use parking_lot::Mutex;

use crate::candidates::{CandidateGenerator, StaticMappings};
use crate::catalog::CatalogStore;
use crate::listing::DirectoryLister;
use crate::resolver::Resolver;

/// The three remote seams the service talks to.
#[derive(Clone)]
pub struct Sources {
    pub catalog: Arc<dyn CatalogSource>,
    pub listing: Arc<dyn ListingSource>,
    pub documents: Arc<dyn DocumentSource>,
}

impl Sources {
    pub fn shared<T>(source: Arc<T>) -> Self
    where
        T: CatalogSource + ListingSource + DocumentSource + 'static,
    {
        Self {
            catalog: source.clone(),
            listing: source.clone(),
            documents: source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub document: StructuredDocument,
    pub resource_name: String,
    pub strategy: Strategy,
    pub from_cache: bool,
    pub had_replacements: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Document(Reading),
    Exhausted(Exhausted),
}

impl ReadOutcome {
    pub fn document(&self) -> Option<&StructuredDocument> {
        match self {
            ReadOutcome::Document(reading) => Some(&reading.document),
            ReadOutcome::Exhausted(_) => None,
        }
    }
}

pub struct Library {
    catalog: CatalogStore,
    resolver: Resolver,
    engine: Engine,
    cache: Option<Mutex<Box<dyn DocumentCache>>>,
}

impl Library {
    pub fn new(settings: &Settings, sources: Sources) -> Self {
        Self::with_mappings(settings, sources, StaticMappings::default())
    }

    pub fn with_mappings(settings: &Settings, sources: Sources, mappings: StaticMappings) -> Self {
        let timeout = settings.request_timeout();
        let lister = DirectoryLister::new(sources.listing, settings.listing_ttl(), timeout);
        let resolver = Resolver::new(
            sources.documents,
            Arc::new(lister),
            CandidateGenerator::new(mappings, settings.proximity_window),
            timeout,
        );
        Self {
            catalog: CatalogStore::new(sources.catalog, timeout),
            resolver,
            engine: Engine::from_settings(settings),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Box<dyn DocumentCache>) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub async fn search_catalog(
        &self,
        query: &str,
        field: SearchField,
        limit: usize,
    ) -> Vec<CatalogRecord> {
        self.catalog.search(query, field, limit).await
    }

    pub async fn get_catalog_record(&self, work_id: &str) -> Option<CatalogRecord> {
        self.catalog.get(work_id).await
    }

    /// Resolves the pair and decodes the winning bytes. A cached copy short-circuits
    /// the network.
    pub async fn resolve_and_decode(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
    ) -> ReadOutcome {
        if let Some(cached) = self.cached(collection_id, nominal_file_id) {
            return ReadOutcome::Document(self.read(cached.into(), true));
        }

        match self.resolver.resolve(collection_id, nominal_file_id).await {
            ResolutionOutcome::Resolved(resolved) => {
                self.remember(collection_id, nominal_file_id, &resolved);
                ReadOutcome::Document(self.read(resolved, false))
            }
            ResolutionOutcome::Exhausted(exhausted) => ReadOutcome::Exhausted(exhausted),
        }
    }

    /// Looks the work up in the catalog and reads it. `None` when the work id is unknown.
    pub async fn open_work(&self, work_id: &str) -> Option<(CatalogRecord, ReadOutcome)> {
        let record = self.get_catalog_record(work_id.trim()).await?;
        let outcome = self
            .resolve_and_decode(&record.collection_id, &record.nominal_file_id)
            .await;
        Some((record, outcome))
    }

    fn read(&self, resolved: Resolved, from_cache: bool) -> Reading {
        let (document, had_replacements) = self.engine.read(&resolved.raw_bytes);
        Reading {
            document,
            resource_name: resolved.resource_name,
            strategy: resolved.strategy,
            from_cache,
            had_replacements,
        }
    }

    fn cached(&self, collection_id: &str, nominal_file_id: &str) -> Option<CachedDocument> {
        let cache = self.cache.as_ref()?;
        match cache.lock().lookup(collection_id, nominal_file_id) {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(
                    collection = collection_id,
                    nominal = nominal_file_id,
                    "document cache lookup failed: {err:#}"
                );
                None
            }
        }
    }

    fn remember(&self, collection_id: &str, nominal_file_id: &str, resolved: &Resolved) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(err) = cache.lock().store(collection_id, nominal_file_id, resolved) {
            tracing::warn!(
                collection = collection_id,
                nominal = nominal_file_id,
                "document cache store failed: {err:#}"
            );
        }
    }
}

/// A stand-in document for a work whose text could not be found.
pub fn placeholder_document(record: &CatalogRecord, exhausted: &Exhausted) -> StructuredDocument {
    let mut text = String::from("本文を取得できませんでした。\n");
    if !record.opening_line.is_empty() {
        text.push_str(&format!("\n{}\n", record.opening_line));
    }
    text.push_str(&format!(
        "\n{}/{} の候補 {} 件はいずれも見つかりませんでした:\n",
        exhausted.collection_id,
        exhausted.nominal_file_id,
        exhausted.attempts.len()
    ));
    for attempt in &exhausted.attempts {
        text.push_str(&format!(
            "{} ({}): {}\n",
            attempt.candidate.resource_name, attempt.candidate.strategy, attempt.failure
        ));
    }

    StructuredDocument {
        title: record.title.clone(),
        author: record.author(),
        body: vec![BodyNode::PlainText(text)],
        anomalies: 0,
    }
}
