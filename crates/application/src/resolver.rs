//! Drives candidates against the document source until one is found.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bunko_core::{
    DocumentSource, Exhausted, FailedAttempt, FetchError, FileKey, ResolutionCandidate,
    ResolutionOutcome, Resolved, Strategy,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::candidates::CandidateGenerator;
use crate::listing::DirectoryLister;

const TITLE_SCAN_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("resolution cancelled")]
    Cancelled,
}

pub struct Resolver {
    documents: Arc<dyn DocumentSource>,
    lister: Arc<DirectoryLister>,
    generator: CandidateGenerator,
    fetch_timeout: Duration,
}

impl Resolver {
    pub fn new(
        documents: Arc<dyn DocumentSource>,
        lister: Arc<DirectoryLister>,
        generator: CandidateGenerator,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            documents,
            lister,
            generator,
            fetch_timeout,
        }
    }

    /// Tries candidates one at a time and returns the first that fetches.
    ///
    /// Listing-free candidates go first; the directory listing is only requested
    /// once they have all failed. The attempted order is the same as
    /// [`Resolver::candidates`] would report.
    pub async fn resolve(&self, collection_id: &str, nominal_file_id: &str) -> ResolutionOutcome {
        let key = FileKey::new(collection_id, nominal_file_id);
        let mut attempts = Vec::new();

        for candidate in self.generator.listing_free(&key) {
            if let Some(resolved) = self.attempt(&key, candidate, &mut attempts).await {
                return ResolutionOutcome::Resolved(resolved);
            }
        }

        let listing = self.lister.list(&key.collection_id).await;
        let tried: HashSet<String> = attempts
            .iter()
            .map(|attempt: &FailedAttempt| attempt.candidate.resource_name.clone())
            .collect();
        for candidate in self.generator.generate(&key, &listing) {
            if tried.contains(&candidate.resource_name) {
                continue;
            }
            if let Some(resolved) = self.attempt(&key, candidate, &mut attempts).await {
                return ResolutionOutcome::Resolved(resolved);
            }
        }

        tracing::warn!(
            collection = %key.collection_id,
            nominal = %key.nominal_file_id,
            attempts = attempts.len(),
            listed = listing.names.len(),
            "no candidate resolved"
        );
        ResolutionOutcome::Exhausted(Exhausted {
            collection_id: key.collection_id,
            nominal_file_id: key.nominal_file_id,
            attempts,
            available_resource_names: listing.name_set(),
        })
    }

    /// Like [`Resolver::resolve`], but stops as soon as `cancel` fires. The in-flight
    /// fetch is dropped and no further candidate is tried.
    pub async fn resolve_cancellable(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolutionOutcome, ResolveError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ResolveError::Cancelled),
            outcome = self.resolve(collection_id, nominal_file_id) => Ok(outcome),
        }
    }

    /// The full candidate sequence, listing included, without fetching documents.
    pub async fn candidates(
        &self,
        collection_id: &str,
        nominal_file_id: &str,
    ) -> Vec<ResolutionCandidate> {
        let key = FileKey::new(collection_id, nominal_file_id);
        let listing = self.lister.list(&key.collection_id).await;
        self.generator.generate(&key, &listing)
    }

    /// Scans the collection in listing order for a document whose opening lines
    /// carry `title`. First match wins.
    pub async fn locate_by_title(&self, collection_id: &str, title: &str) -> Option<Resolved> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let listing = self.lister.list(collection_id.trim()).await;
        for resource_name in &listing.names {
            let raw = match self.fetch(&listing.collection_id, resource_name).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::debug!(resource = %resource_name, %err, "title scan skipped resource");
                    continue;
                }
            };
            let decoded = bunko_engine::decode(&raw);
            if opening_mentions_title(&decoded.text, title) {
                tracing::info!(
                    collection = %listing.collection_id,
                    resource = %resource_name,
                    "title scan matched"
                );
                return Some(Resolved {
                    resource_name: resource_name.clone(),
                    raw_bytes: raw,
                    strategy: Strategy::TitleScan,
                });
            }
        }
        None
    }

    async fn attempt(
        &self,
        key: &FileKey,
        candidate: ResolutionCandidate,
        attempts: &mut Vec<FailedAttempt>,
    ) -> Option<Resolved> {
        tracing::debug!(
            collection = %key.collection_id,
            resource = %candidate.resource_name,
            strategy = %candidate.strategy,
            attempt = attempts.len() + 1,
            "trying candidate"
        );
        match self.fetch(&key.collection_id, &candidate.resource_name).await {
            Ok(raw_bytes) => {
                tracing::info!(
                    collection = %key.collection_id,
                    nominal = %key.nominal_file_id,
                    resource = %candidate.resource_name,
                    strategy = %candidate.strategy,
                    "resolved"
                );
                Some(Resolved {
                    resource_name: candidate.resource_name,
                    raw_bytes,
                    strategy: candidate.strategy,
                })
            }
            Err(failure) => {
                if !failure.is_not_found() {
                    tracing::warn!(
                        collection = %key.collection_id,
                        resource = %candidate.resource_name,
                        %failure,
                        "candidate fetch failed"
                    );
                }
                attempts.push(FailedAttempt { candidate, failure });
                None
            }
        }
    }

    async fn fetch(&self, collection_id: &str, resource_name: &str) -> Result<Vec<u8>, FetchError> {
        let fetch = self.documents.fetch(collection_id, resource_name);
        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout)),
        }
    }
}

fn opening_mentions_title(text: &str, title: &str) -> bool {
    text.lines()
        .take(TITLE_SCAN_LINES)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .any(|line| line == title || line.contains(title) || title.contains(line))
}
