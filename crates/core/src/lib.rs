//! Core domain types for Bunko.

use serde::{Deserialize, Serialize};

mod catalog;
mod document;
mod resolution;
mod source;

pub use catalog::{CatalogRecord, SearchField};
pub use document::{BodyNode, StructuredDocument};
pub use resolution::{
    DirectoryListing, Exhausted, FailedAttempt, FileKey, ResolutionCandidate, ResolutionOutcome,
    Resolved, Strategy,
};
pub use source::{
    CachedDocument, CatalogSource, DocumentCache, DocumentSource, FetchError, ListingSource,
};

pub const DEFAULT_CATALOG_URL: &str = "https://raw.githubusercontent.com/aozorahack/aozorabunko_text/master/index_pages/list_person_all_extended_utf8.csv";
pub const DEFAULT_LISTING_URL: &str =
    "https://api.github.com/repos/aozorahack/aozorabunko_text/contents/cards/{collection}/files";
/// Longest listing lifetime that still fits a signed sqlite integer.
pub const MAX_LISTING_TTL_SECS: u64 = i64::MAX as u64;

pub const DEFAULT_DOCUMENT_URL: &str = "https://raw.githubusercontent.com/aozorahack/aozorabunko_text/master/cards/{collection}/files/{resource}/{resource}.txt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog_url: String,
    pub listing_url: String,
    pub document_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub listing_ttl_secs: u64,
    pub proximity_window: u32,
    pub metadata_scan_lines: usize,
    pub author_max_chars: usize,
    pub cache_documents: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            listing_url: DEFAULT_LISTING_URL.to_string(),
            document_url: DEFAULT_DOCUMENT_URL.to_string(),
            user_agent: concat!("bunko/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 30,
            listing_ttl_secs: 24 * 60 * 60,
            proximity_window: 10,
            metadata_scan_lines: 10,
            author_max_chars: 50,
            cache_documents: true,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        let defaults = Settings::default();
        for (value, fallback) in [
            (&mut self.catalog_url, defaults.catalog_url),
            (&mut self.listing_url, defaults.listing_url),
            (&mut self.document_url, defaults.document_url),
            (&mut self.user_agent, defaults.user_agent),
        ] {
            *value = value.trim().to_string();
            if value.is_empty() {
                *value = fallback;
            }
        }
        self.request_timeout_secs = self.request_timeout_secs.clamp(1, 600);
        self.listing_ttl_secs = self.listing_ttl_secs.min(MAX_LISTING_TTL_SECS);
        self.proximity_window = self.proximity_window.min(1000);
        self.metadata_scan_lines = self.metadata_scan_lines.clamp(1, 200);
        self.author_max_chars = self.author_max_chars.clamp(1, 500);
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listing_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.listing_ttl_secs)
    }

    /// Applies a single `key=value` override, as accepted by the CLI.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| format!("invalid value for {key}: {value}"))
        }

        match key.trim() {
            "catalog_url" => self.catalog_url = value.to_string(),
            "listing_url" => self.listing_url = value.to_string(),
            "document_url" => self.document_url = value.to_string(),
            "user_agent" => self.user_agent = value.to_string(),
            "request_timeout_secs" => self.request_timeout_secs = number(key, value)?,
            "listing_ttl_secs" => self.listing_ttl_secs = number(key, value)?,
            "proximity_window" => self.proximity_window = number(key, value)?,
            "metadata_scan_lines" => self.metadata_scan_lines = number(key, value)?,
            "author_max_chars" => self.author_max_chars = number(key, value)?,
            "cache_documents" => self.cache_documents = number(key, value)?,
            other => return Err(format!("unknown setting: {other}")),
        }
        self.normalize();
        Ok(())
    }
}
