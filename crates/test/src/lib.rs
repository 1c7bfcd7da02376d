//! Test helpers and fixtures.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bunko_application::{Library, Sources};
use bunko_core::{CatalogSource, DocumentSource, FetchError, ListingSource, Settings};
use parking_lot::Mutex;

#[cfg(test)]
mod scenarios;

/// A short archive text with front matter, a separator block and every markup construct.
pub const SAMPLE_TEXT: &str = "羅生門\n芥川龍之介\n\n-------------------------------------------------------\n【テキスト中に現れる記号について】\n\n《》：ルビ\n（例）下人《げにん》\n-------------------------------------------------------\n\n　ある日の暮方の事である。一人の下人《げにん》が、羅生門の下で雨やみを待っていた。\n［＃「雨やみ」に傍点］\n［＃ここから２字下げ］\n広い門の下には、この男のほかに誰もいない。\n［＃ここで字下げ終わり］\n［＃改ページ］\n底本：「芥川龍之介全集１」\n";

pub const SAMPLE_CATALOG: &str = "workId\ttitle\tauthorSurname\tauthorGivenName\topeningLine\tresourceURL\n\
    456\t羅生門\t芥川\t龍之介\tある日の暮方の事である。\thttps://www.aozora.gr.jp/cards/000879/files/127_ruby_150.zip\n\
    394\tたけくらべ\t樋口\t一葉\t廻れば大門の見返り柳いと長けれど\thttps://www.aozora.gr.jp/cards/000064/files/394_x.zip\n\
    9999\t行方不明\t名無\t\t\thttps://www.aozora.gr.jp/cards/000999/files/9999_ruby_1.zip\n";

pub fn shift_jis(text: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode(text);
    bytes.into_owned()
}

pub fn make_settings(proximity_window: u32) -> Settings {
    Settings {
        request_timeout_secs: 5,
        listing_ttl_secs: 60,
        proximity_window,
        ..Settings::default()
    }
}

/// Serves documents from a map, recording every requested resource name in order.
#[derive(Default)]
pub struct ScriptedDocuments {
    found: HashMap<String, Vec<u8>>,
    failures: HashMap<String, FetchError>,
    delays: HashMap<String, Duration>,
    fetched: Mutex<Vec<String>>,
}

impl ScriptedDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, resource_name: &str, raw: Vec<u8>) -> Self {
        self.found.insert(resource_name.to_string(), raw);
        self
    }

    pub fn with_failure(mut self, resource_name: &str, failure: FetchError) -> Self {
        self.failures.insert(resource_name.to_string(), failure);
        self
    }

    pub fn with_delay(mut self, resource_name: &str, delay: Duration) -> Self {
        self.delays.insert(resource_name.to_string(), delay);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl DocumentSource for ScriptedDocuments {
    async fn fetch(&self, _collection_id: &str, resource_name: &str) -> Result<Vec<u8>, FetchError> {
        self.fetched.lock().push(resource_name.to_string());
        if let Some(delay) = self.delays.get(resource_name) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(failure) = self.failures.get(resource_name) {
            return Err(failure.clone());
        }
        self.found
            .get(resource_name)
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}

/// A fixed listing per collection that counts how often it is asked.
#[derive(Default)]
pub struct StaticListing {
    names: HashMap<String, Vec<String>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection_id: &str, names: &[&str]) -> Self {
        self.names.insert(
            collection_id.to_string(),
            names.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingSource for StaticListing {
    async fn list(&self, collection_id: &str) -> Result<Vec<String>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.names
            .get(collection_id)
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}

/// Returns a fixed catalog payload, or a failure.
pub struct StaticCatalog {
    payload: Result<String, FetchError>,
    calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(payload: &str) -> Self {
        Self {
            payload: Ok(payload.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(failure: FetchError) -> Self {
        Self {
            payload: Err(failure),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_catalog(&self) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payload.clone()
    }
}

pub fn make_library(
    settings: &Settings,
    catalog: Arc<StaticCatalog>,
    listing: Arc<StaticListing>,
    documents: Arc<ScriptedDocuments>,
) -> Library {
    Library::new(
        settings,
        Sources {
            catalog,
            listing,
            documents,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_settings() {
        let settings = make_settings(4);
        assert_eq!(settings.proximity_window, 4);
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn scripted_documents_record_fetches() {
        let documents = ScriptedDocuments::new()
            .with_document("a_1", b"a".to_vec())
            .with_failure("b_2", FetchError::Status(500));
        assert_eq!(documents.fetch("c", "a_1").await, Ok(b"a".to_vec()));
        assert_eq!(documents.fetch("c", "b_2").await, Err(FetchError::Status(500)));
        assert_eq!(documents.fetch("c", "z_9").await, Err(FetchError::NotFound));
        assert_eq!(documents.fetched(), vec!["a_1", "b_2", "z_9"]);
    }
}
