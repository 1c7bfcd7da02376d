//! HTTP implementations of the catalog, listing and document sources.

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use bunko_core::{CatalogSource, DocumentSource, FetchError, ListingSource, Settings};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct HttpSources {
    client: Client,
    catalog_url: String,
    listing_url: String,
    document_url: String,
    timeout: Duration,
}

/// One entry of the directory listing API response.
#[derive(Debug, Deserialize)]
struct ListingEntry {
    name: String,
}

impl HttpSources {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            catalog_url: settings.catalog_url.clone(),
            listing_url: settings.listing_url.clone(),
            document_url: settings.document_url.clone(),
            timeout: settings.request_timeout(),
        })
    }

    pub fn listing_url(&self, collection_id: &str) -> String {
        fill(&self.listing_url, collection_id, "")
    }

    pub fn document_url(&self, collection_id: &str, resource_name: &str) -> String {
        fill(&self.document_url, collection_id, resource_name)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.transport(err))?;
        check_status(response.status())?;
        Ok(response)
    }

    fn transport(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl CatalogSource for HttpSources {
    async fn fetch_catalog(&self) -> Result<String, FetchError> {
        let response = self.get(&self.catalog_url).await?;
        response.text().await.map_err(|err| self.transport(err))
    }
}

#[async_trait]
impl ListingSource for HttpSources {
    async fn list(&self, collection_id: &str) -> Result<Vec<String>, FetchError> {
        let response = self.get(&self.listing_url(collection_id)).await?;
        let body = response.bytes().await.map_err(|err| self.transport(err))?;
        parse_listing(&body)
    }
}

#[async_trait]
impl DocumentSource for HttpSources {
    async fn fetch(&self, collection_id: &str, resource_name: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .get(&self.document_url(collection_id, resource_name))
            .await?;
        let body = response.bytes().await.map_err(|err| self.transport(err))?;
        Ok(body.to_vec())
    }
}

fn fill(template: &str, collection_id: &str, resource_name: &str) -> String {
    template
        .replace("{collection}", collection_id)
        .replace("{resource}", resource_name)
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status == StatusCode::NOT_FOUND {
        Err(FetchError::NotFound)
    } else if !status.is_success() {
        Err(FetchError::Status(status.as_u16()))
    } else {
        Ok(())
    }
}

fn parse_listing(body: &[u8]) -> Result<Vec<String>, FetchError> {
    let entries: Vec<ListingEntry> = serde_json::from_slice(body)
        .map_err(|err| FetchError::Transport(format!("invalid listing: {err}")))?;
    Ok(entries.into_iter().map(|entry| entry.name).collect())
}
