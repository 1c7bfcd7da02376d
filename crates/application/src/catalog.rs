//! Catalog loading, parsing and search.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use bunko_core::{CatalogRecord, CatalogSource, FetchError, SearchField};
use regex::Regex;

use crate::flight::SingleFlight;

const EMBEDDED_CATALOG: &str = include_str!("../assets/fallback_catalog.tsv");
const UNKNOWN_COLLECTION: &str = "000000";

static CARD_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/cards/(\d+)/").expect("card dir pattern"));
static FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/files/([^/?#]+)\.[A-Za-z0-9]+(?:$|[?#])").expect("file name pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOrigin {
    Remote,
    Embedded,
}

/// An immutable catalog snapshot.
#[derive(Debug, Clone)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
    by_work_id: HashMap<String, usize>,
    origin: CatalogOrigin,
}

impl Catalog {
    pub fn parse(text: &str, origin: CatalogOrigin) -> Self {
        let mut records = Vec::new();
        let mut by_work_id = HashMap::new();
        for record in parse_records(text) {
            if by_work_id.contains_key(&record.work_id) {
                tracing::debug!(work_id = %record.work_id, "duplicate catalog row skipped");
                continue;
            }
            by_work_id.insert(record.work_id.clone(), records.len());
            records.push(record);
        }
        Self {
            records,
            by_work_id,
            origin,
        }
    }

    pub fn embedded() -> Self {
        Self::parse(EMBEDDED_CATALOG, CatalogOrigin::Embedded)
    }

    pub fn origin(&self) -> CatalogOrigin {
        self.origin
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, work_id: &str) -> Option<&CatalogRecord> {
        self.by_work_id
            .get(work_id.trim())
            .and_then(|&idx| self.records.get(idx))
    }

    /// Case-sensitive substring search in catalog order. An empty query matches all.
    pub fn search(&self, query: &str, field: SearchField, limit: usize) -> Vec<CatalogRecord> {
        self.records
            .iter()
            .filter(|record| query.is_empty() || record.matches(query, field))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Loads the bulk catalog once per session and serves lookups from memory.
pub struct CatalogStore {
    source: Arc<dyn CatalogSource>,
    timeout: Duration,
    snapshot: SingleFlight<(), Arc<Catalog>>,
}

impl CatalogStore {
    pub fn new(source: Arc<dyn CatalogSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            snapshot: SingleFlight::new(),
        }
    }

    /// Never empty: falls back to the embedded records when the source fails.
    pub async fn load(&self) -> Arc<Catalog> {
        self.snapshot
            .get_or_load((), |_| true, || self.fetch_or_embedded())
            .await
    }

    pub async fn search(&self, query: &str, field: SearchField, limit: usize) -> Vec<CatalogRecord> {
        self.load().await.search(query, field, limit)
    }

    pub async fn get(&self, work_id: &str) -> Option<CatalogRecord> {
        self.load().await.get(work_id).cloned()
    }

    pub fn clear(&self) {
        self.snapshot.clear();
    }

    async fn fetch_or_embedded(&self) -> Arc<Catalog> {
        let fetched = match tokio::time::timeout(self.timeout, self.source.fetch_catalog()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        let catalog = match fetched {
            Ok(text) => {
                let catalog = Catalog::parse(&text, CatalogOrigin::Remote);
                if catalog.is_empty() {
                    tracing::warn!("catalog payload had no usable rows; using embedded records");
                    Catalog::embedded()
                } else {
                    catalog
                }
            }
            Err(err) => {
                tracing::warn!(%err, "catalog source unavailable; using embedded records");
                Catalog::embedded()
            }
        };
        tracing::info!(records = catalog.len(), origin = ?catalog.origin(), "catalog loaded");
        Arc::new(catalog)
    }
}

pub fn collection_id_from_url(url: &str) -> Option<String> {
    CARD_DIR
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn file_id_from_url(url: &str) -> Option<String> {
    FILE_NAME
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Default)]
struct Columns {
    work_id: Option<usize>,
    title: Option<usize>,
    surname: Option<usize>,
    given_name: Option<usize>,
    opening_line: Option<usize>,
    resource_url: Option<usize>,
}

impl Columns {
    fn from_header(header: &[String]) -> Self {
        let find = |names: &[&str]| header.iter().position(|h| names.contains(&h.as_str()));
        Self {
            work_id: find(&["workId", "作品ID"]),
            title: find(&["title", "作品名"]),
            surname: find(&["authorSurname", "姓"]),
            given_name: find(&["authorGivenName", "名"]),
            opening_line: find(&["openingLine", "書き出し"]),
            resource_url: find(&["resourceURL", "テキストファイルURL"]),
        }
    }
}

fn parse_records(text: &str) -> Vec<CatalogRecord> {
    let text = text.trim_start_matches('\u{feff}');
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let delimiter = if header_line.contains('\t') { '\t' } else { ',' };
    let header = split_row(header_line, delimiter);
    let columns = Columns::from_header(&header);
    let (Some(work_idx), Some(title_idx)) = (columns.work_id, columns.title) else {
        tracing::warn!(?header, "catalog header lacks work id or title column");
        return Vec::new();
    };

    lines
        .filter_map(|line| {
            let cells = split_row(line, delimiter);
            let cell = |idx: Option<usize>| {
                idx.and_then(|idx| cells.get(idx))
                    .map(|value| value.trim().to_string())
                    .unwrap_or_default()
            };

            let work_id = cell(Some(work_idx));
            if work_id.is_empty() {
                return None;
            }
            let url = cell(columns.resource_url);
            let collection_id =
                collection_id_from_url(&url).unwrap_or_else(|| UNKNOWN_COLLECTION.to_string());
            let nominal_file_id =
                file_id_from_url(&url).unwrap_or_else(|| format!("{work_id}_ruby_0000"));

            Some(CatalogRecord {
                title: cell(Some(title_idx)),
                author_surname: cell(columns.surname),
                author_given_name: cell(columns.given_name),
                opening_line: cell(columns.opening_line),
                collection_id,
                nominal_file_id,
                work_id,
            })
        })
        .collect()
}

/// Splits one row; comma rows honour double-quoted cells with `""` escapes.
fn split_row(line: &str, delimiter: char) -> Vec<String> {
    if delimiter == '\t' {
        return line.split('\t').map(unquote).collect();
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                let _ = chars.next();
            }
            '"' => quoted = !quoted,
            ch if ch == delimiter && !quoted => cells.push(std::mem::take(&mut current)),
            ch => current.push(ch),
        }
    }
    cells.push(current);
    cells
}

fn unquote(cell: &str) -> String {
    let cell = cell.trim();
    cell.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(cell)
        .to_string()
}
