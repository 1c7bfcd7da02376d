use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::FetchError;

/// How a candidate resource name was produced. Declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Exact,
    StaticMapping,
    DirectoryPrefix,
    DirectoryContains,
    NumericProximity,
    /// Content scan by title; only used by explicit title lookups.
    TitleScan,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Exact => "exact",
            Strategy::StaticMapping => "static-mapping",
            Strategy::DirectoryPrefix => "directory-prefix",
            Strategy::DirectoryContains => "directory-contains",
            Strategy::NumericProximity => "numeric-proximity",
            Strategy::TitleScan => "title-scan",
        }
    }

    pub fn needs_listing(&self) -> bool {
        !matches!(self, Strategy::Exact | Strategy::StaticMapping)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Strategy::Exact),
            "static-mapping" => Ok(Strategy::StaticMapping),
            "directory-prefix" => Ok(Strategy::DirectoryPrefix),
            "directory-contains" => Ok(Strategy::DirectoryContains),
            "numeric-proximity" => Ok(Strategy::NumericProximity),
            "title-scan" => Ok(Strategy::TitleScan),
            _ => Err("unknown strategy"),
        }
    }
}

/// A `(collection id, nominal file id)` pair plus the work key derived from it.
///
/// The work key is the file id's leading segment (`394_ruby_4531` → `394`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub collection_id: String,
    pub nominal_file_id: String,
    pub work_id: String,
}

impl FileKey {
    pub fn new(collection_id: &str, nominal_file_id: &str) -> Self {
        let collection_id = collection_id.trim().to_string();
        let nominal_file_id = nominal_file_id.trim().to_string();
        let work_id = nominal_file_id
            .split('_')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            collection_id,
            nominal_file_id,
            work_id,
        }
    }

    pub fn work_number(&self) -> Option<u64> {
        self.work_id.parse::<u64>().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionCandidate {
    pub strategy: Strategy,
    pub resource_name: String,
    /// Position in the generated sequence, starting at 0.
    pub priority: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved(Resolved),
    Exhausted(Exhausted),
}

impl ResolutionOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }

    pub fn resolved(self) -> Option<Resolved> {
        match self {
            ResolutionOutcome::Resolved(resolved) => Some(resolved),
            ResolutionOutcome::Exhausted(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub resource_name: String,
    pub raw_bytes: Vec<u8>,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    pub candidate: ResolutionCandidate,
    pub failure: FetchError,
}

/// Every candidate failed. Carries enough to explain why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted {
    pub collection_id: String,
    pub nominal_file_id: String,
    pub attempts: Vec<FailedAttempt>,
    pub available_resource_names: BTreeSet<String>,
}

impl Exhausted {
    /// Distinct strategies in the order they were first tried.
    pub fn tried_strategies(&self) -> Vec<Strategy> {
        let mut out: Vec<Strategy> = Vec::new();
        for attempt in &self.attempts {
            if !out.contains(&attempt.candidate.strategy) {
                out.push(attempt.candidate.strategy);
            }
        }
        out
    }

    pub fn tried_resource_names(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .map(|attempt| attempt.candidate.resource_name.as_str())
            .collect()
    }
}

/// Resource names known to exist in one collection.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub collection_id: String,
    pub names: Vec<String>,
}

impl DirectoryListing {
    pub fn new(collection_id: impl Into<String>, names: Vec<String>) -> Self {
        let mut seen = BTreeSet::new();
        let names = names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && seen.insert(name.clone()))
            .collect();
        Self {
            collection_id: collection_id.into(),
            names,
        }
    }

    pub fn empty(collection_id: impl Into<String>) -> Self {
        Self::new(collection_id, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    pub fn name_set(&self) -> BTreeSet<String> {
        self.names.iter().cloned().collect()
    }
}
