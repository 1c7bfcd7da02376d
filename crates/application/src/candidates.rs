//! Ordered candidate generation over a fixed strategy chain.

use std::collections::{HashMap, HashSet};

use bunko_core::{DirectoryListing, FileKey, ResolutionCandidate, Strategy};

/// Hand-curated `(collection id, work id) → resource name` corrections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMappings {
    entries: HashMap<(String, String), String>,
}

impl Default for StaticMappings {
    fn default() -> Self {
        let mut mappings = Self::empty();
        mappings.insert("000064", "394", "386_ruby_15290");
        mappings.insert("000064", "122", "392_ruby_15302");
        mappings.insert("000064", "392", "389_ruby_15296");
        mappings
    }
}

impl StaticMappings {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, collection_id: &str, work_id: &str, resource_name: &str) {
        self.entries.insert(
            (collection_id.trim().to_string(), work_id.trim().to_string()),
            resource_name.trim().to_string(),
        );
    }

    pub fn get(&self, collection_id: &str, work_id: &str) -> Option<&str> {
        self.entries
            .get(&(collection_id.to_string(), work_id.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct StrategyInput<'a> {
    key: &'a FileKey,
    names: &'a [String],
    mappings: &'a StaticMappings,
    window: u32,
}

type StrategyFn = fn(&StrategyInput<'_>) -> Vec<String>;

const STRATEGIES: [(Strategy, StrategyFn); 5] = [
    (Strategy::Exact, exact),
    (Strategy::StaticMapping, static_mapping),
    (Strategy::DirectoryPrefix, directory_prefix),
    (Strategy::DirectoryContains, directory_contains),
    (Strategy::NumericProximity, numeric_proximity),
];

#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    mappings: StaticMappings,
    window: u32,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self::new(StaticMappings::default(), 10)
    }
}

impl CandidateGenerator {
    pub fn new(mappings: StaticMappings, window: u32) -> Self {
        Self { mappings, window }
    }

    /// Candidates in strategy order, deduplicated by resource name. A name reachable
    /// from several strategies keeps its first position.
    pub fn generate(&self, key: &FileKey, listing: &DirectoryListing) -> Vec<ResolutionCandidate> {
        let input = StrategyInput {
            key,
            names: &listing.names,
            mappings: &self.mappings,
            window: self.window,
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (strategy, produce) in STRATEGIES {
            if strategy.needs_listing() && input.names.is_empty() {
                continue;
            }
            for resource_name in produce(&input) {
                if !seen.insert(resource_name.clone()) {
                    continue;
                }
                out.push(ResolutionCandidate {
                    strategy,
                    resource_name,
                    priority: out.len(),
                });
            }
        }
        out
    }

    /// The candidates that can be produced without a directory listing.
    pub fn listing_free(&self, key: &FileKey) -> Vec<ResolutionCandidate> {
        self.generate(key, &DirectoryListing::empty(key.collection_id.as_str()))
    }
}

fn exact(input: &StrategyInput<'_>) -> Vec<String> {
    let nominal = &input.key.nominal_file_id;
    if nominal.is_empty() {
        return Vec::new();
    }
    vec![nominal.clone()]
}

fn static_mapping(input: &StrategyInput<'_>) -> Vec<String> {
    input
        .mappings
        .get(&input.key.collection_id, &input.key.work_id)
        .map(|name| vec![name.to_string()])
        .unwrap_or_default()
}

fn directory_prefix(input: &StrategyInput<'_>) -> Vec<String> {
    if input.key.work_id.is_empty() {
        return Vec::new();
    }
    with_prefix(input.names, &format!("{}_", input.key.work_id))
}

fn directory_contains(input: &StrategyInput<'_>) -> Vec<String> {
    let work_id = &input.key.work_id;
    if work_id.is_empty() {
        return Vec::new();
    }
    let prefix = format!("{work_id}_");
    input
        .names
        .iter()
        .filter(|name| name.contains(work_id.as_str()) && !name.starts_with(&prefix))
        .cloned()
        .collect()
}

fn numeric_proximity(input: &StrategyInput<'_>) -> Vec<String> {
    let Some(work) = input.key.work_number() else {
        return Vec::new();
    };
    let window = u64::from(input.window);
    let low = work.saturating_sub(window);
    let high = work.saturating_add(window);

    let mut out = Vec::new();
    for n in low..=high {
        out.extend(with_prefix(input.names, &format!("{n}_")));
    }
    out
}

fn with_prefix(names: &[String], prefix: &str) -> Vec<String> {
    names
        .iter()
        .filter(|name| name.starts_with(prefix))
        .cloned()
        .collect()
}
