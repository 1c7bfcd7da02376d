//! Application layer for Bunko: catalog, listings, candidate resolution and the
//! service that ties them to the document engine.

mod candidates;
mod catalog;
mod flight;
mod library;
mod listing;
mod resolver;

pub use candidates::{CandidateGenerator, StaticMappings};
pub use catalog::{Catalog, CatalogOrigin, CatalogStore, collection_id_from_url, file_id_from_url};
pub use flight::SingleFlight;
pub use library::{Library, ReadOutcome, Reading, Sources, placeholder_document};
pub use listing::DirectoryLister;
pub use resolver::{ResolveError, Resolver};
