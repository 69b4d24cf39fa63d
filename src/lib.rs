//! Paper Catcher collects recent academic paper metadata from arXiv,
//! Semantic Scholar, PubMed, Springer and CrossRef, recovers missing
//! abstracts by scraping publisher landing pages, deduplicates the merged
//! results by title and optionally translates titles and abstracts before
//! writing everything to `papers.json`.

pub mod config;
pub mod models;
pub mod pipeline;
pub mod scrape;
pub mod sources;
pub mod translate;
pub mod utils;

pub use config::Settings;
pub use models::{Paper, PaperBuilder};
pub use pipeline::Aggregator;
pub use sources::{SourceClient, SourceError};
pub use translate::Translator;

/// Crate version, exposed for logging.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
