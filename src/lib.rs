//! # Bioseek
//!
//! Bioseek is an offline-indexed, online-served vector-space search engine
//! over a biomedical paper corpus.
//!
//! Documents are indexed offline into per-category shards: a sparse TF-IDF
//! document matrix plus a positionally aligned metadata stream. At query
//! time the engine normalizes and vectorizes the query, routes it to a
//! small set of shards (explicitly, via a category classifier, or to the
//! full "all" sub-shard set for deep search), runs sparse cosine similarity
//! against each target shard in parallel, and merges the scored results
//! deterministically. Follow-up filters (journal, publication year,
//! category) are applied to the cached result list without re-ranking.
//!
//! ## Searching
//!
//! ```no_run
//! use bioseek::config::EngineConfig;
//! use bioseek::search::SearchEngine;
//!
//! let engine = SearchEngine::load(EngineConfig::new("index")).unwrap();
//! let response = engine.search("coronavirus spike protein", None, false).unwrap();
//! for (score, paper) in response.scores.iter().zip(&response.results) {
//!     println!("{score:.4}  {}", paper.title);
//! }
//! ```
//!
//! ## Follow-up filtering
//!
//! ```no_run
//! use bioseek::search::{RefineRequest, SearchEngine};
//!
//! # let results: Vec<bioseek::models::PaperMetadata> = vec![];
//! let request = RefineRequest {
//!     journals: Some(vec!["Nature Medicine".to_string()]),
//!     pubyears: Some((2020, None)),
//!     categories: None,
//! };
//! let refined = SearchEngine::refine(&results, &request).unwrap();
//! println!("{} results after filtering", refined.results.len());
//! ```

pub mod classifier;
pub mod config;
pub mod errors;
pub mod models;
pub mod search;
pub mod shard;
pub mod tfidf;
pub mod vocabulary;

// Re-export commonly used types for convenience
pub use errors::{Result, SearchError};
pub use models::{Facets, PaperMetadata, SearchResponse};
pub use search::engine::{RefineRequest, RefineResponse, SearchEngine};

// Tests are defined in their respective modules with #[cfg(test)]
