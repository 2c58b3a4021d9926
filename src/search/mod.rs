//! Hybrid retrieval over stored exchanges
//!
//! The engine turns a query (single phrase or 2-5 concept phrases), a
//! search mode, a result limit, and an optional date range into a ranked
//! set of matching exchanges. Vector search goes through the embedding
//! engine and the USearch index; text search is a substring scan over the
//! message fields. `both` mode unions the two, deduplicated by exchange id.

pub mod concepts;
pub mod snippet;
pub mod validate;

pub use concepts::ConceptSearchResult;
pub use validate::SearchError;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::str::FromStr;

use crate::config::{self, Config};
use crate::embeddings::{self, SharedEmbedder};
use crate::store::{DateRange, Exchange, ExchangeStore};

/// Default result limit when the caller doesn't specify one
pub const DEFAULT_LIMIT: usize = 10;
/// Upper bound on the result limit
pub const MAX_LIMIT: usize = 100;

/// Retrieval strategy for single-phrase queries
///
/// Multi-concept queries are always vector-based and ignore the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    Vector,
    Text,
    #[default]
    Both,
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vector" => Ok(SearchMode::Vector),
            "text" => Ok(SearchMode::Text),
            "both" => Ok(SearchMode::Both),
            other => bail!("Unknown search mode '{}' (expected vector, text, or both)", other),
        }
    }
}

/// Options shared by single and concept searches
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub limit: usize,
    /// Inclusive lower date bound (YYYY-MM-DD)
    pub after: Option<String>,
    /// Inclusive upper date bound (YYYY-MM-DD)
    pub before: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            limit: DEFAULT_LIMIT,
            after: None,
            before: None,
        }
    }
}

/// One ranked match
///
/// `similarity` is present for vector-derived results (higher = more
/// similar) and absent for pure-text matches, which are keyword hits with
/// unranked relevance.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub exchange: Exchange,
    pub similarity: Option<f32>,
    pub snippet: String,
}

/// Query input at the caller-facing boundary: one phrase, or a
/// conjunctive list of 2-5 concept phrases
#[derive(Debug, Clone)]
pub enum QueryInput {
    Single(String),
    Concepts(Vec<String>),
}

/// Outcome of dispatching a [`QueryInput`]
#[derive(Debug)]
pub enum SearchOutcome {
    Single(Vec<SearchResult>),
    Concepts(Vec<ConceptSearchResult>),
}

/// Hybrid retrieval engine: query planning, merging, and ranking
///
/// Holds the exchange store and a shared embedding engine. All store
/// operations are read-only; the mutexes just serialize access so
/// parallel concept queries take turns at each boundary.
pub struct RecallEngine {
    pub(crate) store: Mutex<ExchangeStore>,
    pub(crate) embedder: SharedEmbedder,
}

impl RecallEngine {
    /// Create an engine from an open store and an embedder handle
    pub fn new(store: ExchangeStore, embedder: SharedEmbedder) -> Self {
        Self {
            store: Mutex::new(store),
            embedder,
        }
    }

    /// Open the engine against the configured data directory, using the
    /// process-resident embedder
    pub fn open_default() -> Result<Self> {
        let config = Config::load()?;
        let store = ExchangeStore::open(
            config::data_dir()?.join("store"),
            config.embeddings.dimensions,
        )?;

        // A model switch would mix vector spaces; fail loudly instead
        if let Some((stored, _)) = store.stored_model()? {
            if stored != config.embeddings.model {
                bail!(
                    "Store was indexed with model '{}' but config selects '{}'. Re-import to switch models.",
                    stored,
                    config.embeddings.model
                );
            }
        }

        Ok(Self::new(store, embeddings::resident()?))
    }

    /// Search stored exchanges with a single query phrase
    ///
    /// Validation happens before any store or embedding access. Text mode
    /// never touches the embedding engine.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        validate::validate_query(query)?;
        let range = validate::validate_range(options.after.as_deref(), options.before.as_deref())?;
        let limit = options.limit.clamp(1, MAX_LIMIT);

        match options.mode {
            SearchMode::Vector => self.vector_search(query, limit, &range),
            SearchMode::Text => self.text_search(query, limit, &range),
            SearchMode::Both => {
                // Vector first, then text; the union is deliberately not
                // re-capped - callers get everything either method found
                let vector = self.vector_search(query, limit, &range)?;
                let text = self.text_search(query, limit, &range)?;
                Ok(merge_hybrid(vector, text))
            }
        }
    }

    /// Dispatch a tagged query input: single phrase or concept list
    pub fn run(&self, input: &QueryInput, options: &SearchOptions) -> Result<SearchOutcome> {
        match input {
            QueryInput::Single(query) => Ok(SearchOutcome::Single(self.search(query, options)?)),
            QueryInput::Concepts(concepts) => Ok(SearchOutcome::Concepts(
                self.search_concepts(concepts, options)?,
            )),
        }
    }

    fn vector_search(
        &self,
        query: &str,
        limit: usize,
        range: &DateRange,
    ) -> Result<Vec<SearchResult>> {
        let query_vector = {
            let mut embedder = self.embedder.lock();
            embedder
                .embed(query)
                .context("Failed to generate query embedding")?
        };

        let hits = self.store.lock().vector_query(&query_vector, limit, range)?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                similarity: Some(1.0 - hit.distance),
                snippet: snippet::extract(&hit.exchange.user_message),
                exchange: hit.exchange,
            })
            .collect())
    }

    fn text_search(
        &self,
        query: &str,
        limit: usize,
        range: &DateRange,
    ) -> Result<Vec<SearchResult>> {
        let exchanges = self.store.lock().text_scan(query, range, limit)?;

        Ok(exchanges
            .into_iter()
            .map(|exchange| SearchResult {
                similarity: None,
                snippet: snippet::extract(&exchange.user_message),
                exchange,
            })
            .collect())
    }
}

/// Merge vector and text results for `both` mode
///
/// Deduplicates by exchange id: the vector-derived entry (which carries a
/// similarity) wins, and text-only entries are appended after.
fn merge_hybrid(vector: Vec<SearchResult>, text: Vec<SearchResult>) -> Vec<SearchResult> {
    let seen: HashSet<String> = vector.iter().map(|r| r.exchange.id.clone()).collect();

    let mut merged = vector;
    merged.extend(
        text.into_iter()
            .filter(|r| !seen.contains(&r.exchange.id)),
    );
    merged
}
