//! Query construction for upstream search endpoints.
//!
//! A [`SearchQuery`](mediaforge_common::SearchQuery) carries free text plus
//! typed filters. The builders here turn it into the single query string a
//! provider's endpoint expects:
//!
//! - [`lucene`] -- Lucene/Solr boolean + range expressions (MusicBrainz,
//!   Open Library), parameterized by a [`QueryDialect`].
//! - [`igdb`] -- The IGDB "apicalypse" request body.
//!
//! Both builders return `None` when there is nothing to ask, and callers
//! must then answer with an empty page without touching the network.

pub mod igdb;
pub mod lucene;

use mediaforge_common::SearchQuery;
use serde::{Deserialize, Serialize};

pub use igdb::{IgdbQuery, IgdbTarget};
pub use lucene::{escape_lucene, LuceneQueryBuilder, QueryDialect};

/// Tunables for query construction.
///
/// The short-query threshold and the fuzzy/wildcard precedence are product
/// heuristics rather than upstream contracts, so they live in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Free text with fewer characters than this is treated as empty.
    pub min_query_len: usize,
    /// Marker appended to every token when fuzzy matching is requested.
    pub fuzzy_marker: String,
    /// Marker appended to the last token when prefix matching is requested.
    pub wildcard_marker: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_query_len: 3,
            fuzzy_marker: "~1".to_string(),
            wildcard_marker: "*".to_string(),
        }
    }
}

impl QueryConfig {
    /// The usable free text of `raw`, or `None` if it is below the threshold.
    pub fn effective_text<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < self.min_query_len.max(1) {
            None
        } else {
            Some(trimmed)
        }
    }

    /// Whether `query` has neither usable text nor an active filter, in
    /// which case it must be answered without a network call.
    pub fn is_empty_query(&self, query: &SearchQuery) -> bool {
        self.effective_text(&query.free_text).is_none() && !query.has_filters()
    }
}
