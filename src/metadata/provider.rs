//! Trait definition for metadata providers.
//!
//! Every upstream catalog (MusicBrainz, Open Library, TMDB, RAWG, IGDB)
//! implements [`MetadataProvider`]. Providers are held as
//! `Arc<dyn MetadataProvider>` by the [`ProviderRegistry`](super::ProviderRegistry)
//! and share one [`ProviderContext`].

use async_trait::async_trait;
use mediaforge_common::{
    CanonicalDetails, Category, Error, ItemType, Result, SearchQuery, SearchResult, SortOrder,
};

use super::normalize::Normalizer;
use crate::fetch::FetchClient;
use crate::query::QueryConfig;

/// Collaborators every provider needs.
#[derive(Clone)]
pub struct ProviderContext {
    pub fetch: FetchClient,
    pub normalizer: Normalizer,
    pub query: QueryConfig,
}

/// Async trait that all metadata providers must implement.
///
/// `search` never fails for "no results"; it answers with an empty
/// [`SearchResult`]. Failures the fetch layer could not resolve propagate,
/// and a provider missing its credentials reports [`Error::Config`] before
/// touching the network.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier for this provider (e.g. `"tmdb"`).
    fn id(&self) -> &'static str;

    /// Human readable name.
    fn label(&self) -> &'static str;

    fn category(&self) -> Category;

    fn supported_types(&self) -> &'static [ItemType];

    /// Returns `true` when the provider has every credential it needs.
    fn is_available(&self) -> bool;

    fn supports(&self, item_type: ItemType) -> bool {
        self.supported_types().contains(&item_type)
    }

    /// One page of canonical results for `query`.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult>;

    /// Full details for an item this provider served.
    async fn get_details(&self, external_id: &str, item_type: ItemType)
        -> Result<CanonicalDetails>;
}

/// Reject item types the provider cannot serve.
pub fn ensure_supported(provider: &dyn MetadataProvider, item_type: ItemType) -> Result<()> {
    if provider.supports(item_type) {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "{} does not serve {} items",
            provider.id(),
            item_type
        )))
    }
}

/// A configured secret, or [`Error::Config`] naming what is missing.
pub fn require_credential<'a>(value: &'a Option<String>, provider: &str, what: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::config(format!("{provider}: missing {what}")))
}

/// Whether an endpoint that only ranks by relevance satisfies `sort`.
pub fn relevance_only(sort: SortOrder) -> bool {
    sort == SortOrder::Relevance
}
