//! The facade every caller goes through.
//!
//! [`MediaEngine`] resolves a provider for each request, runs it, and keeps
//! the shared stores current: results are merged into the [`ItemRegistry`]
//! and items without artwork are handed to the [`ImageWaterfall`] in the
//! background.

use std::sync::Arc;

use mediaforge_common::search::filter_keys;
use mediaforge_common::{
    CanonicalDetails, CanonicalItem, Category, Error, ItemId, Result, SearchQuery, SearchResult,
};
use tracing::{debug, info, warn};

use crate::cache::{ItemCache, ItemRegistry};
use crate::config::Config;
use crate::images::{build_waterfall, ImageWaterfall};
use crate::metadata::providers::{build_registry, musicbrainz};
use crate::metadata::{MetadataProvider, Normalizer, ProviderContext, ProviderRegistry};
use crate::query::QueryConfig;

pub struct MediaEngine {
    providers: ProviderRegistry,
    cache: Arc<ItemCache>,
    registry: Arc<ItemRegistry>,
    waterfall: Option<Arc<ImageWaterfall>>,
    query: QueryConfig,
}

impl MediaEngine {
    pub fn new(
        providers: ProviderRegistry,
        cache: Arc<ItemCache>,
        registry: Arc<ItemRegistry>,
        query: QueryConfig,
    ) -> Self {
        Self {
            providers,
            cache,
            registry,
            waterfall: None,
            query,
        }
    }

    /// Enrich imageless results through `waterfall`.
    #[must_use]
    pub fn with_waterfall(mut self, waterfall: Arc<ImageWaterfall>) -> Self {
        self.waterfall = Some(waterfall);
        self
    }

    /// Wire up every bundled provider and image source from `config`.
    ///
    /// The registry starts empty; callers that persist it load it
    /// afterwards through [`registry`](Self::registry).
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetch = config.fetch.build_client();
        let cache = Arc::new(ItemCache::new(config.cache.item_capacity, config.cache.item_ttl()));
        let registry = Arc::new(ItemRegistry::new(config.cache.registry_capacity));

        let ctx = ProviderContext {
            fetch: fetch.clone(),
            normalizer: Normalizer::new(Arc::clone(&cache)),
            query: config.query.clone(),
        };
        let musicbrainz = musicbrainz::client(&fetch, &config.providers.musicbrainz);
        let providers = build_registry(&ctx, &musicbrainz, &config.providers)?;
        let waterfall = build_waterfall(
            &fetch,
            &musicbrainz,
            &config.providers,
            Arc::clone(&cache),
            Arc::clone(&registry),
        );

        info!(
            providers = providers.all().len(),
            image_sources = ?waterfall.source_names(),
            "Media engine ready"
        );

        Ok(Self::new(providers, cache, registry, config.query.clone())
            .with_waterfall(Arc::new(waterfall)))
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn cache(&self) -> &Arc<ItemCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<ItemRegistry> {
        &self.registry
    }

    pub fn waterfall(&self) -> Option<&Arc<ImageWaterfall>> {
        self.waterfall.as_ref()
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.query
    }

    /// Run one page of `query` against the resolved provider.
    ///
    /// An empty query is answered locally with an empty page.
    pub async fn search(
        &self,
        category: Category,
        provider_id: Option<&str>,
        query: &SearchQuery,
    ) -> Result<SearchResult> {
        let provider = self.providers.resolve(category, provider_id)?;
        if !provider.supports(query.item_type) {
            return Err(Error::invalid_input(format!(
                "{} does not serve {}",
                provider.id(),
                query.item_type
            )));
        }
        if self.query.is_empty_query(query) {
            debug!(provider = provider.id(), "Empty query, skipping upstream");
            return Ok(SearchResult::empty(query.page));
        }

        let mut result = provider.search(query).await?;

        if let Some(filter) = query.filter(filter_keys::YEAR) {
            let before = result.items.len();
            result
                .items
                .retain(|item| filter.admits(item.year.map(i64::from)));
            let dropped = before - result.items.len();
            if dropped > 0 {
                debug!(provider = provider.id(), dropped, "Dropped results outside year range");
                if result.total_pages <= 1 {
                    // every match was on this page, so what is left is the whole set
                    result.total_count = result.items.len() as u64;
                    result.total_pages = u32::from(!result.items.is_empty());
                } else {
                    debug!(
                        provider = provider.id(),
                        total_count = result.total_count,
                        "Year range applied locally; upstream counts are an upper bound"
                    );
                }
            }
        }

        self.registry
            .register_items(result.items.iter().map(|item| (**item).clone()));
        self.adopt_registered_images(&mut result.items);

        if let Some(waterfall) = &self.waterfall {
            let pending: Vec<_> = result
                .items
                .iter()
                .filter(|item| waterfall.wants(item))
                .cloned()
                .collect();
            if !pending.is_empty() {
                // Detached; results land in the cache and registry.
                drop(waterfall.spawn_enrichment(pending));
            }
        }

        debug!(
            provider = provider.id(),
            page = result.page,
            total_pages = result.total_pages,
            items = result.items.len(),
            "Search complete"
        );
        Ok(result)
    }

    /// Swap in registry copies that already carry an image.
    ///
    /// The cache is updated too, so the next lookup of the same id returns
    /// the same `Arc`.
    fn adopt_registered_images(&self, items: &mut [Arc<CanonicalItem>]) {
        for slot in items.iter_mut().filter(|item| item.lacks_image()) {
            let Some(known) = self.registry.get_item(&slot.id) else {
                continue;
            };
            if known.lacks_image() {
                continue;
            }
            let merged = Arc::new(known);
            self.cache.set(Arc::clone(&merged));
            *slot = merged;
        }
    }

    fn provider_for_item(
        &self,
        category: Category,
        provider_id: Option<&str>,
        id: &ItemId,
    ) -> Result<Arc<dyn MetadataProvider>> {
        let Some(owner) = id.provider_id() else {
            return Err(Error::invalid_input(format!("malformed item id '{id}'")));
        };
        if let Some(explicit) = provider_id {
            if explicit != owner {
                return Err(Error::invalid_input(format!(
                    "item {id} belongs to {owner}, not {explicit}"
                )));
            }
        }
        self.providers.resolve(category, Some(owner))
    }

    /// Full details for `id` from the provider that served it.
    ///
    /// An image found for the item in the registry fills a missing
    /// `image_url`. Calling this twice yields equal records.
    pub async fn get_details(
        &self,
        category: Category,
        provider_id: Option<&str>,
        id: &ItemId,
    ) -> Result<CanonicalDetails> {
        let provider = self.provider_for_item(category, provider_id, id)?;
        let Some((_, item_type, external_id)) = id.parts() else {
            return Err(Error::invalid_input(format!("malformed item id '{id}'")));
        };

        let mut details = provider.get_details(external_id, item_type).await?;
        if details.image_url.is_none() {
            details.image_url = self
                .cache
                .get(id)
                .and_then(|item| item.image_url.clone())
                .or_else(|| self.registry.get_item(id).and_then(|item| item.image_url))
                .filter(|url| !url.is_empty());
        }
        Ok(details)
    }

    /// Like [`get_details`](Self::get_details), degrading to the
    /// `{id, type}` skeleton on any upstream failure.
    ///
    /// Only an id whose type cannot be read is an error.
    pub async fn get_details_or_skeleton(
        &self,
        category: Category,
        provider_id: Option<&str>,
        id: &ItemId,
    ) -> Result<CanonicalDetails> {
        let Some(item_type) = id.item_type() else {
            return Err(Error::invalid_input(format!("malformed item id '{id}'")));
        };
        match self.get_details(category, provider_id, id).await {
            Ok(details) => Ok(details),
            Err(e) => {
                warn!(id = %id, error = %e, kind = ?e.failure_kind(), "Details unavailable, using skeleton");
                Ok(CanonicalDetails::skeleton(id.clone(), item_type))
            }
        }
    }

    /// Run the image waterfall for a known item right now.
    pub async fn resolve_image(&self, id: &ItemId) -> Result<Option<String>> {
        let Some(waterfall) = &self.waterfall else {
            return Ok(None);
        };
        let item = self
            .cache
            .get(id)
            .map(|item| (*item).clone())
            .or_else(|| self.registry.get_item(id))
            .or_else(|| {
                let (provider, item_type, external) = id.parts()?;
                Some(CanonicalItem::new(provider, item_type, external, ""))
            })
            .ok_or_else(|| Error::invalid_input(format!("malformed item id '{id}'")))?;

        if !item.lacks_image() {
            return Ok(item.image_url);
        }
        Ok(waterfall.enrich(&item).await.and_then(|e| e.image_url.clone()))
    }
}
