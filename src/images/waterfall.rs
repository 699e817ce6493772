//! Ordered image resolution with write-back into the item stores.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use mediaforge_common::{CanonicalItem, ItemId};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::source::{is_musicbrainz_entity, ImageSource};
use crate::cache::{ItemCache, ItemRegistry};

/// Items looked up at once by one enrichment task. Upstream rate limits
/// still apply per source.
const ENRICH_CONCURRENCY: usize = 4;

/// Tries each [`ImageSource`] in order until one yields a URL.
///
/// Source failures never escape: they are logged and the next source is
/// tried. Enrichment results are written into both the item cache and the
/// registry so every later read sees the image.
pub struct ImageWaterfall {
    sources: Vec<Arc<dyn ImageSource>>,
    cache: Arc<ItemCache>,
    registry: Arc<ItemRegistry>,
    in_flight: Mutex<HashSet<ItemId>>,
    tasks: TaskTracker,
}

impl ImageWaterfall {
    pub fn new(
        sources: Vec<Arc<dyn ImageSource>>,
        cache: Arc<ItemCache>,
        registry: Arc<ItemRegistry>,
    ) -> Self {
        Self {
            sources,
            cache,
            registry,
            in_flight: Mutex::new(HashSet::new()),
            tasks: TaskTracker::new(),
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Whether `item` is a candidate for enrichment at all.
    pub fn wants(&self, item: &CanonicalItem) -> bool {
        item.lacks_image() && is_musicbrainz_entity(item)
    }

    /// First image URL any source produces, or `None` if all miss.
    pub async fn resolve(&self, item: &CanonicalItem) -> Option<String> {
        if !is_musicbrainz_entity(item) {
            return None;
        }
        for source in &self.sources {
            if !source.applies_to(item) {
                continue;
            }
            match source.lookup(item).await {
                Ok(Some(url)) if !url.trim().is_empty() => {
                    debug!(id = %item.id, source = source.name(), "Image resolved");
                    return Some(url);
                }
                Ok(_) => debug!(id = %item.id, source = source.name(), "Image source miss"),
                Err(e) => warn!(
                    id = %item.id,
                    source = source.name(),
                    error = %e,
                    "Image source failed; trying next"
                ),
            }
        }
        None
    }

    /// Resolve an image for `item` and store the enriched copy.
    ///
    /// Returns the enriched item, or `None` when nothing was found or the
    /// item already had an image.
    pub async fn enrich(&self, item: &CanonicalItem) -> Option<Arc<CanonicalItem>> {
        if !self.wants(item) {
            return None;
        }
        let url = self.resolve(item).await?;

        // Start from the freshest known copy so concurrent merges are kept.
        let base = self
            .cache
            .get(&item.id)
            .map(|cached| (*cached).clone())
            .or_else(|| self.registry.get_item(&item.id))
            .unwrap_or_else(|| item.clone());
        let enriched = Arc::new(base.with_image(url));

        self.cache.set(Arc::clone(&enriched));
        self.registry.register_item((*enriched).clone());
        Some(enriched)
    }

    /// Enrich `items` on a background task.
    ///
    /// Items that need no image, or are already being enriched, are
    /// skipped. The handle resolves to the number of items enriched.
    pub fn spawn_enrichment(self: &Arc<Self>, items: Vec<Arc<CanonicalItem>>) -> JoinHandle<usize> {
        let claimed: Vec<Arc<CanonicalItem>> = {
            let mut in_flight = self.in_flight.lock();
            items
                .into_iter()
                .filter(|item| self.wants(item) && in_flight.insert(item.id.clone()))
                .collect()
        };

        let waterfall = Arc::clone(self);
        self.tasks.spawn(async move {
            if claimed.is_empty() {
                return 0;
            }
            info!(count = claimed.len(), "Enriching items with images");

            let enriched = stream::iter(claimed)
                .map(|item| {
                    let waterfall = Arc::clone(&waterfall);
                    async move {
                        let hit = waterfall.enrich(&item).await.is_some();
                        if !hit {
                            debug!(id = %item.id, "No image found");
                        }
                        waterfall.in_flight.lock().remove(&item.id);
                        hit
                    }
                })
                .buffer_unordered(ENRICH_CONCURRENCY)
                .filter(|hit| futures::future::ready(*hit))
                .count()
                .await;

            info!(enriched, "Image enrichment finished");
            enriched
        })
    }

    /// Wait for every enrichment task spawned so far.
    pub async fn flush(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}
