//! Thumbnail resolution for items the catalog returned without one.
//!
//! MusicBrainz carries no imagery of its own, so artist and album results
//! are enriched from third-party sources, tried in this order:
//!
//! 1. [`FanartSource`] -- fanart.tv artist thumbs and album covers.
//! 2. [`WikidataSource`] -- the Wikidata `P18` image via Wikimedia Commons.
//! 3. [`CoverArtSource`] -- Cover Art Archive front covers.
//!
//! The [`ImageWaterfall`] runs them and writes hits back into the caches.

pub mod coverart;
pub mod fanart;
pub mod source;
pub mod wikidata;
mod waterfall;

use std::sync::Arc;

pub use coverart::CoverArtSource;
pub use fanart::FanartSource;
pub use source::ImageSource;
pub use waterfall::ImageWaterfall;
pub use wikidata::WikidataSource;

use crate::cache::{ItemCache, ItemRegistry};
use crate::config::ProvidersConfig;
use crate::fetch::FetchClient;

/// The bundled sources in waterfall order.
///
/// `musicbrainz` must be the client the MusicBrainz provider uses, so the
/// sources' lookups count against the same rate limit.
pub fn default_sources(
    fetch: &FetchClient,
    musicbrainz: &FetchClient,
    config: &ProvidersConfig,
) -> Vec<Arc<dyn ImageSource>> {
    let mb = &config.musicbrainz;
    vec![
        Arc::new(FanartSource::new(fetch.clone(), &config.fanart)),
        Arc::new(WikidataSource::new(fetch, musicbrainz.clone(), mb, &config.wikidata)),
        Arc::new(CoverArtSource::new(fetch, musicbrainz.clone(), mb, &config.coverart)),
    ]
}

/// A waterfall over [`default_sources`] writing into the given stores.
pub fn build_waterfall(
    fetch: &FetchClient,
    musicbrainz: &FetchClient,
    config: &ProvidersConfig,
    cache: Arc<ItemCache>,
    registry: Arc<ItemRegistry>,
) -> ImageWaterfall {
    ImageWaterfall::new(default_sources(fetch, musicbrainz, config), cache, registry)
}
