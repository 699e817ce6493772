//! Source A: fanart.tv artist thumbnails and album covers.
//!
//! fanart.tv serves full-size assets under `/fanart/`; the same path under
//! `/preview/` is a small rendition, which is all a thumbnail needs.

use async_trait::async_trait;
use mediaforge_common::{CanonicalItem, ItemType, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::source::{encode_segment, is_musicbrainz_entity, ImageSource};
use crate::config::ProviderSettings;
use crate::fetch::{FetchClient, FetchOptions};
use crate::metadata::provider::require_credential;

pub const DEFAULT_BASE_URL: &str = "https://webservice.fanart.tv/v3";

#[derive(Debug, Deserialize)]
struct FanartImage {
    url: String,
    #[serde(default)]
    likes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FanartAlbum {
    #[serde(default)]
    albumcover: Vec<FanartImage>,
}

#[derive(Debug, Deserialize)]
struct FanartMusic {
    #[serde(default)]
    artistthumb: Vec<FanartImage>,
    #[serde(default)]
    albums: HashMap<String, FanartAlbum>,
}

/// Rewrite a full-size asset URL to its preview rendition.
pub fn preview_url(url: &str) -> String {
    url.replacen("/fanart/", "/preview/", 1)
}

/// Most-liked image first, falling back to listing order.
fn best(images: &[FanartImage]) -> Option<&FanartImage> {
    images
        .iter()
        .filter(|i| !i.url.trim().is_empty())
        .max_by_key(|i| i.likes.as_deref().and_then(|l| l.parse::<u32>().ok()).unwrap_or(0))
}

pub struct FanartSource {
    fetch: FetchClient,
    base_url: String,
    api_key: Option<String>,
}

impl FanartSource {
    pub fn new(fetch: FetchClient, settings: &ProviderSettings) -> Self {
        Self {
            fetch,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            api_key: settings.api_key.clone(),
        }
    }
}

#[async_trait]
impl ImageSource for FanartSource {
    fn name(&self) -> &'static str {
        "fanart"
    }

    /// Without a key the source is skipped rather than failing per item.
    fn applies_to(&self, item: &CanonicalItem) -> bool {
        self.api_key.is_some() && is_musicbrainz_entity(item)
    }

    async fn lookup(&self, item: &CanonicalItem) -> Result<Option<String>> {
        let key = require_credential(&self.api_key, "fanart", "API key")?;
        let mbid = encode_segment(&item.external_id);
        let url = match item.item_type {
            ItemType::Album => format!("{}/music/albums/{mbid}", self.base_url),
            _ => format!("{}/music/{mbid}", self.base_url),
        };
        let opts = FetchOptions::new().query("api_key", key);

        let Some(music) = self.fetch.get_optional_json::<FanartMusic>(&url, &opts).await? else {
            debug!(id = %item.id, "fanart.tv has no entry");
            return Ok(None);
        };

        let picked = match item.item_type {
            ItemType::Album => music
                .albums
                .get(&item.external_id)
                .and_then(|a| best(&a.albumcover)),
            _ => best(&music.artistthumb),
        };
        Ok(picked.map(|img| preview_url(&img.url)))
    }
}
