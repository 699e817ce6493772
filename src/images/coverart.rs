//! Source C: Cover Art Archive front covers for release groups.
//!
//! The archive's JSON index is consulted first so a missing cover is a
//! plain miss instead of a dangling redirect URL. The release group's own
//! front image wins; otherwise the first release of the group is tried.

use async_trait::async_trait;
use mediaforge_common::{CanonicalItem, ItemType, Result};
use serde::Deserialize;
use tracing::debug;

use super::source::{encode_segment, is_musicbrainz_entity, ImageSource};
use crate::config::ProviderSettings;
use crate::fetch::{FetchClient, FetchOptions};
use crate::metadata::providers::musicbrainz;

pub const DEFAULT_BASE_URL: &str = "https://coverartarchive.org";

#[derive(Debug, Deserialize)]
struct CoverIndex {
    #[serde(default)]
    images: Vec<CoverImage>,
}

#[derive(Debug, Deserialize)]
struct CoverImage {
    #[serde(default)]
    front: bool,
}

impl CoverIndex {
    fn has_front(&self) -> bool {
        self.images.iter().any(|i| i.front)
    }
}

#[derive(Debug, Deserialize)]
struct GroupReleases {
    #[serde(default)]
    releases: Vec<ReleaseRef>,
}

#[derive(Debug, Deserialize)]
struct ReleaseRef {
    id: String,
}

pub struct CoverArtSource {
    archive: FetchClient,
    musicbrainz: FetchClient,
    base_url: String,
    musicbrainz_url: String,
}

impl CoverArtSource {
    pub fn new(
        fetch: &FetchClient,
        musicbrainz: FetchClient,
        musicbrainz_settings: &ProviderSettings,
        settings: &ProviderSettings,
    ) -> Self {
        Self {
            archive: settings.throttle(fetch, 0),
            musicbrainz,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            musicbrainz_url: musicbrainz_settings.base_url_or(musicbrainz::DEFAULT_BASE_URL),
        }
    }

    /// `{base}/{entity}/{mbid}/front-250` if the archive lists a front image.
    async fn front(&self, entity: &str, mbid: &str) -> Result<Option<String>> {
        let base = format!("{}/{entity}/{}", self.base_url, encode_segment(mbid));
        let index = self
            .archive
            .get_optional_json::<CoverIndex>(&base, &FetchOptions::new())
            .await?;
        Ok(index
            .filter(CoverIndex::has_front)
            .map(|_| format!("{base}/front-250")))
    }

    async fn first_release(&self, group_mbid: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/ws/2/release-group/{}",
            self.musicbrainz_url,
            encode_segment(group_mbid)
        );
        let opts = FetchOptions::new().query("inc", "releases").query("fmt", "json");
        let group = self
            .musicbrainz
            .get_optional_json::<GroupReleases>(&url, &opts)
            .await?;
        Ok(group.and_then(|g| g.releases.into_iter().next()).map(|r| r.id))
    }
}

#[async_trait]
impl ImageSource for CoverArtSource {
    fn name(&self) -> &'static str {
        "coverart"
    }

    fn applies_to(&self, item: &CanonicalItem) -> bool {
        is_musicbrainz_entity(item) && item.item_type == ItemType::Album
    }

    async fn lookup(&self, item: &CanonicalItem) -> Result<Option<String>> {
        if let Some(url) = self.front("release-group", &item.external_id).await? {
            return Ok(Some(url));
        }
        let Some(release) = self.first_release(&item.external_id).await? else {
            debug!(id = %item.id, "Release group has no releases");
            return Ok(None);
        };
        self.front("release", &release).await
    }
}
