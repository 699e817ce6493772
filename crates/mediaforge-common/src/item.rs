//! Canonical item records.
//!
//! [`CanonicalItem`] is what every search returns, independent of the
//! upstream that produced it. [`CanonicalDetails`] is the richer record
//! fetched lazily when someone opens an item.

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;
use crate::types::ItemType;

/// The unified representation of a media entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    /// Stable id derived from `(provider_id, item_type, external_id)`.
    pub id: ItemId,
    /// The provider's own identifier.
    pub external_id: String,
    /// Kind of entity.
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Display title. Empty only in partial records used for enrichment.
    #[serde(default)]
    pub title: String,
    /// Secondary display line (artist, author, track length, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Release, publication, or birth year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Best available cover, poster, or portrait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Community rating, on the provider's own scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Number of ratings or reviews behind `rating`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    /// Provider that served this item (e.g. "musicbrainz").
    pub provider_id: String,
}

impl CanonicalItem {
    /// Build an item with its id derived from the natural key.
    pub fn new(
        provider_id: &str,
        item_type: ItemType,
        external_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let external_id = external_id.into();
        Self {
            id: ItemId::new(provider_id, item_type, &external_id),
            external_id,
            item_type,
            title: title.into(),
            subtitle: None,
            year: None,
            image_url: None,
            rating: None,
            review_count: None,
            provider_id: provider_id.to_string(),
        }
    }

    /// Whether the item still needs an image.
    pub fn lacks_image(&self) -> bool {
        self.image_url.as_deref().map_or(true, str::is_empty)
    }

    /// Copy of this item carrying `url` as its image.
    #[must_use]
    pub fn with_image(&self, url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..self.clone()
        }
    }

    /// Merge a newer record for the same id into this one.
    ///
    /// Non-empty fields of `newer` overwrite; empty or absent fields of
    /// `newer` never erase what is already here.
    pub fn merge_from(&mut self, newer: &CanonicalItem) {
        if !newer.title.is_empty() {
            self.title = newer.title.clone();
        }
        if !newer.external_id.is_empty() {
            self.external_id = newer.external_id.clone();
        }
        if !newer.provider_id.is_empty() {
            self.provider_id = newer.provider_id.clone();
        }
        merge_text(&mut self.subtitle, &newer.subtitle);
        merge_text(&mut self.image_url, &newer.image_url);
        if newer.year.is_some() {
            self.year = newer.year;
        }
        if newer.rating.is_some() {
            self.rating = newer.rating;
        }
        if newer.review_count.is_some() {
            self.review_count = newer.review_count;
        }
    }
}

fn merge_text(slot: &mut Option<String>, newer: &Option<String>) {
    if let Some(value) = newer.as_deref().filter(|v| !v.is_empty()) {
        *slot = Some(value.to_string());
    }
}

/// One entry of an album tracklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEntry {
    /// 1-based position on the release.
    pub position: u32,
    pub title: String,
    /// Length formatted as `m:ss`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
}

/// Active period of an artist, author, or studio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifeSpan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default)]
    pub ended: bool,
}

/// A typed external link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalUrl {
    /// Link kind as reported upstream (e.g. "wikidata", "official homepage").
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// The lazily fetched detail view of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDetails {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tracklist: Vec<TrackEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_span: Option<LifeSpan>,
    #[serde(default)]
    pub urls: Vec<ExternalUrl>,
}

impl CanonicalDetails {
    /// The degraded record used when details cannot be fetched.
    pub fn skeleton(id: ItemId, item_type: ItemType) -> Self {
        Self {
            id,
            item_type,
            title: None,
            year: None,
            image_url: None,
            description: None,
            tags: Vec::new(),
            tracklist: Vec::new(),
            life_span: None,
            urls: Vec::new(),
        }
    }

    /// Whether this is only the `{id, type}` skeleton.
    pub fn is_skeleton(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.is_empty()
            && self.tracklist.is_empty()
            && self.urls.is_empty()
    }
}
