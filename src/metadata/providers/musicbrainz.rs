//! MusicBrainz provider (artists, albums, tracks).
//!
//! Searches the `/ws/2` Lucene endpoints. Albums are release groups so one
//! result stands for every edition. MusicBrainz asks for at most one request
//! per second and a descriptive User-Agent, both applied by default.

use async_trait::async_trait;
use mediaforge_common::search::filter_keys;
use mediaforge_common::{
    CanonicalDetails, CanonicalItem, Category, ExternalUrl, ItemId, ItemType, LifeSpan, Result,
    SearchQuery, SearchResult, TrackEntry,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::fetch::{FetchClient, FetchOptions};
use crate::metadata::normalize::{format_duration_ms, non_empty, parse_year};
use crate::metadata::provider::{
    ensure_supported, relevance_only, MetadataProvider, ProviderContext,
};
use crate::query::{LuceneQueryBuilder, QueryDialect};

pub const PROVIDER_ID: &str = "musicbrainz";
pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org";
pub const DEFAULT_RATE_LIMIT: u32 = 1;

/// The one throttled client every MusicBrainz caller must share.
///
/// Clones share the limiter, so the provider and the image sources draw
/// from a single per-second budget.
pub fn client(fetch: &FetchClient, settings: &ProviderSettings) -> FetchClient {
    settings.throttle(fetch, DEFAULT_RATE_LIMIT)
}
const MAX_PAGE_SIZE: u32 = 100;
const SUPPORTED: &[ItemType] = &[ItemType::Artist, ItemType::Album, ItemType::Track];

/// Field names of the MusicBrainz search indexes.
pub struct MusicBrainzDialect;

impl QueryDialect for MusicBrainzDialect {
    fn text_field(&self, item_type: ItemType) -> Option<&'static str> {
        match item_type {
            ItemType::Artist => Some("artist"),
            ItemType::Album => Some("releasegroup"),
            ItemType::Track => Some("recording"),
            _ => None,
        }
    }

    fn filter_field(&self, key: &str, item_type: ItemType) -> Option<&'static str> {
        match (key, item_type) {
            (filter_keys::YEAR, ItemType::Artist) => Some("begin"),
            (filter_keys::YEAR, _) => Some("firstreleasedate"),
            (filter_keys::GENRE, _) => Some("tag"),
            (filter_keys::PRIMARY_TYPE, ItemType::Album) => Some("primarytype"),
            (filter_keys::ARTIST, ItemType::Album | ItemType::Track) => Some("arid"),
            (filter_keys::DURATION, ItemType::Track) => Some("dur"),
            _ => None,
        }
    }

    fn range_bound(&self, key: &str, value: i64) -> String {
        // durations are indexed in milliseconds
        if key == filter_keys::DURATION {
            value.saturating_mul(1000).to_string()
        } else {
            value.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Upstream response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MbSearchEnvelope {
    count: u64,
    #[serde(default)]
    artists: Vec<Value>,
    #[serde(default, rename = "release-groups")]
    release_groups: Vec<Value>,
    #[serde(default)]
    recordings: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MbArtist {
    id: String,
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    disambiguation: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    life_span: Option<MbLifeSpan>,
    #[serde(default)]
    tags: Vec<MbTag>,
    #[serde(default)]
    genres: Vec<MbTag>,
    #[serde(default)]
    relations: Vec<MbRelation>,
}

#[derive(Debug, Default, Deserialize)]
struct MbLifeSpan {
    #[serde(default)]
    begin: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    ended: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct MbTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MbRelation {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: Option<MbUrl>,
}

#[derive(Debug, Deserialize)]
struct MbUrl {
    resource: String,
}

#[derive(Debug, Deserialize)]
struct MbCredit {
    name: String,
    #[serde(default)]
    joinphrase: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MbReleaseGroup {
    id: String,
    title: String,
    #[serde(default)]
    primary_type: Option<String>,
    #[serde(default)]
    first_release_date: Option<String>,
    #[serde(default)]
    artist_credit: Vec<MbCredit>,
    #[serde(default)]
    releases: Vec<MbReleaseRef>,
    #[serde(default)]
    tags: Vec<MbTag>,
    #[serde(default)]
    genres: Vec<MbTag>,
    #[serde(default)]
    relations: Vec<MbRelation>,
}

#[derive(Debug, Deserialize)]
struct MbReleaseRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MbRecording {
    id: String,
    title: String,
    #[serde(default)]
    length: Option<u64>,
    #[serde(default)]
    first_release_date: Option<String>,
    #[serde(default)]
    artist_credit: Vec<MbCredit>,
    #[serde(default)]
    tags: Vec<MbTag>,
    #[serde(default)]
    genres: Vec<MbTag>,
    #[serde(default)]
    disambiguation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MbRelease {
    #[serde(default)]
    media: Vec<MbMedium>,
}

#[derive(Debug, Deserialize)]
struct MbMedium {
    #[serde(default)]
    tracks: Vec<MbTrack>,
}

#[derive(Debug, Deserialize)]
struct MbTrack {
    title: String,
    #[serde(default)]
    length: Option<u64>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

fn credit_line(credits: &[MbCredit]) -> Option<String> {
    let line: String = credits
        .iter()
        .map(|c| format!("{}{}", c.name, c.joinphrase.as_deref().unwrap_or("")))
        .collect();
    non_empty(Some(&line))
}

fn tag_names(tags: &[MbTag], genres: &[MbTag]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for tag in genres.iter().chain(tags) {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(&tag.name)) {
            names.push(tag.name.clone());
        }
    }
    names
}

fn external_urls(relations: &[MbRelation]) -> Vec<ExternalUrl> {
    relations
        .iter()
        .filter_map(|r| {
            r.url.as_ref().map(|u| ExternalUrl {
                kind: r.kind.clone(),
                url: u.resource.clone(),
            })
        })
        .collect()
}

fn map_artist(raw: &MbArtist) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Artist, &raw.id, &raw.name);
    item.subtitle = non_empty(raw.disambiguation.as_deref()).or_else(|| {
        let parts: Vec<&str> = [raw.kind.as_deref(), raw.country.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        non_empty(Some(&parts.join(" · ")))
    });
    item.year = raw
        .life_span
        .as_ref()
        .and_then(|ls| ls.begin.as_deref())
        .and_then(parse_year);
    Ok(item)
}

fn map_release_group(raw: &MbReleaseGroup) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Album, &raw.id, &raw.title);
    item.subtitle = credit_line(&raw.artist_credit);
    item.year = raw.first_release_date.as_deref().and_then(parse_year);
    Ok(item)
}

fn map_recording(raw: &MbRecording) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Track, &raw.id, &raw.title);
    let parts: Vec<String> = [credit_line(&raw.artist_credit), raw.length.map(format_duration_ms)]
        .into_iter()
        .flatten()
        .collect();
    item.subtitle = non_empty(Some(&parts.join(" · ")));
    item.year = raw.first_release_date.as_deref().and_then(parse_year);
    Ok(item)
}

fn entity_path(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Artist => "artist",
        ItemType::Album => "release-group",
        _ => "recording",
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// MusicBrainz metadata provider.
pub struct MusicBrainzProvider {
    ctx: ProviderContext,
    base_url: String,
}

impl MusicBrainzProvider {
    /// `client` should come from [`client`] so its budget is shared.
    pub fn new(mut ctx: ProviderContext, client: FetchClient, settings: &ProviderSettings) -> Self {
        ctx.fetch = client;
        Self {
            ctx,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/ws/2/{path}", self.base_url)
    }

    async fn lookup<T: serde::de::DeserializeOwned>(&self, path: &str, inc: &str) -> Result<T> {
        let opts = FetchOptions::new().query("inc", inc).query("fmt", "json");
        self.ctx.fetch.get_json(&self.url(path), &opts).await
    }

    async fn artist_details(&self, id: &str) -> Result<CanonicalDetails> {
        let raw: MbArtist = self
            .lookup(&format!("artist/{id}"), "url-rels+tags+genres")
            .await?;
        let mut details = CanonicalDetails::skeleton(
            ItemId::new(PROVIDER_ID, ItemType::Artist, id),
            ItemType::Artist,
        );
        details.title = Some(raw.name.clone());
        details.description = non_empty(raw.disambiguation.as_deref());
        details.tags = tag_names(&raw.tags, &raw.genres);
        details.urls = external_urls(&raw.relations);
        if let Some(ls) = &raw.life_span {
            details.year = ls.begin.as_deref().and_then(parse_year);
            details.life_span = Some(LifeSpan {
                begin: ls.begin.clone(),
                end: ls.end.clone(),
                ended: ls.ended.unwrap_or(false),
            });
        }
        Ok(details)
    }

    async fn album_details(&self, id: &str) -> Result<CanonicalDetails> {
        let raw: MbReleaseGroup = self
            .lookup(
                &format!("release-group/{id}"),
                "releases+artist-credits+tags+genres+url-rels",
            )
            .await?;
        let mut details = CanonicalDetails::skeleton(
            ItemId::new(PROVIDER_ID, ItemType::Album, id),
            ItemType::Album,
        );
        details.title = Some(raw.title.clone());
        details.year = raw.first_release_date.as_deref().and_then(parse_year);
        details.description = credit_line(&raw.artist_credit)
            .map(|artist| match raw.primary_type.as_deref() {
                Some(kind) => format!("{kind} by {artist}"),
                None => artist,
            });
        details.tags = tag_names(&raw.tags, &raw.genres);
        details.urls = external_urls(&raw.relations);

        if let Some(first) = raw.releases.first() {
            details.tracklist = self.tracklist(&first.id).await?;
        }
        Ok(details)
    }

    async fn tracklist(&self, release_id: &str) -> Result<Vec<TrackEntry>> {
        let release: MbRelease = self
            .lookup(&format!("release/{release_id}"), "recordings")
            .await?;
        Ok(release
            .media
            .iter()
            .flat_map(|m| m.tracks.iter())
            .enumerate()
            .map(|(i, t)| TrackEntry {
                position: u32::try_from(i + 1).unwrap_or(u32::MAX),
                title: t.title.clone(),
                length: t.length.map(format_duration_ms),
            })
            .collect())
    }

    async fn track_details(&self, id: &str) -> Result<CanonicalDetails> {
        let raw: MbRecording = self
            .lookup(&format!("recording/{id}"), "artist-credits+tags+genres")
            .await?;
        let mut details = CanonicalDetails::skeleton(
            ItemId::new(PROVIDER_ID, ItemType::Track, id),
            ItemType::Track,
        );
        details.title = Some(raw.title.clone());
        details.year = raw.first_release_date.as_deref().and_then(parse_year);
        details.description = non_empty(raw.disambiguation.as_deref())
            .or_else(|| credit_line(&raw.artist_credit));
        details.tags = tag_names(&raw.tags, &raw.genres);
        Ok(details)
    }
}

#[async_trait]
impl MetadataProvider for MusicBrainzProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn label(&self) -> &'static str {
        "MusicBrainz"
    }

    fn category(&self) -> Category {
        Category::Music
    }

    fn supported_types(&self) -> &'static [ItemType] {
        SUPPORTED
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        ensure_supported(self, query.item_type)?;

        let Some(lucene) = LuceneQueryBuilder::new(&MusicBrainzDialect, &self.ctx.query).build(query)
        else {
            debug!(provider = PROVIDER_ID, "Empty query, short-circuiting");
            return Ok(SearchResult::empty(query.page));
        };

        let page_size = query.page_size.min(MAX_PAGE_SIZE);
        let offset = u64::from(query.page.saturating_sub(1)) * u64::from(page_size);
        let opts = FetchOptions::new()
            .query("query", lucene.as_str())
            .query("limit", page_size.to_string())
            .query("offset", offset.to_string())
            .query("fmt", "json");

        debug!(provider = PROVIDER_ID, query = %lucene, "MusicBrainz search");
        let envelope: MbSearchEnvelope = self
            .ctx
            .fetch
            .get_json(&self.url(entity_path(query.item_type)), &opts)
            .await?;

        let n = &self.ctx.normalizer;
        let items = match query.item_type {
            ItemType::Artist => n.normalize_page(
                PROVIDER_ID,
                ItemType::Artist,
                envelope.artists,
                |r: &MbArtist| Some(r.id.clone()),
                map_artist,
            ),
            ItemType::Album => n.normalize_page(
                PROVIDER_ID,
                ItemType::Album,
                envelope.release_groups,
                |r: &MbReleaseGroup| Some(r.id.clone()),
                map_release_group,
            ),
            _ => n.normalize_page(
                PROVIDER_ID,
                ItemType::Track,
                envelope.recordings,
                |r: &MbRecording| Some(r.id.clone()),
                map_recording,
            ),
        };

        Ok(SearchResult::new(
            items,
            query.page,
            page_size,
            envelope.count,
            relevance_only(query.sort),
        ))
    }

    async fn get_details(&self, external_id: &str, item_type: ItemType) -> Result<CanonicalDetails> {
        ensure_supported(self, item_type)?;
        match item_type {
            ItemType::Artist => self.artist_details(external_id).await,
            ItemType::Album => self.album_details(external_id).await,
            _ => self.track_details(external_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryConfig;
    use serde_json::json;

    #[test]
    fn dialect_builds_album_query() {
        let config = QueryConfig::default();
        let q = SearchQuery::new(ItemType::Album, "ok computer").with_years(Some(1997), None);
        let built = LuceneQueryBuilder::new(&MusicBrainzDialect, &config)
            .build(&q)
            .unwrap();
        assert_eq!(built, "releasegroup:(ok computer) AND firstreleasedate:[1997 TO *]");
    }

    #[test]
    fn dialect_converts_duration_to_ms() {
        let config = QueryConfig::default();
        let q = SearchQuery::new(ItemType::Track, "").with_filter(
            filter_keys::DURATION,
            mediaforge_common::FilterValue::range(Some(60), Some(120)),
        );
        let built = LuceneQueryBuilder::new(&MusicBrainzDialect, &config)
            .build(&q)
            .unwrap();
        assert_eq!(built, "dur:[60000 TO 120000]");
    }

    #[test]
    fn maps_recording_with_formatted_length() {
        let raw: MbRecording = serde_json::from_value(json!({
            "id": "rec-1",
            "title": "Paranoid Android",
            "length": 383000,
            "first-release-date": "1997-05-26",
            "artist-credit": [{"name": "Radiohead", "joinphrase": ""}]
        }))
        .unwrap();
        let item = map_recording(&raw).unwrap();
        assert_eq!(item.id.as_str(), "musicbrainz:track:rec-1");
        assert_eq!(item.subtitle.as_deref(), Some("Radiohead · 6:23"));
        assert_eq!(item.year, Some(1997));
    }

    #[test]
    fn maps_multi_artist_credit() {
        let raw: MbReleaseGroup = serde_json::from_value(json!({
            "id": "rg-1",
            "title": "Collab",
            "artist-credit": [
                {"name": "A", "joinphrase": " & "},
                {"name": "B"}
            ]
        }))
        .unwrap();
        assert_eq!(map_release_group(&raw).unwrap().subtitle.as_deref(), Some("A & B"));
    }

    #[test]
    fn artist_subtitle_falls_back_to_type_and_country() {
        let raw: MbArtist = serde_json::from_value(json!({
            "id": "a-1",
            "name": "Radiohead",
            "type": "Group",
            "country": "GB",
            "life-span": {"begin": "1985", "ended": false}
        }))
        .unwrap();
        let item = map_artist(&raw).unwrap();
        assert_eq!(item.subtitle.as_deref(), Some("Group · GB"));
        assert_eq!(item.year, Some(1985));
    }

    #[test]
    fn tags_prefer_genres_and_dedupe() {
        let genres = vec![MbTag { name: "Rock".into() }];
        let tags = vec![MbTag { name: "rock".into() }, MbTag { name: "british".into() }];
        assert_eq!(tag_names(&tags, &genres), vec!["Rock", "british"]);
    }
}
