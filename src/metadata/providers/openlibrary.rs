//! Open Library provider (books and authors).
//!
//! Search goes through the Solr-backed `search.json` endpoints; details come
//! from the work and author JSON documents.

use async_trait::async_trait;
use mediaforge_common::search::filter_keys;
use mediaforge_common::{
    CanonicalDetails, CanonicalItem, Category, ExternalUrl, ItemId, ItemType, LifeSpan, Result,
    SearchQuery, SearchResult,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::fetch::FetchOptions;
use crate::metadata::normalize::{non_empty, parse_year, pick_image, UNKNOWN_AUTHOR};
use crate::metadata::provider::{
    ensure_supported, relevance_only, MetadataProvider, ProviderContext,
};
use crate::query::{LuceneQueryBuilder, QueryDialect};

pub const PROVIDER_ID: &str = "openlibrary";
pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org";
const COVERS_BASE_URL: &str = "https://covers.openlibrary.org";
const DEFAULT_RATE_LIMIT: u32 = 5;
const SUPPORTED: &[ItemType] = &[ItemType::Book, ItemType::Author];
const BOOK_FIELDS: &str =
    "key,title,author_name,first_publish_year,cover_i,cover_edition_key,ratings_average,ratings_count";

/// Field names of the Open Library Solr schema.
pub struct OpenLibraryDialect;

impl QueryDialect for OpenLibraryDialect {
    fn text_field(&self, _item_type: ItemType) -> Option<&'static str> {
        None
    }

    fn filter_field(&self, key: &str, item_type: ItemType) -> Option<&'static str> {
        match (key, item_type) {
            (filter_keys::YEAR, ItemType::Book) => Some("first_publish_year"),
            (filter_keys::ARTIST, ItemType::Book) => Some("author_key"),
            (filter_keys::GENRE, ItemType::Book) => Some("subject"),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Upstream response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OlSearchEnvelope {
    #[serde(rename = "numFound")]
    num_found: u64,
    docs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct OlBookDoc {
    key: String,
    title: String,
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    first_publish_year: Option<i32>,
    #[serde(default)]
    cover_i: Option<i64>,
    #[serde(default)]
    cover_edition_key: Option<String>,
    #[serde(default)]
    ratings_average: Option<f64>,
    #[serde(default)]
    ratings_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OlAuthorDoc {
    key: String,
    name: String,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    top_work: Option<String>,
    #[serde(default)]
    work_count: Option<u64>,
}

/// Descriptions come either as a bare string or as `{type, value}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OlText {
    Plain(String),
    Typed { value: String },
}

impl OlText {
    fn as_str(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Typed { value } => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OlLink {
    #[serde(default)]
    title: Option<String>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct OlWork {
    title: String,
    #[serde(default)]
    description: Option<OlText>,
    #[serde(default)]
    subjects: Vec<String>,
    #[serde(default)]
    covers: Vec<i64>,
    #[serde(default)]
    first_publish_date: Option<String>,
    #[serde(default)]
    links: Vec<OlLink>,
}

#[derive(Debug, Deserialize)]
struct OlAuthor {
    name: String,
    #[serde(default)]
    bio: Option<OlText>,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    death_date: Option<String>,
    #[serde(default)]
    photos: Vec<i64>,
    #[serde(default)]
    links: Vec<OlLink>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// `"/works/OL27448W"` -> `"OL27448W"`.
fn bare_key(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}

fn cover_by_id(id: i64) -> Option<String> {
    (id > 0).then(|| format!("{COVERS_BASE_URL}/b/id/{id}-M.jpg"))
}

fn map_book(raw: &OlBookDoc) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Book, bare_key(&raw.key), &raw.title);
    item.subtitle = Some(if raw.author_name.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        raw.author_name.join(", ")
    });
    item.year = raw.first_publish_year;
    item.image_url = pick_image([
        raw.cover_i.and_then(cover_by_id),
        raw.cover_edition_key
            .as_ref()
            .map(|k| format!("{COVERS_BASE_URL}/b/olid/{k}-M.jpg")),
    ]);
    item.rating = raw.ratings_average;
    item.review_count = raw.ratings_count;
    Ok(item)
}

fn map_author(raw: &OlAuthorDoc) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Author, bare_key(&raw.key), &raw.name);
    item.subtitle = non_empty(raw.top_work.as_deref()).or_else(|| {
        raw.work_count
            .map(|n| format!("{n} work{}", if n == 1 { "" } else { "s" }))
    });
    item.year = raw.birth_date.as_deref().and_then(year_in_text);
    Ok(item)
}

/// Author dates are free text ("21 September 1947"); take the first
/// four-digit run.
fn year_in_text(text: &str) -> Option<i32> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|run| run.len() == 4)
        .and_then(parse_year)
}

fn links(links: &[OlLink]) -> Vec<ExternalUrl> {
    links
        .iter()
        .map(|l| ExternalUrl {
            kind: l.title.clone().unwrap_or_else(|| "link".to_string()),
            url: l.url.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Open Library metadata provider.
pub struct OpenLibraryProvider {
    ctx: ProviderContext,
    base_url: String,
}

impl OpenLibraryProvider {
    pub fn new(mut ctx: ProviderContext, settings: &ProviderSettings) -> Self {
        ctx.fetch = settings.throttle(&ctx.fetch, DEFAULT_RATE_LIMIT);
        Self {
            ctx,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        }
    }

    async fn work_details(&self, id: &str) -> Result<CanonicalDetails> {
        let url = format!("{}/works/{id}.json", self.base_url);
        let raw: OlWork = self.ctx.fetch.get_json(&url, &FetchOptions::new()).await?;

        let mut details =
            CanonicalDetails::skeleton(ItemId::new(PROVIDER_ID, ItemType::Book, id), ItemType::Book);
        details.title = Some(raw.title);
        details.year = raw.first_publish_date.as_deref().and_then(year_in_text);
        details.image_url = raw.covers.iter().copied().find_map(cover_by_id);
        details.description = raw.description.as_ref().and_then(|d| non_empty(Some(d.as_str())));
        details.tags = raw.subjects;
        details.urls = links(&raw.links);
        Ok(details)
    }

    async fn author_details(&self, id: &str) -> Result<CanonicalDetails> {
        let url = format!("{}/authors/{id}.json", self.base_url);
        let raw: OlAuthor = self.ctx.fetch.get_json(&url, &FetchOptions::new()).await?;

        let mut details = CanonicalDetails::skeleton(
            ItemId::new(PROVIDER_ID, ItemType::Author, id),
            ItemType::Author,
        );
        details.title = Some(raw.name);
        details.year = raw.birth_date.as_deref().and_then(year_in_text);
        details.image_url = raw
            .photos
            .iter()
            .copied()
            .find(|p| *p > 0)
            .map(|p| format!("{COVERS_BASE_URL}/a/id/{p}-M.jpg"));
        details.description = raw.bio.as_ref().and_then(|b| non_empty(Some(b.as_str())));
        details.urls = links(&raw.links);
        if raw.birth_date.is_some() || raw.death_date.is_some() {
            details.life_span = Some(LifeSpan {
                ended: raw.death_date.is_some(),
                begin: raw.birth_date,
                end: raw.death_date,
            });
        }
        Ok(details)
    }
}

#[async_trait]
impl MetadataProvider for OpenLibraryProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn label(&self) -> &'static str {
        "Open Library"
    }

    fn category(&self) -> Category {
        Category::Books
    }

    fn supported_types(&self) -> &'static [ItemType] {
        SUPPORTED
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        ensure_supported(self, query.item_type)?;

        let Some(q) = LuceneQueryBuilder::new(&OpenLibraryDialect, &self.ctx.query).build(query)
        else {
            debug!(provider = PROVIDER_ID, "Empty query, short-circuiting");
            return Ok(SearchResult::empty(query.page));
        };

        debug!(provider = PROVIDER_ID, query = %q, "Open Library search");
        let n = &self.ctx.normalizer;
        let (total, items) = match query.item_type {
            ItemType::Author => {
                let opts = FetchOptions::new()
                    .query("q", q.as_str())
                    .query("limit", query.page_size.to_string())
                    .query("offset", query.offset().to_string());
                let url = format!("{}/search/authors.json", self.base_url);
                let envelope: OlSearchEnvelope = self.ctx.fetch.get_json(&url, &opts).await?;
                let items = n.normalize_page(
                    PROVIDER_ID,
                    ItemType::Author,
                    envelope.docs,
                    |r: &OlAuthorDoc| Some(bare_key(&r.key)),
                    map_author,
                );
                (envelope.num_found, items)
            }
            _ => {
                let opts = FetchOptions::new()
                    .query("q", q.as_str())
                    .query("page", query.page.to_string())
                    .query("limit", query.page_size.to_string())
                    .query("fields", BOOK_FIELDS);
                let url = format!("{}/search.json", self.base_url);
                let envelope: OlSearchEnvelope = self.ctx.fetch.get_json(&url, &opts).await?;
                let items = n.normalize_page(
                    PROVIDER_ID,
                    ItemType::Book,
                    envelope.docs,
                    |r: &OlBookDoc| Some(bare_key(&r.key)),
                    map_book,
                );
                (envelope.num_found, items)
            }
        };

        Ok(SearchResult::new(
            items,
            query.page,
            query.page_size,
            total,
            relevance_only(query.sort),
        ))
    }

    async fn get_details(&self, external_id: &str, item_type: ItemType) -> Result<CanonicalDetails> {
        ensure_supported(self, item_type)?;
        match item_type {
            ItemType::Author => self.author_details(external_id).await,
            _ => self.work_details(external_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_book_with_cover_priority() {
        let raw: OlBookDoc = serde_json::from_value(json!({
            "key": "/works/OL27448W",
            "title": "The Fellowship of the Ring",
            "author_name": ["J.R.R. Tolkien"],
            "first_publish_year": 1954,
            "cover_i": 14627060,
            "cover_edition_key": "OL51694024M",
            "ratings_average": 4.5,
            "ratings_count": 120
        }))
        .unwrap();
        let item = map_book(&raw).unwrap();
        assert_eq!(item.id.as_str(), "openlibrary:book:OL27448W");
        assert_eq!(item.subtitle.as_deref(), Some("J.R.R. Tolkien"));
        assert_eq!(
            item.image_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/14627060-M.jpg")
        );
        assert_eq!(item.review_count, Some(120));
    }

    #[test]
    fn missing_author_defaults_to_unknown() {
        let raw: OlBookDoc =
            serde_json::from_value(json!({"key": "/works/OL1W", "title": "Anon"})).unwrap();
        let item = map_book(&raw).unwrap();
        assert_eq!(item.subtitle.as_deref(), Some(UNKNOWN_AUTHOR));
        assert!(item.image_url.is_none());
    }

    #[test]
    fn falls_back_to_edition_cover() {
        let raw: OlBookDoc = serde_json::from_value(json!({
            "key": "/works/OL1W",
            "title": "T",
            "cover_i": -1,
            "cover_edition_key": "OL2M"
        }))
        .unwrap();
        assert_eq!(
            map_book(&raw).unwrap().image_url.as_deref(),
            Some("https://covers.openlibrary.org/b/olid/OL2M-M.jpg")
        );
    }

    #[test]
    fn author_year_from_free_text_date() {
        assert_eq!(year_in_text("21 September 1947"), Some(1947));
        assert_eq!(year_in_text("1947"), Some(1947));
        assert_eq!(year_in_text("unknown"), None);
    }

    #[test]
    fn description_accepts_both_shapes() {
        let plain: OlText = serde_json::from_value(json!("text")).unwrap();
        let typed: OlText =
            serde_json::from_value(json!({"type": "/type/text", "value": "typed"})).unwrap();
        assert_eq!(plain.as_str(), "text");
        assert_eq!(typed.as_str(), "typed");
    }
}
