//! RAWG video game database provider.
//!
//! `/games` serves both text search (`search=`) and browsing (`dates=`,
//! `platforms=`, ...); it honours `ordering` in both modes.

use async_trait::async_trait;
use mediaforge_common::search::filter_keys;
use mediaforge_common::{
    CanonicalDetails, CanonicalItem, Category, Error, ExternalUrl, FilterValue, ItemId, ItemType,
    Result, SearchQuery, SearchResult, SortOrder,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::fetch::FetchOptions;
use crate::metadata::normalize::{non_empty, parse_year, pick_image};
use crate::metadata::provider::{
    ensure_supported, relevance_only, require_credential, MetadataProvider, ProviderContext,
};

pub const PROVIDER_ID: &str = "rawg";
pub const DEFAULT_BASE_URL: &str = "https://api.rawg.io/api";
const DEFAULT_RATE_LIMIT: u32 = 5;
const MAX_PAGE_SIZE: u32 = 40;
const SUPPORTED: &[ItemType] = &[ItemType::Game, ItemType::Developer];

#[derive(Debug, Deserialize)]
struct RawgPage {
    count: u64,
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawgGame {
    id: u64,
    name: String,
    #[serde(default)]
    released: Option<String>,
    #[serde(default)]
    background_image: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    ratings_count: Option<u64>,
    #[serde(default)]
    genres: Vec<RawgNamed>,
}

#[derive(Debug, Deserialize)]
struct RawgNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawgDeveloper {
    id: u64,
    name: String,
    #[serde(default)]
    games_count: Option<u64>,
    #[serde(default)]
    image_background: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawgGameDetail {
    name: String,
    #[serde(default)]
    description_raw: Option<String>,
    #[serde(default)]
    released: Option<String>,
    #[serde(default)]
    background_image: Option<String>,
    #[serde(default)]
    background_image_additional: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    genres: Vec<RawgNamed>,
    #[serde(default)]
    tags: Vec<RawgNamed>,
    #[serde(default)]
    developers: Vec<RawgNamed>,
}

#[derive(Debug, Deserialize)]
struct RawgDeveloperDetail {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image_background: Option<String>,
    #[serde(default)]
    games_count: Option<u64>,
}

fn map_game(raw: &RawgGame) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Game, raw.id.to_string(), &raw.name);
    item.year = raw.released.as_deref().and_then(parse_year);
    item.image_url = non_empty(raw.background_image.as_deref());
    item.subtitle = non_empty(Some(
        &raw.genres
            .iter()
            .map(|g| g.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    ));
    // RAWG reports 0.0 for unrated games
    item.rating = raw.rating.filter(|r| *r > 0.0);
    item.review_count = raw.ratings_count.filter(|c| *c > 0);
    Ok(item)
}

fn map_developer(raw: &RawgDeveloper) -> Result<CanonicalItem> {
    let mut item =
        CanonicalItem::new(PROVIDER_ID, ItemType::Developer, raw.id.to_string(), &raw.name);
    item.subtitle = raw.games_count.map(|n| format!("{n} games"));
    item.image_url = non_empty(raw.image_background.as_deref());
    Ok(item)
}

fn ordering(sort: SortOrder) -> Option<&'static str> {
    match sort {
        SortOrder::Relevance => None,
        SortOrder::TitleAsc => Some("name"),
        SortOrder::TitleDesc => Some("-name"),
        SortOrder::YearAsc => Some("released"),
        SortOrder::YearDesc => Some("-released"),
        SortOrder::RatingDesc => Some("-rating"),
    }
}

/// `dates=` value for an inclusive year range.
fn dates_param(min: Option<i64>, max: Option<i64>) -> String {
    format!(
        "{}-01-01,{}-12-31",
        min.unwrap_or(1900),
        max.unwrap_or(2100)
    )
}

/// Strip HTML tags from RAWG's rich-text descriptions.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// RAWG games database provider.
pub struct RawgProvider {
    ctx: ProviderContext,
    base_url: String,
    api_key: Option<String>,
}

impl RawgProvider {
    pub fn new(mut ctx: ProviderContext, settings: &ProviderSettings) -> Self {
        ctx.fetch = settings.throttle(&ctx.fetch, DEFAULT_RATE_LIMIT);
        Self {
            ctx,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            api_key: settings.api_key.clone(),
        }
    }

    fn options(&self) -> Result<FetchOptions> {
        let key = require_credential(&self.api_key, PROVIDER_ID, "API key")?;
        Ok(FetchOptions::new().query("key", key))
    }

    fn games_options(&self, query: &SearchQuery, page_size: u32) -> Result<FetchOptions> {
        let mut opts = self
            .options()?
            .query("page", query.page.to_string())
            .query("page_size", page_size.to_string());
        if let Some(text) = self.ctx.query.effective_text(&query.free_text) {
            opts = opts.query("search", text);
        }
        if let Some(order) = ordering(query.sort) {
            opts = opts.query("ordering", order);
        }
        if let Some((min, max)) = query.year_range() {
            opts = opts.query("dates", dates_param(min, max));
        }
        for (key, param) in [
            (filter_keys::PLATFORM, "platforms"),
            (filter_keys::GENRE, "genres"),
            (filter_keys::ARTIST, "developers"),
        ] {
            if let Some(FilterValue::Reference { id } | FilterValue::Enum { value: id }) =
                query.filter(key)
            {
                opts = opts.query(param, id.trim());
            }
        }
        Ok(opts)
    }
}

#[async_trait]
impl MetadataProvider for RawgProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn label(&self) -> &'static str {
        "RAWG"
    }

    fn category(&self) -> Category {
        Category::Games
    }

    fn supported_types(&self) -> &'static [ItemType] {
        SUPPORTED
    }

    fn is_available(&self) -> bool {
        require_credential(&self.api_key, PROVIDER_ID, "API key").is_ok()
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        ensure_supported(self, query.item_type)?;
        if self.ctx.query.is_empty_query(query) {
            debug!(provider = PROVIDER_ID, "Empty query, short-circuiting");
            return Ok(SearchResult::empty(query.page));
        }

        let page_size = query.page_size.min(MAX_PAGE_SIZE);
        let n = &self.ctx.normalizer;

        if query.item_type == ItemType::Developer {
            let Some(text) = self.ctx.query.effective_text(&query.free_text) else {
                self.options()?;
                debug!(provider = PROVIDER_ID, "Developers cannot be browsed by filter alone");
                return Ok(SearchResult::empty(query.page));
            };
            let opts = self
                .options()?
                .query("search", text)
                .query("page", query.page.to_string())
                .query("page_size", page_size.to_string());
            let url = format!("{}/developers", self.base_url);
            let page: RawgPage = self.ctx.fetch.get_json(&url, &opts).await?;
            let items = n.normalize_page(
                PROVIDER_ID,
                ItemType::Developer,
                page.results,
                |r: &RawgDeveloper| Some(r.id.to_string()),
                map_developer,
            );
            return Ok(SearchResult::new(
                items,
                query.page,
                page_size,
                page.count,
                relevance_only(query.sort),
            ));
        }

        let opts = self.games_options(query, page_size)?;
        let url = format!("{}/games", self.base_url);
        debug!(provider = PROVIDER_ID, "RAWG games query");
        let page: RawgPage = self.ctx.fetch.get_json(&url, &opts).await?;
        let items = n.normalize_page(
            PROVIDER_ID,
            ItemType::Game,
            page.results,
            |r: &RawgGame| Some(r.id.to_string()),
            map_game,
        );
        Ok(SearchResult::new(items, query.page, page_size, page.count, true))
    }

    async fn get_details(&self, external_id: &str, item_type: ItemType) -> Result<CanonicalDetails> {
        ensure_supported(self, item_type)?;
        if external_id.is_empty() || external_id.contains('/') {
            return Err(Error::invalid_input(format!("not a RAWG id: {external_id}")));
        }
        let opts = self.options()?;
        let id = ItemId::new(PROVIDER_ID, item_type, external_id);
        let mut details = CanonicalDetails::skeleton(id, item_type);

        if item_type == ItemType::Developer {
            let url = format!("{}/developers/{external_id}", self.base_url);
            let raw: RawgDeveloperDetail = self.ctx.fetch.get_json(&url, &opts).await?;
            details.title = Some(raw.name);
            details.description = raw.description.as_deref().map(strip_tags).filter(|d| !d.is_empty());
            details.image_url = non_empty(raw.image_background.as_deref());
            details.tags = raw.games_count.map(|n| format!("{n} games")).into_iter().collect();
            return Ok(details);
        }

        let url = format!("{}/games/{external_id}", self.base_url);
        let raw: RawgGameDetail = self.ctx.fetch.get_json(&url, &opts).await?;
        details.year = raw.released.as_deref().and_then(parse_year);
        details.image_url = pick_image([
            raw.background_image.as_deref(),
            raw.background_image_additional.as_deref(),
        ]);
        details.description = non_empty(raw.description_raw.as_deref());
        details.tags = raw
            .genres
            .iter()
            .chain(&raw.tags)
            .map(|t| t.name.clone())
            .collect();
        details.urls = non_empty(raw.website.as_deref())
            .map(|url| ExternalUrl {
                kind: "official homepage".to_string(),
                url,
            })
            .into_iter()
            .collect();
        if !raw.developers.is_empty() {
            let names: Vec<&str> = raw.developers.iter().map(|d| d.name.as_str()).collect();
            details.description = details
                .description
                .or_else(|| Some(format!("Developed by {}", names.join(", "))));
        }
        details.title = Some(raw.name);
        Ok(details)
    }
}
