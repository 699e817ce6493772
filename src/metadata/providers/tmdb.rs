//! TMDB (The Movie Database) metadata provider.
//!
//! Implements [`MetadataProvider`] against the TMDB v3 REST API:
//! - `/search/{movie,tv,person}` when there is free text. These endpoints
//!   rank by relevance and ignore any requested ordering.
//! - `/discover/{movie,tv}` when only filters are present; discover honours
//!   `sort_by`, so results come back server-sorted.
//!
//! TMDB pages are a fixed 20 results. Requests are throttled to 4/s.

use async_trait::async_trait;
use mediaforge_common::search::filter_keys;
use mediaforge_common::{
    CanonicalDetails, CanonicalItem, Category, Error, ExternalUrl, FilterValue, ItemId, ItemType,
    LifeSpan, Result, SearchQuery, SearchResult, SortOrder,
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

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const PROVIDER_ID: &str = "tmdb";
pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w342";
const TMDB_PAGE_SIZE: u32 = 20;
const DEFAULT_RATE_LIMIT: u32 = 4;
const DEFAULT_LANGUAGE: &str = "en-US";
const SUPPORTED: &[ItemType] = &[ItemType::Movie, ItemType::Show, ItemType::Person];

// ---------------------------------------------------------------------------
// TMDB API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TmdbPage {
    #[serde(default)]
    total_results: u64,
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieResult {
    id: u64,
    title: String,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    backdrop_path: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    vote_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvResult {
    id: u64,
    name: String,
    #[serde(default)]
    first_air_date: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    backdrop_path: Option<String>,
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    vote_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TmdbPersonResult {
    id: u64,
    name: String,
    #[serde(default)]
    known_for_department: Option<String>,
    #[serde(default)]
    profile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct TmdbExternalIds {
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    wikidata_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetail {
    title: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetail {
    name: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    first_air_date: Option<String>,
    #[serde(default)]
    last_air_date: Option<String>,
    #[serde(default)]
    in_production: Option<bool>,
    #[serde(default)]
    poster_path: Option<String>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    external_ids: Option<TmdbExternalIds>,
}

#[derive(Debug, Deserialize)]
struct TmdbPersonDetail {
    name: String,
    #[serde(default)]
    biography: Option<String>,
    #[serde(default)]
    birthday: Option<String>,
    #[serde(default)]
    deathday: Option<String>,
    #[serde(default)]
    profile_path: Option<String>,
    #[serde(default)]
    known_for_department: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    external_ids: Option<TmdbExternalIds>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Convert a TMDB image path fragment to a full URL.
fn image_url(path: &str) -> String {
    format!("{TMDB_IMAGE_BASE}{path}")
}

fn tmdb_image(path: &Option<String>) -> Option<String> {
    non_empty(path.as_deref()).map(|p| image_url(&p))
}

fn map_movie(raw: &TmdbMovieResult) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Movie, raw.id.to_string(), &raw.title);
    item.year = raw.release_date.as_deref().and_then(parse_year);
    item.image_url = pick_image([tmdb_image(&raw.poster_path), tmdb_image(&raw.backdrop_path)]);
    item.rating = raw.vote_average;
    item.review_count = raw.vote_count;
    Ok(item)
}

fn map_show(raw: &TmdbTvResult) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Show, raw.id.to_string(), &raw.name);
    item.year = raw.first_air_date.as_deref().and_then(parse_year);
    item.image_url = pick_image([tmdb_image(&raw.poster_path), tmdb_image(&raw.backdrop_path)]);
    item.rating = raw.vote_average;
    item.review_count = raw.vote_count;
    Ok(item)
}

fn map_person(raw: &TmdbPersonResult) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Person, raw.id.to_string(), &raw.name);
    item.subtitle = non_empty(raw.known_for_department.as_deref());
    item.image_url = tmdb_image(&raw.profile_path);
    Ok(item)
}

fn external_urls(homepage: &Option<String>, ids: &Option<TmdbExternalIds>, imdb_kind: &str) -> Vec<ExternalUrl> {
    let mut urls = Vec::new();
    if let Some(home) = non_empty(homepage.as_deref()) {
        urls.push(ExternalUrl {
            kind: "official homepage".to_string(),
            url: home,
        });
    }
    if let Some(ids) = ids {
        if let Some(imdb) = non_empty(ids.imdb_id.as_deref()) {
            urls.push(ExternalUrl {
                kind: "imdb".to_string(),
                url: format!("https://www.imdb.com/{imdb_kind}/{imdb}/"),
            });
        }
        if let Some(wd) = non_empty(ids.wikidata_id.as_deref()) {
            urls.push(ExternalUrl {
                kind: "wikidata".to_string(),
                url: format!("https://www.wikidata.org/wiki/{wd}"),
            });
        }
    }
    urls
}

/// `sort_by` value for discover, by media kind.
fn discover_sort(sort: SortOrder, item_type: ItemType) -> &'static str {
    let movie = item_type == ItemType::Movie;
    match sort {
        SortOrder::Relevance => "popularity.desc",
        SortOrder::TitleAsc if movie => "title.asc",
        SortOrder::TitleAsc => "name.asc",
        SortOrder::TitleDesc if movie => "title.desc",
        SortOrder::TitleDesc => "name.desc",
        SortOrder::YearAsc if movie => "primary_release_date.asc",
        SortOrder::YearAsc => "first_air_date.asc",
        SortOrder::YearDesc if movie => "primary_release_date.desc",
        SortOrder::YearDesc => "first_air_date.desc",
        SortOrder::RatingDesc => "vote_average.desc",
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// TMDB metadata provider.
///
/// # Examples
///
/// ```rust,ignore
/// use mediaforge::metadata::providers::TmdbProvider;
///
/// let provider = TmdbProvider::new(ctx, &config.providers.tmdb);
/// ```
pub struct TmdbProvider {
    ctx: ProviderContext,
    base_url: String,
    api_key: Option<String>,
    language: String,
}

impl TmdbProvider {
    pub fn new(mut ctx: ProviderContext, settings: &ProviderSettings) -> Self {
        ctx.fetch = settings.throttle(&ctx.fetch, DEFAULT_RATE_LIMIT);
        Self {
            ctx,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            api_key: settings.api_key.clone(),
            language: settings
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        }
    }

    /// Base options carrying the API key and language.
    fn options(&self) -> Result<FetchOptions> {
        let key = require_credential(&self.api_key, PROVIDER_ID, "API key")?;
        Ok(FetchOptions::new()
            .query("api_key", key)
            .query("language", self.language.as_str()))
    }

    fn path_for(item_type: ItemType) -> &'static str {
        match item_type {
            ItemType::Movie => "movie",
            ItemType::Show => "tv",
            _ => "person",
        }
    }

    /// Add `/search` parameters. Only a single-year range maps onto TMDB's
    /// year parameters; wider ranges are enforced by the caller.
    fn search_options(&self, query: &SearchQuery, text: &str) -> Result<FetchOptions> {
        let mut opts = self
            .options()?
            .query("query", text)
            .query("page", query.page.to_string());
        if let Some((Some(min), Some(max))) = query.year_range() {
            if min == max {
                let key = match query.item_type {
                    ItemType::Movie => Some("primary_release_year"),
                    ItemType::Show => Some("first_air_date_year"),
                    _ => None,
                };
                if let Some(key) = key {
                    opts = opts.query(key, min.to_string());
                }
            }
        }
        Ok(opts)
    }

    fn discover_options(&self, query: &SearchQuery) -> Result<FetchOptions> {
        let mut opts = self
            .options()?
            .query("page", query.page.to_string())
            .query("sort_by", discover_sort(query.sort, query.item_type));
        let date_field = match query.item_type {
            ItemType::Movie => "primary_release_date",
            _ => "first_air_date",
        };
        if let Some((min, max)) = query.year_range() {
            if let Some(min) = min {
                opts = opts.query(format!("{date_field}.gte"), format!("{min}-01-01"));
            }
            if let Some(max) = max {
                opts = opts.query(format!("{date_field}.lte"), format!("{max}-12-31"));
            }
        }
        if let Some(FilterValue::Reference { id } | FilterValue::Enum { value: id }) =
            query.filter(filter_keys::GENRE)
        {
            opts = opts.query("with_genres", id.trim());
        }
        if let Some(FilterValue::Reference { id }) = query.filter(filter_keys::ARTIST) {
            if query.item_type == ItemType::Movie {
                opts = opts.query("with_people", id.trim());
            }
        }
        Ok(opts)
    }

    fn normalize(&self, item_type: ItemType, results: Vec<Value>) -> Vec<std::sync::Arc<CanonicalItem>> {
        let n = &self.ctx.normalizer;
        match item_type {
            ItemType::Movie => n.normalize_page(
                PROVIDER_ID,
                item_type,
                results,
                |r: &TmdbMovieResult| Some(r.id.to_string()),
                map_movie,
            ),
            ItemType::Show => n.normalize_page(
                PROVIDER_ID,
                item_type,
                results,
                |r: &TmdbTvResult| Some(r.id.to_string()),
                map_show,
            ),
            _ => n.normalize_page(
                PROVIDER_ID,
                item_type,
                results,
                |r: &TmdbPersonResult| Some(r.id.to_string()),
                map_person,
            ),
        }
    }

    async fn movie_details(&self, id: &str) -> Result<CanonicalDetails> {
        let url = format!("{}/movie/{id}", self.base_url);
        let opts = self.options()?.query("append_to_response", "external_ids");
        let raw: TmdbMovieDetail = self.ctx.fetch.get_json(&url, &opts).await?;

        let mut details =
            CanonicalDetails::skeleton(ItemId::new(PROVIDER_ID, ItemType::Movie, id), ItemType::Movie);
        details.year = raw.release_date.as_deref().and_then(parse_year);
        details.image_url = tmdb_image(&raw.poster_path);
        details.description = non_empty(raw.overview.as_deref());
        details.tags = raw.genres.into_iter().map(|g| g.name).collect();
        details.urls = external_urls(&raw.homepage, &raw.external_ids, "title");
        details.title = Some(raw.title);
        Ok(details)
    }

    async fn show_details(&self, id: &str) -> Result<CanonicalDetails> {
        let url = format!("{}/tv/{id}", self.base_url);
        let opts = self.options()?.query("append_to_response", "external_ids");
        let raw: TmdbTvDetail = self.ctx.fetch.get_json(&url, &opts).await?;

        let mut details =
            CanonicalDetails::skeleton(ItemId::new(PROVIDER_ID, ItemType::Show, id), ItemType::Show);
        details.year = raw.first_air_date.as_deref().and_then(parse_year);
        details.image_url = tmdb_image(&raw.poster_path);
        details.description = non_empty(raw.overview.as_deref());
        details.urls = external_urls(&raw.homepage, &raw.external_ids, "title");
        details.tags = raw.genres.into_iter().map(|g| g.name).collect();
        let ended = raw.in_production == Some(false);
        details.life_span = Some(LifeSpan {
            begin: raw.first_air_date,
            end: if ended { raw.last_air_date } else { None },
            ended,
        });
        details.title = Some(raw.name);
        Ok(details)
    }

    async fn person_details(&self, id: &str) -> Result<CanonicalDetails> {
        let url = format!("{}/person/{id}", self.base_url);
        let opts = self.options()?.query("append_to_response", "external_ids");
        let raw: TmdbPersonDetail = self.ctx.fetch.get_json(&url, &opts).await?;

        let mut details = CanonicalDetails::skeleton(
            ItemId::new(PROVIDER_ID, ItemType::Person, id),
            ItemType::Person,
        );
        details.year = raw.birthday.as_deref().and_then(parse_year);
        details.image_url = tmdb_image(&raw.profile_path);
        details.description = non_empty(raw.biography.as_deref());
        details.tags = raw.known_for_department.into_iter().collect();
        details.urls = external_urls(&raw.homepage, &raw.external_ids, "name");
        if raw.birthday.is_some() || raw.deathday.is_some() {
            details.life_span = Some(LifeSpan {
                ended: raw.deathday.is_some(),
                begin: raw.birthday,
                end: raw.deathday,
            });
        }
        details.title = Some(raw.name);
        Ok(details)
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn label(&self) -> &'static str {
        "TMDB"
    }

    fn category(&self) -> Category {
        Category::Films
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

        let path = Self::path_for(query.item_type);
        let (url, opts, server_sorted) = match self.ctx.query.effective_text(&query.free_text) {
            Some(text) => (
                format!("{}/search/{path}", self.base_url),
                self.search_options(query, text)?,
                relevance_only(query.sort),
            ),
            None if query.item_type == ItemType::Person => {
                // credentials are still required even when nothing is fetched
                self.options()?;
                debug!(provider = PROVIDER_ID, "People cannot be browsed by filter alone");
                return Ok(SearchResult::empty(query.page));
            }
            None => (
                format!("{}/discover/{path}", self.base_url),
                self.discover_options(query)?,
                true,
            ),
        };

        debug!(provider = PROVIDER_ID, url = %url, "TMDB search");
        let page: TmdbPage = self.ctx.fetch.get_json(&url, &opts).await?;
        let items = self.normalize(query.item_type, page.results);

        Ok(SearchResult::new(
            items,
            query.page,
            TMDB_PAGE_SIZE,
            page.total_results,
            server_sorted,
        ))
    }

    async fn get_details(&self, external_id: &str, item_type: ItemType) -> Result<CanonicalDetails> {
        ensure_supported(self, item_type)?;
        if external_id.parse::<u64>().is_err() {
            return Err(Error::invalid_input(format!("not a TMDB id: {external_id}")));
        }
        match item_type {
            ItemType::Movie => self.movie_details(external_id).await,
            ItemType::Show => self.show_details(external_id).await,
            _ => self.person_details(external_id).await,
        }
    }
}
