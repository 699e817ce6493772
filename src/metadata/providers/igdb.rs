//! IGDB provider (games and companies) over the apicalypse POST API.
//!
//! Every call needs a Twitch client id and app access token. Result counts
//! come from the sibling `/count` endpoint with the same filters.

use async_trait::async_trait;
use mediaforge_common::{
    CanonicalDetails, CanonicalItem, Category, Error, ExternalUrl, ItemId, ItemType, Result,
    SearchQuery, SearchResult,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::fetch::FetchOptions;
use crate::metadata::normalize::non_empty;
use crate::metadata::provider::{
    ensure_supported, require_credential, MetadataProvider, ProviderContext,
};
use crate::query::{IgdbQuery, IgdbTarget};

pub const PROVIDER_ID: &str = "igdb";
pub const DEFAULT_BASE_URL: &str = "https://api.igdb.com/v4";
const IMAGE_BASE: &str = "https://images.igdb.com/igdb/image/upload";
const DEFAULT_RATE_LIMIT: u32 = 4;
const MAX_PAGE_SIZE: u32 = 500;
const SUPPORTED: &[ItemType] = &[ItemType::Game, ItemType::Developer];

const GAMES: IgdbTarget = IgdbTarget {
    fields: "name,first_release_date,cover.image_id,total_rating,total_rating_count,involved_companies.company.name,involved_companies.developer",
    date_field: "first_release_date",
    rating_field: Some("total_rating"),
    relational_filters: true,
};

const COMPANIES: IgdbTarget = IgdbTarget {
    fields: "name,start_date,logo.image_id,country",
    date_field: "start_date",
    rating_field: None,
    relational_filters: false,
};

#[derive(Debug, Deserialize)]
struct IgdbCount {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct IgdbImage {
    image_id: String,
}

#[derive(Debug, Deserialize)]
struct IgdbNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct IgdbInvolvedCompany {
    #[serde(default)]
    company: Option<IgdbNamed>,
    #[serde(default)]
    developer: bool,
}

#[derive(Debug, Deserialize)]
struct IgdbWebsite {
    url: String,
}

#[derive(Debug, Deserialize)]
struct IgdbGame {
    id: u64,
    name: String,
    #[serde(default)]
    first_release_date: Option<i64>,
    #[serde(default)]
    cover: Option<IgdbImage>,
    #[serde(default)]
    total_rating: Option<f64>,
    #[serde(default)]
    total_rating_count: Option<u64>,
    #[serde(default)]
    involved_companies: Vec<IgdbInvolvedCompany>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    storyline: Option<String>,
    #[serde(default)]
    genres: Vec<IgdbNamed>,
    #[serde(default)]
    themes: Vec<IgdbNamed>,
    #[serde(default)]
    websites: Vec<IgdbWebsite>,
}

#[derive(Debug, Deserialize)]
struct IgdbCompany {
    id: u64,
    name: String,
    #[serde(default)]
    start_date: Option<i64>,
    #[serde(default)]
    logo: Option<IgdbImage>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    websites: Vec<IgdbWebsite>,
}

/// Year of a unix timestamp (UTC).
fn year_of(ts: i64) -> Option<i32> {
    use chrono::Datelike;
    chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.year())
}

fn image(size: &str, img: &Option<IgdbImage>) -> Option<String> {
    img.as_ref()
        .and_then(|i| non_empty(Some(&i.image_id)))
        .map(|id| format!("{IMAGE_BASE}/{size}/{id}.jpg"))
}

fn developer_line(companies: &[IgdbInvolvedCompany]) -> Option<String> {
    let names: Vec<&str> = companies
        .iter()
        .filter(|c| c.developer)
        .filter_map(|c| c.company.as_ref().map(|n| n.name.as_str()))
        .collect();
    non_empty(Some(&names.join(", ")))
}

fn map_game(raw: &IgdbGame) -> Result<CanonicalItem> {
    let mut item = CanonicalItem::new(PROVIDER_ID, ItemType::Game, raw.id.to_string(), &raw.name);
    item.year = raw.first_release_date.and_then(year_of);
    item.image_url = image("t_cover_big", &raw.cover);
    item.subtitle = developer_line(&raw.involved_companies);
    item.rating = raw.total_rating;
    item.review_count = raw.total_rating_count;
    Ok(item)
}

fn map_company(raw: &IgdbCompany) -> Result<CanonicalItem> {
    let mut item =
        CanonicalItem::new(PROVIDER_ID, ItemType::Developer, raw.id.to_string(), &raw.name);
    item.year = raw.start_date.and_then(year_of);
    item.image_url = image("t_logo_med", &raw.logo);
    Ok(item)
}

fn websites(sites: &[IgdbWebsite]) -> Vec<ExternalUrl> {
    sites
        .iter()
        .map(|w| ExternalUrl {
            kind: "website".to_string(),
            url: w.url.clone(),
        })
        .collect()
}

/// IGDB games database provider.
pub struct IgdbProvider {
    ctx: ProviderContext,
    base_url: String,
    client_id: Option<String>,
    access_token: Option<String>,
}

impl IgdbProvider {
    pub fn new(mut ctx: ProviderContext, settings: &ProviderSettings) -> Self {
        ctx.fetch = settings.throttle(&ctx.fetch, DEFAULT_RATE_LIMIT);
        Self {
            ctx,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
            client_id: settings.client_id.clone(),
            access_token: settings.access_token.clone(),
        }
    }

    fn options(&self) -> Result<FetchOptions> {
        let client_id = require_credential(&self.client_id, PROVIDER_ID, "client id")?;
        let token = require_credential(&self.access_token, PROVIDER_ID, "access token")?;
        Ok(FetchOptions::new()
            .header("Client-ID", client_id)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/json"))
    }

    fn endpoint(item_type: ItemType) -> (&'static str, IgdbTarget) {
        match item_type {
            ItemType::Developer => ("companies", COMPANIES),
            _ => ("games", GAMES),
        }
    }
}

#[async_trait]
impl MetadataProvider for IgdbProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn label(&self) -> &'static str {
        "IGDB"
    }

    fn category(&self) -> Category {
        Category::Games
    }

    fn supported_types(&self) -> &'static [ItemType] {
        SUPPORTED
    }

    fn is_available(&self) -> bool {
        self.options().is_ok()
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        ensure_supported(self, query.item_type)?;
        let opts = self.options()?;

        let (endpoint, target) = Self::endpoint(query.item_type);
        let mut capped = query.clone();
        capped.page_size = query.page_size.min(MAX_PAGE_SIZE);
        let Some(igdb) = IgdbQuery::build(&capped, &self.ctx.query, target) else {
            debug!(provider = PROVIDER_ID, "Empty query, short-circuiting");
            return Ok(SearchResult::empty(query.page));
        };

        let url = format!("{}/{endpoint}", self.base_url);
        let body = igdb.render();
        debug!(provider = PROVIDER_ID, body = %body, "IGDB query");
        let raws: Vec<Value> = self.ctx.fetch.post_json(&url, &body, &opts).await?;

        let count_url = format!("{url}/count");
        let count: IgdbCount = self
            .ctx
            .fetch
            .post_json(&count_url, &igdb.render_count(), &opts)
            .await?;

        let n = &self.ctx.normalizer;
        let items = match query.item_type {
            ItemType::Developer => n.normalize_page(
                PROVIDER_ID,
                ItemType::Developer,
                raws,
                |r: &IgdbCompany| Some(r.id.to_string()),
                map_company,
            ),
            _ => n.normalize_page(
                PROVIDER_ID,
                ItemType::Game,
                raws,
                |r: &IgdbGame| Some(r.id.to_string()),
                map_game,
            ),
        };

        Ok(SearchResult::new(
            items,
            query.page,
            capped.page_size,
            count.count,
            igdb.is_server_sorted(query.sort),
        ))
    }

    async fn get_details(&self, external_id: &str, item_type: ItemType) -> Result<CanonicalDetails> {
        ensure_supported(self, item_type)?;
        let opts = self.options()?;
        let numeric: u64 = external_id
            .parse()
            .map_err(|_| Error::invalid_input(format!("not an IGDB id: {external_id}")))?;
        let id = ItemId::new(PROVIDER_ID, item_type, external_id);
        let mut details = CanonicalDetails::skeleton(id, item_type);

        if item_type == ItemType::Developer {
            let body = format!(
                "fields name,description,start_date,logo.image_id,websites.url; where id = {numeric};"
            );
            let url = format!("{}/companies", self.base_url);
            let mut found: Vec<IgdbCompany> = self.ctx.fetch.post_json(&url, &body, &opts).await?;
            if found.is_empty() {
                return Err(Error::not_found("igdb company", external_id));
            }
            let raw = found.swap_remove(0);
            details.year = raw.start_date.and_then(year_of);
            details.image_url = image("t_logo_med", &raw.logo);
            details.description = non_empty(raw.description.as_deref());
            details.urls = websites(&raw.websites);
            details.title = Some(raw.name);
            return Ok(details);
        }

        let body = format!(
            "fields name,summary,storyline,first_release_date,cover.image_id,genres.name,themes.name,websites.url,involved_companies.company.name,involved_companies.developer; where id = {numeric};"
        );
        let url = format!("{}/games", self.base_url);
        let mut found: Vec<IgdbGame> = self.ctx.fetch.post_json(&url, &body, &opts).await?;
        if found.is_empty() {
            return Err(Error::not_found("igdb game", external_id));
        }
        let raw = found.swap_remove(0);
        details.year = raw.first_release_date.and_then(year_of);
        details.image_url = image("t_cover_big", &raw.cover);
        details.description = non_empty(raw.summary.as_deref())
            .or_else(|| non_empty(raw.storyline.as_deref()))
            .or_else(|| developer_line(&raw.involved_companies));
        details.tags = raw
            .genres
            .iter()
            .chain(&raw.themes)
            .map(|g| g.name.clone())
            .collect();
        details.urls = websites(&raw.websites);
        details.title = Some(raw.name);
        Ok(details)
    }
}
