use clap::{Parser, Subcommand};
use mediaforge::query::QueryConfig;
use mediaforge_common::search::filter_keys;
use mediaforge_common::{Category, FilterValue, ItemType, SearchQuery, SortOrder};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediaforge")]
#[command(author, version, about = "Search music, book, film and game catalogs")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search a category
    Search {
        /// music, books, films or games
        category: Category,

        /// Free text; may be empty when filters are given
        #[arg(default_value = "")]
        text: String,

        /// Item type (defaults to the provider's first type)
        #[arg(short = 't', long = "type")]
        item_type: Option<ItemType>,

        /// Provider id, overriding the category default
        #[arg(short, long)]
        provider: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        page_size: Option<u32>,

        /// relevance, title_asc, title_desc, year_asc, year_desc, rating_desc
        #[arg(long, default_value = "relevance")]
        sort: SortOrder,

        #[arg(long)]
        year_from: Option<i32>,

        #[arg(long)]
        year_to: Option<i32>,

        /// Approximate matching on every word
        #[arg(long)]
        fuzzy: bool,

        /// Prefix matching on the last word
        #[arg(long)]
        wildcard: bool,

        /// Extra filters as key=value, or key=min..max for ranges
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, FilterValue)>,

        /// Wait for artwork lookups before printing
        #[arg(long)]
        images: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show details for an item id (provider:type:external)
    Details {
        id: String,

        #[arg(short, long)]
        provider: Option<String>,

        /// Print the {id, type} skeleton instead of failing
        #[arg(long)]
        lenient: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List providers and their availability
    Providers,

    /// Run the artwork waterfall for a MusicBrainz artist or album id
    ResolveImage { id: String },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Parse `key=value` or `key=min..max` (either bound may be empty).
///
/// Artist and platform values are references to upstream ids; everything
/// else is an enumerated value.
pub fn parse_filter(raw: &str) -> Result<(String, FilterValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return Err(format!("expected key=value, got '{raw}'"));
    }

    if let Some((min, max)) = value.split_once("..") {
        let bound = |s: &str| -> Result<Option<i64>, String> {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(|_| format!("invalid range bound '{s}'"))
            }
        };
        return Ok((key.to_string(), FilterValue::range(bound(min)?, bound(max)?)));
    }

    let filter = match key {
        filter_keys::ARTIST | filter_keys::PLATFORM => FilterValue::reference(value),
        _ => FilterValue::enumerated(value),
    };
    Ok((key.to_string(), filter))
}

/// Assemble the query from `search` arguments.
#[allow(clippy::too_many_arguments)]
pub fn build_query(
    item_type: ItemType,
    text: &str,
    page: u32,
    page_size: Option<u32>,
    sort: SortOrder,
    years: (Option<i32>, Option<i32>),
    fuzzy: bool,
    wildcard: bool,
    filters: Vec<(String, FilterValue)>,
) -> SearchQuery {
    let mut query = SearchQuery::new(item_type, text)
        .with_page(page)
        .with_sort(sort)
        .with_fuzzy(fuzzy)
        .with_wildcard(wildcard);
    if let Some(size) = page_size {
        query = query.with_page_size(size);
    }
    if years.0.is_some() || years.1.is_some() {
        query = query.with_years(years.0, years.1);
    }
    for (key, value) in filters {
        query = query.with_filter(key, value);
    }
    query
}

/// Short hint shown when a query would be answered without a request.
pub fn empty_query_hint(config: &QueryConfig) -> String {
    format!(
        "Nothing to search for: enter at least {} characters or a filter.",
        config.min_query_len.max(1)
    )
}
