mod cli;

use mediaforge::{config, engine::MediaEngine};
use mediaforge_common::{CanonicalDetails, Category, ItemId, SearchResult};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediaforge=trace,mediaforge_common=debug,reqwest=debug".to_string()
        } else {
            "mediaforge=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search {
            category,
            text,
            item_type,
            provider,
            page,
            page_size,
            sort,
            year_from,
            year_to,
            fuzzy,
            wildcard,
            filters,
            images,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let (engine, registry_path) = open_engine(cli.config.as_deref())?;
                let item_type = match item_type {
                    Some(t) => t,
                    None => engine
                        .providers()
                        .resolve(category, provider.as_deref())?
                        .supported_types()
                        .first()
                        .copied()
                        .context("provider serves no item types")?,
                };
                let query = cli::build_query(
                    item_type,
                    &text,
                    page,
                    page_size,
                    sort,
                    (year_from, year_to),
                    fuzzy,
                    wildcard,
                    filters,
                );
                if engine.query_config().is_empty_query(&query) {
                    eprintln!("{}", cli::empty_query_hint(engine.query_config()));
                }

                let mut result = engine
                    .search(category, provider.as_deref(), &query)
                    .await
                    .with_context(|| format!("search in {category} failed"))?;

                if images {
                    if let Some(waterfall) = engine.waterfall() {
                        waterfall.flush().await;
                    }
                    refresh_from_cache(&engine, &mut result);
                }

                print_search(&result, json)?;
                close_engine(&engine, registry_path.as_deref())
            })
        }
        Commands::Details {
            id,
            provider,
            lenient,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let (engine, registry_path) = open_engine(cli.config.as_deref())?;
                let id = ItemId::from(id);
                let category = id
                    .item_type()
                    .map(|t| t.category())
                    .with_context(|| format!("malformed item id '{id}'"))?;

                let details = if lenient {
                    engine
                        .get_details_or_skeleton(category, provider.as_deref(), &id)
                        .await?
                } else {
                    engine
                        .get_details(category, provider.as_deref(), &id)
                        .await
                        .with_context(|| format!("details for {id} failed"))?
                };
                print_details(&details, json)?;
                close_engine(&engine, registry_path.as_deref())
            })
        }
        Commands::Providers => list_providers(cli.config.as_deref()),
        Commands::ResolveImage { id } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let (engine, registry_path) = open_engine(cli.config.as_deref())?;
                match engine.resolve_image(&ItemId::from(id.as_str())).await? {
                    Some(url) => println!("{url}"),
                    None => println!("No image found for {id}"),
                }
                close_engine(&engine, registry_path.as_deref())
            })
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediaforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Build the engine and load the persisted registry, if any.
fn open_engine(config_path: Option<&Path>) -> Result<(MediaEngine, Option<PathBuf>)> {
    let config = config::load_config_or_default(config_path)?;
    let engine = MediaEngine::from_config(&config)?;

    let registry_path = config.cache.resolved_registry_path();
    if let Some(ref path) = registry_path {
        if let Err(e) = engine.registry().load_from_path(path) {
            tracing::warn!("Ignoring unreadable registry {:?}: {}", path, e);
        }
    }
    Ok((engine, registry_path))
}

/// Persist the registry for the next run.
fn close_engine(engine: &MediaEngine, registry_path: Option<&Path>) -> Result<()> {
    if let Some(path) = registry_path {
        engine
            .registry()
            .save_to_path(path)
            .with_context(|| format!("Failed to save registry to {:?}", path))?;
    }
    Ok(())
}

/// Pick up artwork that landed in the cache after the page was built.
fn refresh_from_cache(engine: &MediaEngine, result: &mut SearchResult) {
    for item in result.items.iter_mut() {
        if let Some(fresh) = engine.cache().get(&item.id) {
            *item = fresh;
        }
    }
}

fn print_search(result: &SearchResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if result.items.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for item in &result.items {
        print!("{}", item.title);
        if let Some(year) = item.year {
            print!(" ({})", year);
        }
        if let Some(ref subtitle) = item.subtitle {
            print!(" - {}", subtitle);
        }
        println!();
        println!("    {}", item.id);
        if let Some(ref image) = item.image_url {
            println!("    {}", image);
        }
    }
    println!(
        "\nPage {} of {} ({} results{})",
        result.page,
        result.total_pages,
        result.total_count,
        if result.server_sorted { "" } else { ", unsorted" }
    );
    Ok(())
}

fn print_details(details: &CanonicalDetails, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(details)?);
        return Ok(());
    }

    println!("{}", details.title.as_deref().unwrap_or("(unknown)"));
    println!("  Id: {}", details.id);
    println!("  Type: {}", details.item_type);
    if let Some(year) = details.year {
        println!("  Year: {}", year);
    }
    if let Some(ref image) = details.image_url {
        println!("  Image: {}", image);
    }
    if let Some(ref span) = details.life_span {
        println!(
            "  Active: {} - {}",
            span.begin.as_deref().unwrap_or("?"),
            span.end.as_deref().unwrap_or(if span.ended { "?" } else { "present" })
        );
    }
    if !details.tags.is_empty() {
        println!("  Tags: {}", details.tags.join(", "));
    }
    if let Some(ref description) = details.description {
        println!("\n{}", description);
    }
    if !details.tracklist.is_empty() {
        println!("\nTracks:");
        for track in &details.tracklist {
            print!("  {:>2}. {}", track.position, track.title);
            if let Some(ref length) = track.length {
                print!(" [{}]", length);
            }
            println!();
        }
    }
    for url in &details.urls {
        println!("  {}: {}", url.kind, url.url);
    }
    Ok(())
}

fn list_providers(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let engine = MediaEngine::from_config(&config)?;

    for category in Category::ALL {
        let default = engine.providers().default_for(category);
        println!("{}:", category);
        for provider in engine.providers().for_category(category) {
            let status = if provider.is_available() { "✓" } else { "✗" };
            let marker = if Some(provider.id()) == default { " (default)" } else { "" };
            let types: Vec<_> = provider.supported_types().iter().map(|t| t.as_str()).collect();
            println!(
                "  {} {} - {} [{}]{}",
                status,
                provider.id(),
                provider.label(),
                types.join(", "),
                marker
            );
        }
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, checking defaults");
            config::load_config_or_default(None)?
        }
    };

    let warnings = config::validate_config(&config)?;
    println!("✓ Configuration is valid");
    println!(
        "  Fetch: timeout {}s, {} retries, {}ms backoff",
        config.fetch.timeout_secs, config.fetch.max_retries, config.fetch.backoff_ms
    );
    println!("  Minimum query length: {}", config.query.min_query_len);
    println!(
        "  Registry: {} items at {:?}",
        config.cache.registry_capacity,
        config.cache.resolved_registry_path()
    );
    for (category, provider) in &config.providers.defaults {
        println!("  Default for {}: {}", category, provider);
    }
    for warning in warnings {
        println!("  ! {}", warning);
    }
    Ok(())
}
