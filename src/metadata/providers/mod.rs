//! Concrete metadata provider implementations.
//!
//! Each submodule wraps a single external API and implements the
//! [`MetadataProvider`](super::MetadataProvider) trait.

pub mod igdb;
pub mod musicbrainz;
pub mod openlibrary;
pub mod rawg;
pub mod tmdb;

use std::sync::Arc;

use mediaforge_common::{Error, Result};
use tracing::info;

pub use igdb::IgdbProvider;
pub use musicbrainz::MusicBrainzProvider;
pub use openlibrary::OpenLibraryProvider;
pub use rawg::RawgProvider;
pub use tmdb::TmdbProvider;

use super::provider::ProviderContext;
use super::registry::ProviderRegistry;
use crate::config::ProvidersConfig;
use crate::fetch::FetchClient;

/// Build a registry holding every bundled provider.
///
/// Registration order sets the category defaults: MusicBrainz for music,
/// Open Library for books, TMDB for films and RAWG for games. Overrides
/// from `[providers.defaults]` are applied afterwards.
///
/// `musicbrainz` is the shared client from [`musicbrainz::client`].
pub fn build_registry(
    ctx: &ProviderContext,
    musicbrainz: &FetchClient,
    config: &ProvidersConfig,
) -> Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MusicBrainzProvider::new(
        ctx.clone(),
        musicbrainz.clone(),
        &config.musicbrainz,
    )));
    registry.register(Arc::new(OpenLibraryProvider::new(ctx.clone(), &config.openlibrary)));
    registry.register(Arc::new(TmdbProvider::new(ctx.clone(), &config.tmdb)));
    registry.register(Arc::new(RawgProvider::new(ctx.clone(), &config.rawg)));
    registry.register(Arc::new(IgdbProvider::new(ctx.clone(), &config.igdb)));

    for (category, provider_id) in &config.defaults {
        let provider = registry.get(provider_id).ok_or_else(|| {
            Error::config(format!("unknown default provider '{provider_id}' for {category}"))
        })?;
        if provider.category() != *category {
            return Err(Error::config(format!(
                "provider '{provider_id}' serves {}, not {category}",
                provider.category()
            )));
        }
        registry.set_default(provider_id)?;
        info!(category = %category, provider = %provider_id, "Default provider overridden");
    }

    for provider in registry.all() {
        if !provider.is_available() {
            info!(provider = provider.id(), "Provider is missing credentials and will be unavailable");
        }
    }

    Ok(registry)
}
