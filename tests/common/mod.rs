//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which starts a wiremock [`MockServer`] and
//! builds a [`MediaEngine`] whose every upstream points at it. Retries back
//! off in milliseconds and rate limits are disabled so tests stay fast.

#![allow(dead_code)]

use std::sync::Arc;

use mediaforge::cache::{ItemCache, ItemRegistry};
use mediaforge::config::{Config, ProviderSettings};
use mediaforge::engine::MediaEngine;
use mediaforge::metadata::providers::{build_registry, musicbrainz};
use mediaforge::metadata::{Normalizer, ProviderContext};
use wiremock::MockServer;

pub struct TestHarness {
    pub server: MockServer,
    pub config: Config,
    pub engine: MediaEngine,
}

fn mocked(uri: &str) -> ProviderSettings {
    ProviderSettings {
        base_url: Some(uri.to_string()),
        rate_limit_per_second: Some(0),
        ..ProviderSettings::default()
    }
}

/// A config pointing every provider and image source at `uri`.
pub fn test_config(uri: &str) -> Config {
    let mut config = Config::default();
    config.fetch.backoff_ms = 5;
    config.fetch.timeout_secs = 5;
    config.cache.registry_path = None;

    let p = &mut config.providers;
    p.musicbrainz = mocked(uri);
    p.openlibrary = mocked(uri);
    p.tmdb = ProviderSettings {
        api_key: Some("tmdb-key".into()),
        ..mocked(uri)
    };
    p.rawg = ProviderSettings {
        api_key: Some("rawg-key".into()),
        ..mocked(uri)
    };
    p.igdb = ProviderSettings {
        client_id: Some("igdb-client".into()),
        access_token: Some("igdb-token".into()),
        ..mocked(uri)
    };
    p.fanart = ProviderSettings {
        api_key: Some("fanart-key".into()),
        ..mocked(uri)
    };
    p.wikidata = mocked(uri);
    p.coverart = mocked(uri);
    config
}

impl TestHarness {
    /// Engine with every bundled provider and the image waterfall.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`new`](Self::new), with `edit` applied to the config first.
    pub async fn with_config(edit: impl FnOnce(&mut Config)) -> Self {
        let server = MockServer::start().await;
        let mut config = test_config(&server.uri());
        edit(&mut config);
        let engine = MediaEngine::from_config(&config).expect("engine from config");
        Self {
            server,
            config,
            engine,
        }
    }

    /// Engine without image enrichment, for tests that count requests.
    pub async fn without_images() -> Self {
        let server = MockServer::start().await;
        let config = test_config(&server.uri());

        let cache = Arc::new(ItemCache::new(
            config.cache.item_capacity,
            config.cache.item_ttl(),
        ));
        let ctx = ProviderContext {
            fetch: config.fetch.build_client(),
            normalizer: Normalizer::new(Arc::clone(&cache)),
            query: config.query.clone(),
        };
        let mb = musicbrainz::client(&ctx.fetch, &config.providers.musicbrainz);
        let providers = build_registry(&ctx, &mb, &config.providers).expect("provider registry");
        let engine = MediaEngine::new(
            providers,
            cache,
            Arc::new(ItemRegistry::new(config.cache.registry_capacity)),
            config.query.clone(),
        );
        Self {
            server,
            config,
            engine,
        }
    }
}
