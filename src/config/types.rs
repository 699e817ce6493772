use mediaforge_common::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::{FetchClient, RetryPolicy, DEFAULT_USER_AGENT};

pub use crate::query::QueryConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for 429/503/504 and network errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit; retry n waits n * backoff_ms
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// User-Agent header (MusicBrainz rejects anonymous clients)
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    1000
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            user_agent: None,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn build_client(&self) -> FetchClient {
        let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        FetchClient::new(self.retry_policy(), self.timeout(), user_agent)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Lifetime of a normalized item in the in-memory cache
    #[serde(default = "default_item_ttl_secs")]
    pub item_ttl_secs: u64,

    #[serde(default = "default_item_capacity")]
    pub item_capacity: usize,

    /// Hard cap of the persistent registry (FIFO beyond it)
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,

    /// Where the registry is persisted between runs (`~` is expanded)
    #[serde(default = "default_registry_path")]
    pub registry_path: Option<PathBuf>,
}

fn default_item_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_item_capacity() -> usize {
    crate::cache::item_cache::DEFAULT_CAPACITY
}
fn default_registry_capacity() -> usize {
    crate::cache::item_registry::DEFAULT_REGISTRY_CAPACITY
}
fn default_registry_path() -> Option<PathBuf> {
    Some(PathBuf::from("~/.cache/mediaforge/registry.json"))
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            item_ttl_secs: default_item_ttl_secs(),
            item_capacity: default_item_capacity(),
            registry_capacity: default_registry_capacity(),
            registry_path: default_registry_path(),
        }
    }
}

impl CacheConfig {
    pub fn item_ttl(&self) -> Duration {
        Duration::from_secs(self.item_ttl_secs)
    }

    /// The registry path with `~` and environment variables expanded.
    pub fn resolved_registry_path(&self) -> Option<PathBuf> {
        self.registry_path.as_ref().map(|p| {
            let raw = p.to_string_lossy();
            let expanded = shellexpand::full(&raw)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| shellexpand::tilde(&raw).into_owned());
            PathBuf::from(expanded)
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Quiet period before a typed query is sent upstream
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Speculatively fetch page N+1 after delivering page N
    #[serde(default = "default_true")]
    pub prefetch: bool,

    /// How long a prefetched page stays usable
    #[serde(default = "default_prefetch_ttl_secs")]
    pub prefetch_ttl_secs: u64,
}

fn default_debounce_ms() -> u64 {
    300
}
fn default_prefetch_ttl_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            prefetch: true,
            prefetch_ttl_secs: default_prefetch_ttl_secs(),
        }
    }
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn prefetch_ttl(&self) -> Duration {
        Duration::from_secs(self.prefetch_ttl_secs)
    }
}

/// Settings shared by every upstream; each provider reads what it needs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderSettings {
    /// Override the upstream root URL (used for mirrors and tests)
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    /// Politeness throttle; 0 disables, unset uses the provider default
    #[serde(default)]
    pub rate_limit_per_second: Option<u32>,

    /// Preferred response language, e.g. "en-US"
    #[serde(default)]
    pub language: Option<String>,
}

impl ProviderSettings {
    /// Configured base URL without a trailing slash, or `default`.
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    /// A clone of `fetch` throttled to this provider's rate.
    pub fn throttle(&self, fetch: &FetchClient, default_per_second: u32) -> FetchClient {
        let rate = self.rate_limit_per_second.unwrap_or(default_per_second);
        fetch.clone().with_rate_limit(rate)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub musicbrainz: ProviderSettings,

    #[serde(default)]
    pub openlibrary: ProviderSettings,

    #[serde(default)]
    pub tmdb: ProviderSettings,

    #[serde(default)]
    pub rawg: ProviderSettings,

    #[serde(default)]
    pub igdb: ProviderSettings,

    /// Image source A
    #[serde(default)]
    pub fanart: ProviderSettings,

    /// Image source B
    #[serde(default)]
    pub wikidata: ProviderSettings,

    /// Image source C
    #[serde(default)]
    pub coverart: ProviderSettings,

    /// Per-category default provider overrides, e.g. `games = "igdb"`
    #[serde(default)]
    pub defaults: BTreeMap<Category, String>,
}
