mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Providers that can be named in `[providers.defaults]`.
const KNOWN_PROVIDERS: &[&str] = &["musicbrainz", "openlibrary", "tmdb", "rawg", "igdb"];

/// Environment variables that override credentials from the file.
const ENV_OVERRIDES: &[(&str, Credential)] = &[
    ("MEDIAFORGE_TMDB_API_KEY", Credential::TmdbKey),
    ("MEDIAFORGE_RAWG_API_KEY", Credential::RawgKey),
    ("MEDIAFORGE_IGDB_CLIENT_ID", Credential::IgdbClientId),
    ("MEDIAFORGE_IGDB_ACCESS_TOKEN", Credential::IgdbToken),
    ("MEDIAFORGE_FANART_API_KEY", Credential::FanartKey),
];

#[derive(Clone, Copy)]
enum Credential {
    TmdbKey,
    RawgKey,
    IgdbClientId,
    IgdbToken,
    FanartKey,
}

impl Credential {
    fn slot<'a>(&self, providers: &'a mut ProvidersConfig) -> &'a mut Option<String> {
        match self {
            Self::TmdbKey => &mut providers.tmdb.api_key,
            Self::RawgKey => &mut providers.rawg.api_key,
            Self::IgdbClientId => &mut providers.igdb.client_id,
            Self::IgdbToken => &mut providers.igdb.access_token,
            Self::FanartKey => &mut providers.fanart.api_key,
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config);
    for warning in validate_config(&config)? {
        tracing::warn!("{}", warning);
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./mediaforge.toml", "~/.config/mediaforge/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Replace credentials with non-empty values from the environment.
pub fn apply_env_overrides(config: &mut Config) {
    for (var, credential) in ENV_OVERRIDES {
        if let Ok(value) = std::env::var(var) {
            let value = value.trim();
            if !value.is_empty() {
                *credential.slot(&mut config.providers) = Some(value.to_string());
            }
        }
    }
}

fn missing(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Check a configuration.
///
/// Settings that make the engine unusable are errors. Missing optional
/// credentials come back as warnings, since the rest still works.
pub fn validate_config(config: &Config) -> Result<Vec<String>> {
    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs cannot be 0");
    }
    if config.cache.item_capacity == 0 {
        anyhow::bail!("cache.item_capacity cannot be 0");
    }
    if config.cache.registry_capacity == 0 {
        anyhow::bail!("cache.registry_capacity cannot be 0");
    }
    if config.query.fuzzy_marker.trim().is_empty() || config.query.wildcard_marker.trim().is_empty() {
        anyhow::bail!("query markers cannot be empty");
    }
    for (category, provider) in &config.providers.defaults {
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            anyhow::bail!("Unknown default provider '{}' for {}", provider, category);
        }
    }

    let providers = &config.providers;
    let mut warnings = Vec::new();
    if missing(&providers.tmdb.api_key) {
        warnings.push("TMDB has no API key; film search is unavailable".to_string());
    }
    if missing(&providers.rawg.api_key) {
        warnings.push("RAWG has no API key; game search is unavailable".to_string());
    }
    if missing(&providers.igdb.client_id) || missing(&providers.igdb.access_token) {
        warnings.push("IGDB needs both client_id and access_token; it is unavailable".to_string());
    }
    if missing(&providers.fanart.api_key) {
        warnings.push("fanart.tv has no API key; that image source is skipped".to_string());
    }
    if config.fetch.user_agent.is_none() {
        warnings.push(
            "No fetch.user_agent set; MusicBrainz asks clients to identify themselves".to_string(),
        );
    }
    if config.cache.registry_path.is_none() {
        warnings.push("cache.registry_path is unset; the registry is not persisted".to_string());
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_common::Category;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for (var, _) in ENV_OVERRIDES {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn defaults_when_no_file() {
        clear_env();
        let config = Config::default();
        assert_eq!(config.fetch.max_retries, 2);
        assert_eq!(config.query.min_query_len, 3);
        assert_eq!(config.cache.registry_capacity, 2_000);
        assert_eq!(config.session.debounce_ms, 300);
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.contains("TMDB")));
    }

    #[test]
    #[serial]
    fn parses_a_full_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[fetch]
timeout_secs = 5
user_agent = "test/1.0"

[query]
min_query_len = 2

[cache]
registry_capacity = 50
registry_path = "/tmp/mf-registry.json"

[providers.tmdb]
api_key = "from-file"
language = "de-DE"

[providers.defaults]
games = "igdb"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.query.min_query_len, 2);
        assert_eq!(config.query.fuzzy_marker, "~1");
        assert_eq!(config.cache.registry_capacity, 50);
        assert_eq!(config.providers.tmdb.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.providers.tmdb.language.as_deref(), Some("de-DE"));
        assert_eq!(
            config.providers.defaults.get(&Category::Games).map(String::as_str),
            Some("igdb")
        );
    }

    #[test]
    #[serial]
    fn environment_overrides_file_credentials() {
        clear_env();
        std::env::set_var("MEDIAFORGE_TMDB_API_KEY", "from-env");
        std::env::set_var("MEDIAFORGE_IGDB_ACCESS_TOKEN", "   ");

        let mut config = Config::default();
        config.providers.tmdb.api_key = Some("from-file".into());
        config.providers.igdb.access_token = Some("kept".into());
        apply_env_overrides(&mut config);

        assert_eq!(config.providers.tmdb.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.providers.igdb.access_token.as_deref(), Some("kept"));
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_unknown_default_provider() {
        clear_env();
        let mut config = Config::default();
        config.providers.defaults.insert(Category::Music, "spotify".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    #[serial]
    fn rejects_zero_timeout() {
        let mut config = Config::default();
        config.fetch.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    #[serial]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/mediaforge.toml")).is_err());
    }
}
