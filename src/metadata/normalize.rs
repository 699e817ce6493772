//! Shared helpers for mapping upstream records onto canonical items.
//!
//! Each provider owns its own pure `map_*` functions; this module holds the
//! conversions they share and the [`Normalizer`], which routes every mapping
//! through the item cache so an already-seen id is never remapped.

use std::sync::Arc;

use mediaforge_common::{CanonicalItem, Error, ItemId, ItemType, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::cache::ItemCache;

/// Placeholder used when a book has no author on record.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Format a millisecond duration as `m:ss`.
pub fn format_duration_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Leading four-digit year of a date such as `"1997-05-21"` or `"1997"`.
pub fn parse_year(date: &str) -> Option<i32> {
    let head = date.trim().get(..4)?;
    if !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    head.parse().ok()
}

/// First non-empty candidate, in priority order.
pub fn pick_image<I, S>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.as_ref().trim().to_string())
        .find(|s| !s.is_empty())
}

/// Non-empty trimmed text, or `None`.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Deserialize one raw record, reporting a shape mismatch as validation.
pub fn parse_record<T: DeserializeOwned>(raw: Value) -> Result<T> {
    serde_json::from_value(raw).map_err(|e| Error::validation(e.to_string()))
}

/// Cache-aware mapper shared by all providers.
#[derive(Clone)]
pub struct Normalizer {
    cache: Arc<ItemCache>,
}

impl Normalizer {
    pub fn new(cache: Arc<ItemCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ItemCache> {
        &self.cache
    }

    /// Return the cached item for `id`, or map, cache and return a new one.
    pub fn normalize<F>(&self, id: &ItemId, map: F) -> Result<Arc<CanonicalItem>>
    where
        F: FnOnce() -> Result<CanonicalItem>,
    {
        if let Some(hit) = self.cache.get(id) {
            return Ok(hit);
        }
        let item = Arc::new(map()?);
        self.cache.set(Arc::clone(&item));
        Ok(item)
    }

    /// Parse and map one raw search hit, skipping it on any failure.
    ///
    /// `key` extracts the provider's external id from the parsed record;
    /// the cache is consulted before `map` runs.
    pub fn normalize_raw<T, K, M>(
        &self,
        provider_id: &str,
        item_type: ItemType,
        raw: Value,
        key: K,
        map: M,
    ) -> Option<Arc<CanonicalItem>>
    where
        T: DeserializeOwned,
        K: FnOnce(&T) -> Option<String>,
        M: FnOnce(&T) -> Result<CanonicalItem>,
    {
        let record: T = match parse_record(raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(provider = provider_id, item_type = %item_type, error = %e, "Skipping malformed record");
                return None;
            }
        };
        let Some(external_id) = key(&record).filter(|k| !k.is_empty()) else {
            warn!(provider = provider_id, item_type = %item_type, "Skipping record without id");
            return None;
        };

        let id = ItemId::new(provider_id, item_type, &external_id);
        match self.normalize(&id, || map(&record)) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(provider = provider_id, id = %id, error = %e, "Skipping unmappable record");
                None
            }
        }
    }

    /// Normalize a page of raw hits, preserving order and dropping failures.
    pub fn normalize_page<T, K, M>(
        &self,
        provider_id: &str,
        item_type: ItemType,
        raws: Vec<Value>,
        key: K,
        map: M,
    ) -> Vec<Arc<CanonicalItem>>
    where
        T: DeserializeOwned,
        K: Fn(&T) -> Option<String>,
        M: Fn(&T) -> Result<CanonicalItem>,
    {
        raws.into_iter()
            .filter_map(|raw| self.normalize_raw(provider_id, item_type, raw, &key, &map))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Deserialize)]
    struct Raw {
        id: String,
        name: String,
    }

    fn map_raw(raw: &Raw) -> Result<CanonicalItem> {
        if raw.name.is_empty() {
            return Err(Error::validation("missing name"));
        }
        Ok(CanonicalItem::new("test", ItemType::Artist, &raw.id, &raw.name))
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(0), "0:00");
        assert_eq!(format_duration_ms(61_000), "1:01");
        assert_eq!(format_duration_ms(383_999), "6:23");
        assert_eq!(format_duration_ms(3_600_000), "60:00");
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("1997-05-21"), Some(1997));
        assert_eq!(parse_year("1997"), Some(1997));
        assert_eq!(parse_year("97"), None);
        assert_eq!(parse_year("circa 1990"), None);
    }

    #[test]
    fn test_pick_image_skips_empty_candidates() {
        let picked = pick_image([None, Some(""), Some("  "), Some("b"), Some("c")]);
        assert_eq!(picked.as_deref(), Some("b"));
        assert_eq!(pick_image::<_, &str>([None, None]), None);
    }

    #[test]
    fn test_normalize_returns_cached_arc_without_remapping() {
        let normalizer = Normalizer::new(Arc::new(ItemCache::default()));
        let calls = AtomicUsize::new(0);
        let id = ItemId::new("test", ItemType::Artist, "1");

        let mapper = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(CanonicalItem::new("test", ItemType::Artist, "1", "A"))
        };
        let first = normalizer.normalize(&id, mapper).unwrap();
        let second = normalizer.normalize(&id, mapper).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_normalize_page_skips_bad_records() {
        let normalizer = Normalizer::new(Arc::new(ItemCache::default()));
        let raws = vec![
            json!({"id": "1", "name": "Good"}),
            json!({"id": 2}),
            json!({"id": "", "name": "No id"}),
            json!({"id": "4", "name": ""}),
            json!({"id": "5", "name": "Also good"}),
        ];
        let items = normalizer.normalize_page(
            "test",
            ItemType::Artist,
            raws,
            |r: &Raw| Some(r.id.clone()),
            map_raw,
        );

        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Good", "Also good"]);
    }
}
