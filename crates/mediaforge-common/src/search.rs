//! Search requests and results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::item::CanonicalItem;
use crate::types::{ItemType, SortOrder};

/// Default number of results per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Well-known filter keys understood by the bundled providers.
pub mod filter_keys {
    /// Release / publication year, as a [`Range`](super::FilterValue::Range).
    pub const YEAR: &str = "year";
    /// Duration in seconds, as a [`Range`](super::FilterValue::Range).
    pub const DURATION: &str = "duration";
    /// Primary release type (album, single, ep, ...), as an enum value.
    pub const PRIMARY_TYPE: &str = "primary_type";
    /// Referenced artist / author / company id.
    pub const ARTIST: &str = "artist";
    /// Genre slug or id.
    pub const GENRE: &str = "genre";
    /// Platform slug or id.
    pub const PLATFORM: &str = "platform";
}

/// A typed filter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterValue {
    /// Inclusive numeric range; a missing bound is open.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// A value from a controlled vocabulary.
    Enum { value: String },
    /// The id of another entity picked by the user.
    Reference { id: String },
    /// Free text matched against a specific field.
    Text { value: String },
}

impl FilterValue {
    /// Inclusive range constructor.
    pub fn range(min: Option<i64>, max: Option<i64>) -> Self {
        Self::Range { min, max }
    }

    /// Enum constructor.
    pub fn enumerated(value: impl Into<String>) -> Self {
        Self::Enum {
            value: value.into(),
        }
    }

    /// Reference constructor.
    pub fn reference(id: impl Into<String>) -> Self {
        Self::Reference { id: id.into() }
    }

    /// Text constructor.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    /// Whether this filter would constrain anything.
    pub fn is_active(&self) -> bool {
        match self {
            Self::Range { min, max } => min.is_some() || max.is_some(),
            Self::Enum { value } | Self::Text { value } => !value.trim().is_empty(),
            Self::Reference { id } => !id.trim().is_empty(),
        }
    }

    /// Whether `value` falls inside this filter when it is a range.
    ///
    /// Non-range filters and unknown values always pass.
    pub fn admits(&self, value: Option<i64>) -> bool {
        match (self, value) {
            (Self::Range { min, max }, Some(v)) => {
                min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m)
            }
            _ => true,
        }
    }
}

/// A search request against one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub free_text: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default)]
    pub wildcard: bool,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl SearchQuery {
    /// Free-text query for `item_type`, first page, default page size.
    pub fn new(item_type: ItemType, free_text: impl Into<String>) -> Self {
        Self {
            free_text: free_text.into(),
            item_type,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            fuzzy: false,
            wildcard: false,
            sort: SortOrder::Relevance,
            filters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: FilterValue) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    /// Shorthand for an inclusive year range filter.
    #[must_use]
    pub fn with_years(self, min: Option<i32>, max: Option<i32>) -> Self {
        self.with_filter(
            crate::search::filter_keys::YEAR,
            FilterValue::range(min.map(i64::from), max.map(i64::from)),
        )
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    #[must_use]
    pub fn with_wildcard(mut self, wildcard: bool) -> Self {
        self.wildcard = wildcard;
        self
    }

    /// The trimmed free text.
    pub fn text(&self) -> &str {
        self.free_text.trim()
    }

    /// Active filters only.
    pub fn active_filters(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.filters
            .iter()
            .filter(|(_, v)| v.is_active())
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_filters(&self) -> bool {
        self.active_filters().next().is_some()
    }

    /// Look up an active filter by key.
    pub fn filter(&self, key: &str) -> Option<&FilterValue> {
        self.filters.get(key).filter(|v| v.is_active())
    }

    /// The active year range, if any, as `(min, max)`.
    pub fn year_range(&self) -> Option<(Option<i64>, Option<i64>)> {
        match self.filter(filter_keys::YEAR)? {
            FilterValue::Range { min, max } => Some((*min, *max)),
            _ => None,
        }
    }

    /// Zero-based offset of the first result on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// The same query one page further.
    #[must_use]
    pub fn next_page(&self) -> Self {
        let mut next = self.clone();
        next.page = self.page.saturating_add(1);
        next
    }

    /// A stable key identifying this exact request, used for page caches.
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// One page of canonical search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub items: Vec<Arc<CanonicalItem>>,
    pub page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    /// `false` when the caller still has to apply the requested ordering.
    pub server_sorted: bool,
}

impl SearchResult {
    /// Build a page, deriving `total_pages` as `ceil(total_count / page_size)`.
    pub fn new(
        items: Vec<Arc<CanonicalItem>>,
        page: u32,
        page_size: u32,
        total_count: u64,
        server_sorted: bool,
    ) -> Self {
        Self {
            items,
            page,
            total_pages: total_pages(total_count, page_size),
            total_count,
            server_sorted,
        }
    }

    /// The empty page returned for "no results" and short-circuited queries.
    pub fn empty(page: u32) -> Self {
        Self {
            items: Vec::new(),
            page,
            total_pages: 0,
            total_count: 0,
            server_sorted: true,
        }
    }

    /// Whether there is at least one page after this one.
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// `ceil(total_count / page_size)`, saturating at `u32::MAX`.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    u32::try_from(total_count.div_ceil(size)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(5, 0), 5);
    }

    #[test]
    fn test_inactive_filters_are_ignored() {
        let q = SearchQuery::new(ItemType::Album, "")
            .with_filter("year", FilterValue::range(None, None))
            .with_filter("genre", FilterValue::enumerated("  "));
        assert!(!q.has_filters());
        assert!(q.year_range().is_none());
    }

    #[test]
    fn test_range_admits() {
        let f = FilterValue::range(Some(1994), Some(1996));
        assert!(f.admits(Some(1995)));
        assert!(f.admits(Some(1994)));
        assert!(!f.admits(Some(2020)));
        assert!(f.admits(None));
    }

    #[test]
    fn test_offset_and_next_page() {
        let q = SearchQuery::new(ItemType::Game, "zelda")
            .with_page(3)
            .with_page_size(10);
        assert_eq!(q.offset(), 20);
        assert_eq!(q.next_page().page, 4);
    }

    #[test]
    fn test_cache_key_distinguishes_pages() {
        let q = SearchQuery::new(ItemType::Game, "zelda");
        assert_ne!(q.cache_key(), q.next_page().cache_key());
    }

    #[test]
    fn test_filter_value_serialization() {
        let json = serde_json::to_value(FilterValue::range(Some(1994), None)).unwrap();
        assert_eq!(json["kind"], "range");
        assert_eq!(json["min"], 1994);
        assert!(json.get("max").is_none());
    }
}
