//! IGDB apicalypse request bodies.
//!
//! IGDB takes a small statement language in the POST body:
//!
//! ```text
//! search "zelda"; fields name,cover.image_id; where platforms = (48); limit 20; offset 0;
//! ```
//!
//! `search` and `sort` cannot be combined, so a text query is always
//! relevance-ordered by the server.

use chrono::NaiveDate;
use mediaforge_common::search::filter_keys;
use mediaforge_common::{FilterValue, SearchQuery, SortOrder};
use tracing::debug;

use super::QueryConfig;

/// Field names for one IGDB endpoint.
#[derive(Debug, Clone, Copy)]
pub struct IgdbTarget {
    /// Comma-separated field selection.
    pub fields: &'static str,
    /// Unix-timestamp field used for year filters and year sorting.
    pub date_field: &'static str,
    /// Field used for rating sort, if the endpoint has one.
    pub rating_field: Option<&'static str>,
    /// Whether the endpoint supports platform/genre/company filters.
    pub relational_filters: bool,
}

/// A parsed-out IGDB request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgdbQuery {
    pub fields: String,
    pub search: Option<String>,
    pub conditions: Vec<String>,
    pub sort: Option<String>,
    pub limit: u32,
    pub offset: u64,
}

impl IgdbQuery {
    /// Translate `query` for `target`, or `None` when there is no usable
    /// text and no applicable filter.
    pub fn build(query: &SearchQuery, config: &QueryConfig, target: IgdbTarget) -> Option<Self> {
        let search = config.effective_text(&query.free_text).map(quote);

        let conditions: Vec<String> = query
            .active_filters()
            .filter_map(|(key, value)| condition(key, value, target))
            .collect();

        if search.is_none() && conditions.is_empty() {
            return None;
        }

        let sort = if search.is_some() {
            None
        } else {
            sort_clause(query.sort, target)
        };

        Some(Self {
            fields: target.fields.to_string(),
            search,
            conditions,
            sort,
            limit: query.page_size,
            offset: query.offset(),
        })
    }

    /// Whether the server will return results in the requested order.
    pub fn is_server_sorted(&self, requested: SortOrder) -> bool {
        requested == SortOrder::Relevance || self.sort.is_some()
    }

    /// The body for the list endpoint.
    pub fn render(&self) -> String {
        let mut body = String::new();
        if let Some(search) = &self.search {
            body.push_str(&format!("search {search}; "));
        }
        body.push_str(&format!("fields {}; ", self.fields));
        self.push_where(&mut body);
        if let Some(sort) = &self.sort {
            body.push_str(&format!("sort {sort}; "));
        }
        body.push_str(&format!("limit {}; offset {};", self.limit, self.offset));
        body
    }

    /// The body for the matching `/count` endpoint.
    pub fn render_count(&self) -> String {
        let mut body = String::new();
        if let Some(search) = &self.search {
            body.push_str(&format!("search {search}; "));
        }
        self.push_where(&mut body);
        body.trim_end().to_string()
    }

    fn push_where(&self, body: &mut String) {
        if !self.conditions.is_empty() {
            body.push_str(&format!("where {}; ", self.conditions.join(" & ")));
        }
    }
}

fn quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn condition(key: &str, value: &FilterValue, target: IgdbTarget) -> Option<String> {
    match (key, value) {
        (filter_keys::YEAR, FilterValue::Range { min, max }) => {
            let field = target.date_field;
            let mut parts = Vec::new();
            if let Some(ts) = min.and_then(year_start) {
                parts.push(format!("{field} >= {ts}"));
            }
            // an upper bound past any representable date is left open
            if let Some(ts) = max.and_then(|y| y.checked_add(1)).and_then(year_start) {
                parts.push(format!("{field} < {ts}"));
            }
            (!parts.is_empty()).then(|| parts.join(" & "))
        }
        (filter_keys::PLATFORM, _) if target.relational_filters => id_list("platforms", value),
        (filter_keys::GENRE, _) if target.relational_filters => id_list("genres", value),
        (filter_keys::ARTIST, _) if target.relational_filters => {
            id_list("involved_companies.company", value)
        }
        _ => {
            debug!(filter = key, "Filter not supported by IGDB endpoint; skipping");
            None
        }
    }
}

/// `field = (id)` for numeric reference/enum values.
fn id_list(field: &str, value: &FilterValue) -> Option<String> {
    let raw = match value {
        FilterValue::Reference { id } => id,
        FilterValue::Enum { value } => value,
        _ => return None,
    };
    let id: u64 = raw.trim().parse().ok()?;
    Some(format!("{field} = ({id})"))
}

/// Unix timestamp of January 1st of `year`, UTC.
fn year_start(year: i64) -> Option<i64> {
    let year = i32::try_from(year).ok()?;
    let date = NaiveDate::from_ymd_opt(year, 1, 1)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

fn sort_clause(sort: SortOrder, target: IgdbTarget) -> Option<String> {
    match sort {
        SortOrder::Relevance => None,
        SortOrder::TitleAsc => Some("name asc".to_string()),
        SortOrder::TitleDesc => Some("name desc".to_string()),
        SortOrder::YearAsc => Some(format!("{} asc", target.date_field)),
        SortOrder::YearDesc => Some(format!("{} desc", target.date_field)),
        SortOrder::RatingDesc => target.rating_field.map(|f| format!("{f} desc")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_common::ItemType;

    const GAMES: IgdbTarget = IgdbTarget {
        fields: "name,first_release_date",
        date_field: "first_release_date",
        rating_field: Some("total_rating"),
        relational_filters: true,
    };

    fn build(query: &SearchQuery) -> Option<IgdbQuery> {
        IgdbQuery::build(query, &QueryConfig::default(), GAMES)
    }

    #[test]
    fn empty_query_short_circuits() {
        assert!(build(&SearchQuery::new(ItemType::Game, "  ")).is_none());
        assert!(build(&SearchQuery::new(ItemType::Game, "ze")).is_none());
    }

    #[test]
    fn text_search_renders_quoted_and_unsorted() {
        let q = SearchQuery::new(ItemType::Game, r#"say "hi""#).with_sort(SortOrder::TitleAsc);
        let built = build(&q).unwrap();
        assert_eq!(
            built.render(),
            r#"search "say \"hi\""; fields name,first_release_date; limit 20; offset 0;"#
        );
        assert!(!built.is_server_sorted(SortOrder::TitleAsc));
    }

    #[test]
    fn year_range_becomes_timestamp_bounds() {
        let q = SearchQuery::new(ItemType::Game, "").with_years(Some(1998), Some(1998));
        let built = build(&q).unwrap();
        assert_eq!(
            built.conditions,
            vec!["first_release_date >= 883612800 & first_release_date < 915148800".to_string()]
        );
    }

    #[test]
    fn extreme_year_bounds_are_left_open() {
        let q = SearchQuery::new(ItemType::Game, "")
            .with_filter(filter_keys::YEAR, FilterValue::range(Some(1990), Some(i64::MAX)));
        let built = build(&q).unwrap();
        assert_eq!(built.conditions, vec!["first_release_date >= 631152000".to_string()]);

        let q = SearchQuery::new(ItemType::Game, "")
            .with_filter(filter_keys::YEAR, FilterValue::range(Some(i64::MIN), Some(1998)));
        let built = build(&q).unwrap();
        assert_eq!(built.conditions, vec!["first_release_date < 915148800".to_string()]);
    }

    #[test]
    fn browse_honours_sort_and_paging() {
        let q = SearchQuery::new(ItemType::Game, "")
            .with_filter(filter_keys::PLATFORM, FilterValue::reference("48"))
            .with_sort(SortOrder::RatingDesc)
            .with_page(2);
        let built = build(&q).unwrap();
        assert_eq!(
            built.render(),
            "fields name,first_release_date; where platforms = (48); sort total_rating desc; limit 20; offset 20;"
        );
        assert_eq!(built.render_count(), "where platforms = (48);");
        assert!(built.is_server_sorted(SortOrder::RatingDesc));
    }

    #[test]
    fn non_numeric_references_are_dropped() {
        let q = SearchQuery::new(ItemType::Game, "")
            .with_filter(filter_keys::GENRE, FilterValue::reference("rpg"));
        assert!(build(&q).is_none());
    }
}
