//! Lucene-style query strings.
//!
//! Text tokens are escaped, optionally marked fuzzy or wildcard, and joined
//! with implicit AND. Each active filter becomes one clause; all clauses are
//! joined with an explicit `AND`.

use mediaforge_common::{FilterValue, ItemType, SearchQuery};
use tracing::debug;

use super::QueryConfig;

/// Characters with syntactic meaning in Lucene query syntax.
const RESERVED: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
    '/',
];

/// Bare words Lucene parses as operators.
const OPERATOR_WORDS: &[&str] = &["AND", "OR", "NOT", "TO"];

/// Per-provider field naming for the Lucene builder.
pub trait QueryDialect: Send + Sync {
    /// Field the free text is matched against, or `None` for the endpoint's
    /// default field.
    fn text_field(&self, item_type: ItemType) -> Option<&'static str>;

    /// Field a filter key maps to for `item_type`, or `None` if this
    /// provider cannot filter on it.
    fn filter_field(&self, key: &str, item_type: ItemType) -> Option<&'static str>;

    /// Render one range bound for `key` (for unit conversion).
    fn range_bound(&self, _key: &str, value: i64) -> String {
        value.to_string()
    }

    /// Escape one token.
    fn escape(&self, token: &str) -> String {
        escape_lucene(token)
    }
}

/// Escape every reserved character with a backslash and neutralize bare
/// operator words.
pub fn escape_lucene(token: &str) -> String {
    if OPERATOR_WORDS.contains(&token) {
        return token.to_ascii_lowercase();
    }
    let mut out = String::with_capacity(token.len() + 4);
    for c in token.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Builds Lucene query strings for one dialect.
pub struct LuceneQueryBuilder<'a> {
    dialect: &'a dyn QueryDialect,
    config: &'a QueryConfig,
}

impl<'a> LuceneQueryBuilder<'a> {
    pub fn new(dialect: &'a dyn QueryDialect, config: &'a QueryConfig) -> Self {
        Self { dialect, config }
    }

    /// Build the full query, or `None` when there is no usable text and no
    /// active filter.
    pub fn build(&self, query: &SearchQuery) -> Option<String> {
        let mut clauses = Vec::new();

        let text = self
            .config
            .effective_text(&query.free_text)
            .and_then(|t| self.text_terms(t, query.fuzzy, query.wildcard));

        let filters: Vec<String> = query
            .active_filters()
            .filter_map(|(key, value)| self.filter_clause(key, value, query.item_type))
            .collect();

        if let Some(terms) = text {
            let clause = match self.dialect.text_field(query.item_type) {
                Some(field) => format!("{field}:({terms})"),
                None if !filters.is_empty() && terms.contains(' ') => format!("({terms})"),
                None => terms,
            };
            clauses.push(clause);
        }
        clauses.extend(filters);

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    /// Escaped, marked, space-joined text tokens.
    pub fn text_terms(&self, text: &str, fuzzy: bool, wildcard: bool) -> Option<String> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let last = tokens.len().checked_sub(1)?;

        let rendered: Vec<String> = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let mut term = self.dialect.escape(token);
                if wildcard && i == last {
                    // fuzzy+wildcard on one token is not valid syntax
                    term.push_str(&self.config.wildcard_marker);
                } else if fuzzy {
                    term.push_str(&self.config.fuzzy_marker);
                }
                term
            })
            .collect();

        Some(rendered.join(" "))
    }

    /// One clause for an active filter.
    pub fn filter_clause(&self, key: &str, value: &FilterValue, item_type: ItemType) -> Option<String> {
        let Some(field) = self.dialect.filter_field(key, item_type) else {
            debug!(filter = key, item_type = %item_type, "Filter not supported by dialect; skipping");
            return None;
        };

        let clause = match value {
            FilterValue::Range { min, max } => {
                let bound = |v: &Option<i64>| {
                    v.map(|v| self.dialect.range_bound(key, v))
                        .unwrap_or_else(|| "*".to_string())
                };
                format!("{field}:[{} TO {}]", bound(min), bound(max))
            }
            FilterValue::Reference { id } => format!("{field}:{}", quote(id.trim())),
            FilterValue::Enum { value } => format!("{field}:{}", self.dialect.escape(value.trim())),
            FilterValue::Text { value } => {
                let terms = self.text_terms(value, false, false)?;
                format!("{field}:({terms})")
            }
        };
        Some(clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_common::search::filter_keys;

    struct TestDialect;

    impl QueryDialect for TestDialect {
        fn text_field(&self, item_type: ItemType) -> Option<&'static str> {
            match item_type {
                ItemType::Album => Some("releasegroup"),
                _ => None,
            }
        }

        fn filter_field(&self, key: &str, _item_type: ItemType) -> Option<&'static str> {
            match key {
                filter_keys::YEAR => Some("firstreleasedate"),
                filter_keys::DURATION => Some("dur"),
                filter_keys::ARTIST => Some("arid"),
                filter_keys::PRIMARY_TYPE => Some("primarytype"),
                filter_keys::GENRE => Some("tag"),
                _ => None,
            }
        }

        fn range_bound(&self, key: &str, value: i64) -> String {
            if key == filter_keys::DURATION {
                (value * 1000).to_string()
            } else {
                value.to_string()
            }
        }
    }

    fn build(query: &SearchQuery) -> Option<String> {
        let config = QueryConfig::default();
        LuceneQueryBuilder::new(&TestDialect, &config).build(query)
    }

    #[test]
    fn empty_query_short_circuits() {
        assert_eq!(build(&SearchQuery::new(ItemType::Track, "")), None);
        assert_eq!(build(&SearchQuery::new(ItemType::Track, "   ")), None);
    }

    #[test]
    fn short_query_is_treated_as_empty() {
        assert_eq!(build(&SearchQuery::new(ItemType::Track, "ok")), None);
    }

    #[test]
    fn plain_tokens_join_with_implicit_and() {
        let q = SearchQuery::new(ItemType::Track, "paranoid android");
        assert_eq!(build(&q).unwrap(), "paranoid android");
    }

    #[test]
    fn text_field_wraps_terms() {
        let q = SearchQuery::new(ItemType::Album, "ok computer");
        assert_eq!(build(&q).unwrap(), "releasegroup:(ok computer)");
    }

    #[test]
    fn colon_is_escaped_so_it_never_becomes_a_field() {
        let q = SearchQuery::new(ItemType::Track, "artist:radiohead");
        let built = build(&q).unwrap();
        assert_eq!(built, r"artist\:radiohead");
        assert!(!built.contains("artist:r"));
    }

    #[test]
    fn every_reserved_character_is_escaped() {
        let escaped = escape_lucene(r#"a+b-c&d|e!f(g)h{i}j[k]l^m"n~o*p?q:r\s/t"#);
        assert_eq!(
            escaped,
            r#"a\+b\-c\&d\|e\!f\(g\)h\{i\}j\[k\]l\^m\"n\~o\*p\?q\:r\\s\/t"#
        );
    }

    #[test]
    fn operator_words_are_neutralized() {
        assert_eq!(escape_lucene("AND"), "and");
        assert_eq!(escape_lucene("Andromeda"), "Andromeda");
    }

    #[test]
    fn fuzzy_marks_every_token() {
        let q = SearchQuery::new(ItemType::Track, "karma police").with_fuzzy(true);
        assert_eq!(build(&q).unwrap(), "karma~1 police~1");
    }

    #[test]
    fn wildcard_marks_last_token_only() {
        let q = SearchQuery::new(ItemType::Track, "karma pol").with_wildcard(true);
        assert_eq!(build(&q).unwrap(), "karma pol*");
    }

    #[test]
    fn wildcard_wins_over_fuzzy_on_last_token() {
        let q = SearchQuery::new(ItemType::Track, "karma pol")
            .with_fuzzy(true)
            .with_wildcard(true);
        assert_eq!(build(&q).unwrap(), "karma~1 pol*");
    }

    #[test]
    fn range_filters_use_inclusive_brackets_and_open_bounds() {
        let q = SearchQuery::new(ItemType::Album, "").with_years(Some(1994), Some(1996));
        assert_eq!(build(&q).unwrap(), "firstreleasedate:[1994 TO 1996]");

        let q = SearchQuery::new(ItemType::Album, "").with_years(None, Some(1996));
        assert_eq!(build(&q).unwrap(), "firstreleasedate:[* TO 1996]");
    }

    #[test]
    fn range_bounds_are_converted_by_the_dialect() {
        let q = SearchQuery::new(ItemType::Track, "")
            .with_filter(filter_keys::DURATION, FilterValue::range(Some(180), None));
        assert_eq!(build(&q).unwrap(), "dur:[180000 TO *]");
    }

    #[test]
    fn text_and_filters_join_with_explicit_and() {
        let q = SearchQuery::new(ItemType::Album, "ok computer")
            .with_years(Some(1997), Some(1997))
            .with_filter(filter_keys::ARTIST, FilterValue::reference("a74b1b7f"))
            .with_filter(filter_keys::PRIMARY_TYPE, FilterValue::enumerated("album"));
        assert_eq!(
            build(&q).unwrap(),
            r#"releasegroup:(ok computer) AND arid:"a74b1b7f" AND primarytype:album AND firstreleasedate:[1997 TO 1997]"#
        );
    }

    #[test]
    fn unfielded_multi_token_text_is_grouped_before_filters() {
        let q = SearchQuery::new(ItemType::Track, "karma police").with_years(Some(1997), None);
        assert_eq!(
            build(&q).unwrap(),
            "(karma police) AND firstreleasedate:[1997 TO *]"
        );
    }

    #[test]
    fn unsupported_filters_are_skipped() {
        let q = SearchQuery::new(ItemType::Track, "")
            .with_filter(filter_keys::PLATFORM, FilterValue::reference("48"));
        assert_eq!(build(&q), None);
    }

    #[test]
    fn text_filter_is_escaped_and_grouped() {
        let q = SearchQuery::new(ItemType::Track, "")
            .with_filter(filter_keys::GENRE, FilterValue::text("trip-hop rock"));
        assert_eq!(build(&q).unwrap(), r"tag:(trip\-hop rock)");
    }

    #[test]
    fn reference_ids_are_quoted() {
        let q = SearchQuery::new(ItemType::Track, "")
            .with_filter(filter_keys::ARTIST, FilterValue::reference(r#"we"ird"#));
        assert_eq!(build(&q).unwrap(), r#"arid:"we\"ird""#);
    }
}
