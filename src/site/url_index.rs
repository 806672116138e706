//! URL index and keyword relevance search.
//!
//! Each known site URL becomes a `UrlRecord` whose keyword text is derived
//! once from its path. `UrlIndex::search` scores every record against a
//! free-text query:
//!
//! - +100 when the whole lower-cased query appears in the keyword text
//! - +10 per query token (longer than 2 chars) found in the keyword text
//! - +20 for product records when the query talks about products or pricing
//! - +20 for blog records when the query asks for articles or how-tos
//!
//! Zero-score records are dropped; the rest are stably sorted by score.

use serde::{Deserialize, Serialize};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Bonus when the full query is a substring of the keyword text.
const FULL_QUERY_BONUS: u32 = 100;

/// Bonus for each matching query token.
const TOKEN_BONUS: u32 = 10;

/// Bonus when the query intent matches the record category.
const CATEGORY_BONUS: u32 = 20;

/// Tokens of this length or shorter are ignored.
const MIN_TOKEN_LEN: usize = 2;

const PRODUCT_INTENT: &[&str] = &["product", "pricing", "buy"];
const BLOG_INTENT: &[&str] = &["blog", "article", "how to"];

/// Characters in a URL path that separate words.
const PATH_SEPARATORS: &[char] = &['/', '-', '_', '.', '+', '%', '?', '=', '&', '#'];

// ─── Types ───────────────────────────────────────────────────────────────────

/// Coarse classification of a site page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Page,
    Blog,
    Product,
    General,
}

impl Category {
    /// Lower-case name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Page => "page",
            Category::Blog => "blog",
            Category::Product => "product",
            Category::General => "general",
        }
    }
}

/// A known site URL with its derived search text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub path: String,
    pub category: Category,
    /// Lower-cased path words joined by single spaces.
    pub keywords: String,
    pub title: String,
}

impl UrlRecord {
    /// Build a record from a URL, deriving path, keywords and title.
    ///
    /// Strings that do not parse as absolute URLs are treated as paths.
    pub fn new(url: impl Into<String>, category: Category) -> Self {
        let url = url.into();
        let path = url_path(&url);
        let keywords = keywords_from_path(&path);
        let title = title_from_path(&path);
        Self {
            url,
            path,
            category,
            keywords,
            title,
        }
    }
}

/// A record paired with its relevance score for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredUrlRecord {
    #[serde(flatten)]
    pub record: UrlRecord,
    pub score: u32,
}

// ─── UrlIndex ────────────────────────────────────────────────────────────────

/// Immutable, ordered collection of site URLs.
#[derive(Debug, Clone, Default)]
pub struct UrlIndex {
    records: Vec<UrlRecord>,
}

impl UrlIndex {
    pub fn new(records: Vec<UrlRecord>) -> Self {
        Self { records }
    }

    /// Every record, in load order.
    pub fn all(&self) -> &[UrlRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rank records against `query` and return at most `limit` of them.
    ///
    /// Records scoring zero are excluded. Ties keep their load order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredUrlRecord> {
        let query = query.to_lowercase();
        let tokens: Vec<&str> = query
            .split_whitespace()
            .filter(|t| t.chars().count() > MIN_TOKEN_LEN)
            .collect();
        let wants_product = PRODUCT_INTENT.iter().any(|w| query.contains(w));
        let wants_blog = BLOG_INTENT.iter().any(|w| query.contains(w));

        let mut scored: Vec<ScoredUrlRecord> = self
            .records
            .iter()
            .filter_map(|record| {
                let mut score = 0;
                // A blank query is a substring of everything; it matches nothing.
                if !query.trim().is_empty() && record.keywords.contains(query.as_str()) {
                    score += FULL_QUERY_BONUS;
                }
                score += TOKEN_BONUS
                    * tokens
                        .iter()
                        .filter(|t| record.keywords.contains(**t))
                        .count() as u32;
                if wants_product && record.category == Category::Product {
                    score += CATEGORY_BONUS;
                }
                if wants_blog && record.category == Category::Blog {
                    score += CATEGORY_BONUS;
                }
                (score > 0).then(|| ScoredUrlRecord {
                    record: record.clone(),
                    score,
                })
            })
            .collect();

        // `sort_by` is stable, so equal scores keep list order.
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(limit);

        tracing::debug!(
            query = %query,
            matches = scored.len(),
            top_score = scored.first().map(|s| s.score).unwrap_or(0),
            "url search"
        );
        scored
    }
}

// ─── Derivation helpers ──────────────────────────────────────────────────────

fn url_path(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => raw.to_string(),
    }
}

/// `/blog/WordPress-Tips` → `blog wordpress tips`.
fn keywords_from_path(path: &str) -> String {
    path.to_lowercase()
        .split(|c: char| PATH_SEPARATORS.contains(&c) || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-case the last path segment; the root becomes `Home`.
fn title_from_path(path: &str) -> String {
    let last = path
        .split('/')
        .rev()
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    let last = last.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(last);

    let words: Vec<String> = last
        .split(['-', '_', '+'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "Home".to_string()
    } else {
        words.join(" ")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> UrlIndex {
        UrlIndex::new(vec![
            UrlRecord::new("https://example.com/wordpress-hosting", Category::Page),
            UrlRecord::new("https://example.com/blog/wordpress-tips", Category::Blog),
            UrlRecord::new("https://example.com/products/vps-pricing", Category::Product),
            UrlRecord::new("https://example.com/", Category::General),
        ])
    }

    #[test]
    fn test_record_derivation() {
        let rec = UrlRecord::new("https://example.com/blog/WordPress_Tips", Category::Blog);
        assert_eq!(rec.path, "/blog/WordPress_Tips");
        assert_eq!(rec.keywords, "blog wordpress tips");
        assert_eq!(rec.title, "WordPress Tips");
    }

    #[test]
    fn test_root_title_is_home() {
        let rec = UrlRecord::new("https://example.com/", Category::General);
        assert_eq!(rec.keywords, "");
        assert_eq!(rec.title, "Home");
    }

    #[test]
    fn test_relative_path_is_accepted() {
        let rec = UrlRecord::new("/about-us.html", Category::Page);
        assert_eq!(rec.path, "/about-us.html");
        assert_eq!(rec.keywords, "about us html");
        assert_eq!(rec.title, "About Us");
    }

    #[test]
    fn test_wordpress_hosting_scenario() {
        let results = sample_index().search("wordpress hosting", 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.path, "/wordpress-hosting");
        assert_eq!(results[0].score, 120);
        assert_eq!(results[1].record.path, "/blog/wordpress-tips");
        assert_eq!(results[1].score, 10);
    }

    #[test]
    fn test_query_is_case_insensitive() {
        let lower = sample_index().search("wordpress hosting", 5);
        let upper = sample_index().search("WordPress HOSTING", 5);
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_short_tokens_ignored() {
        // "vs" and "is" are too short to count as tokens.
        let results = sample_index().search("vs is", 5);
        assert!(results.is_empty());
    }

    #[test]
    fn test_product_intent_bonus() {
        let results = sample_index().search("vps pricing", 5);
        assert_eq!(results[0].record.category, Category::Product);
        // full query (100) + two tokens (20) + product intent (20)
        assert_eq!(results[0].score, 140);
    }

    #[test]
    fn test_blog_intent_bonus_without_keyword_match() {
        let results = sample_index().search("how to", 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.category, Category::Blog);
        assert_eq!(results[0].score, 20);
    }

    #[test]
    fn test_ties_keep_list_order() {
        let index = UrlIndex::new(vec![
            UrlRecord::new("https://example.com/a/cloud", Category::Page),
            UrlRecord::new("https://example.com/b/cloud", Category::Page),
            UrlRecord::new("https://example.com/c/cloud", Category::Page),
        ]);
        let results = index.search("cloud", 10);
        let paths: Vec<_> = results.iter().map(|r| r.record.path.as_str()).collect();
        assert_eq!(paths, vec!["/a/cloud", "/b/cloud", "/c/cloud"]);
    }

    #[test]
    fn test_limit_and_zero_limit() {
        let index = sample_index();
        assert_eq!(index.search("wordpress", 1).len(), 1);
        assert!(index.search("wordpress", 0).is_empty());
    }

    #[test]
    fn test_results_sorted_and_nonzero() {
        let results = sample_index().search("wordpress blog", 10);
        assert!(results.iter().all(|r| r.score > 0));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        assert!(sample_index().search("", 5).is_empty());
        assert!(sample_index().search("   ", 5).is_empty());
    }

    #[test]
    fn test_scored_record_serializes_flat() {
        let results = sample_index().search("wordpress hosting", 1);
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["url"], "https://example.com/wordpress-hosting");
        assert_eq!(json["category"], "page");
        assert_eq!(json["score"], 120);
    }
}
