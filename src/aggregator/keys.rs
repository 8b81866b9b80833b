//! Cache key layout. Every key starts with its kind and locale so a whole kind
//! can be dropped with a prefix invalidation.

use url::form_urlencoded;

use crate::pagination::PageWindow;

pub fn homepage(locale: &str) -> String {
    format!("homepage:{}", locale)
}

pub fn article(locale: &str, slug: &str) -> String {
    format!("article:{}:{}", locale, slug)
}

pub fn recent(locale: &str, window: PageWindow) -> String {
    format!("recent:{}:{}:{}", locale, window.skip, window.count)
}

pub fn trending(locale: &str, limit: u64) -> String {
    format!("trending:{}:{}", locale, limit)
}

pub fn category_articles(locale: &str, slug: &str, window: PageWindow) -> String {
    format!("category-articles:{}:{}:{}:{}", locale, slug, window.skip, window.count)
}

pub fn page(locale: &str, slug: &str) -> String {
    format!("page:{}:{}", locale, slug)
}

pub fn categories(locale: &str) -> String {
    format!("categories:{}", locale)
}

pub fn category(locale: &str, slug: &str) -> String {
    format!("category:{}:{}", locale, slug)
}

pub fn count(locale: &str) -> String {
    format!("count:{}", locale)
}

/// Slugs are form-encoded before joining so a comma inside one slug cannot
/// pass for a separator.
pub fn articles_by_slugs(locale: &str, slugs: &[String]) -> String {
    let encoded: Vec<String> = slugs
        .iter()
        .map(|slug| form_urlencoded::byte_serialize(slug.as_bytes()).collect())
        .collect();
    format!("by-slugs:{}:{}", locale, encoded.join(","))
}

pub fn translations(locale: &str) -> String {
    format!("translations:{}", locale)
}

pub fn quiz(locale: &str, id: &str, skip: u64) -> String {
    format!("quiz:{}:{}:{}", locale, id, skip)
}
