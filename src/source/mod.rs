pub mod dataset;
pub mod primary;
pub mod secondary;

use async_trait::async_trait;

use crate::config::PaginationConfig;
use crate::error::Result;
use crate::model::{Article, ArticlePage, Category, Homepage, Page, Quiz, Translations};
use crate::pagination::PageWindow;

pub use dataset::FallbackDataset;
pub use primary::PrimaryClient;
pub use secondary::SecondaryClient;

/// How many records each homepage slot pulls from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomepageLayout {
    /// Hero plus featured articles.
    pub recent: u64,
    pub trending: u64,
    pub market: u64,
}

impl Default for HomepageLayout {
    fn default() -> Self {
        Self {
            recent: 5,
            trending: 3,
            market: 6,
        }
    }
}

impl From<&PaginationConfig> for HomepageLayout {
    fn from(config: &PaginationConfig) -> Self {
        Self {
            recent: config.homepage_recent,
            trending: config.trending_count,
            market: config.market_quotes,
        }
    }
}

/// Operation set shared by every content backend.
///
/// Implementations hand back canonical records only. Lookups by slug or id
/// return `Ok(None)` when the record does not exist.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    async fn get_homepage(&self, locale: &str) -> Result<Homepage>;

    async fn get_article_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Article>>;

    async fn list_recent(&self, locale: &str, window: PageWindow) -> Result<ArticlePage>;

    async fn list_trending(&self, locale: &str, limit: u64) -> Result<Vec<Article>>;

    async fn list_by_category_slug(&self, locale: &str, slug: &str, window: PageWindow) -> Result<ArticlePage>;

    async fn get_page_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Page>>;

    async fn list_categories(&self, locale: &str) -> Result<Vec<Category>>;

    async fn count_articles(&self, locale: &str) -> Result<u64>;

    async fn get_category_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Category>>;

    async fn list_articles_by_slugs(&self, locale: &str, slugs: &[String]) -> Result<Vec<Article>>;

    async fn get_translations(&self, locale: &str) -> Result<Translations>;

    async fn get_quiz(&self, locale: &str, id: &str, skip: u64) -> Result<Quiz>;

    async fn health_check(&self) -> Result<bool>;
}

/// Split a newest-first list into hero and featured slots.
pub(crate) fn hero_and_featured(mut recent: Vec<Article>) -> (Option<Article>, Vec<Article>) {
    if recent.is_empty() {
        (None, recent)
    } else {
        let hero = recent.remove(0);
        (Some(hero), recent)
    }
}
