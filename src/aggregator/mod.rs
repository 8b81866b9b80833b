pub mod keys;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{CacheSettings, Config, LocaleConfig};
use crate::content::Normalizer;
use crate::error::Result;
use crate::fallback::{FallbackOrchestrator, FallbackStats};
use crate::model::{Article, ArticlePage, Category, Homepage, Page, Quiz, RecentWithMain, Translations};
use crate::pagination::{PageWindow, Paginator};
use crate::source::{ContentSource, FallbackDataset, HomepageLayout, PrimaryClient, SecondaryClient};
use crate::storage::{CacheConfig, CacheStats, CacheStore};

/// Public entry point for content reads.
///
/// Every call resolves to data: primary content when the backend answers with
/// a well-formed payload, the fallback dataset otherwise. The only error a
/// caller can see is a configuration error from a broken fallback dataset.
pub struct Aggregator {
    primary: Arc<dyn ContentSource>,
    secondary: Arc<dyn ContentSource>,
    orchestrator: FallbackOrchestrator,
    ttl: CacheSettings,
    locales: LocaleConfig,
    recent: Paginator,
    recent_after_main: Paginator,
    category: Paginator,
    trending_count: u64,
}

impl Aggregator {
    pub fn new(primary: Arc<dyn ContentSource>, secondary: Arc<dyn ContentSource>, config: &Config) -> Self {
        let cache = CacheStore::new(CacheConfig {
            max_entries: config.cache.max_entries,
            default_ttl: config.cache.list(),
        });
        let recent = Paginator::new(config.pagination.recent_per_page);

        Self {
            primary,
            secondary,
            orchestrator: FallbackOrchestrator::new(cache).with_coalescing(config.cache.coalesce_misses),
            ttl: config.cache.clone(),
            locales: config.locale.clone(),
            recent,
            recent_after_main: recent.with_base_skip(1),
            category: Paginator::new(config.pagination.category_per_page),
            trending_count: config.pagination.trending_count.max(1),
        }
    }

    /// Wire the HTTP primary and the built-in fallback dataset from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let normalizer = Arc::new(Normalizer::with_locale(&config.locale.default)?);
        let layout = HomepageLayout::from(&config.pagination);

        let primary = PrimaryClient::from_config(config, normalizer.clone())?;
        let dataset = FallbackDataset::builtin(&normalizer)?;
        let secondary = SecondaryClient::new(Arc::new(dataset)).with_layout(layout);

        info!("Content aggregator using backend {}", primary.base_url());
        Ok(Self::new(Arc::new(primary), Arc::new(secondary), config))
    }

    /// Supported locale for `locale`, or the configured default.
    pub fn resolve_locale(&self, locale: &str) -> String {
        self.locales.resolve(locale)
    }

    pub async fn get_homepage(&self, locale: &str) -> Result<Homepage> {
        let locale = self.resolve_locale(locale);

        self.orchestrator
            .execute(
                &keys::homepage(&locale),
                self.ttl.homepage(),
                self.primary.get_homepage(&locale),
                self.secondary.get_homepage(&locale),
            )
            .await
    }

    pub async fn get_article_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Article>> {
        let locale = self.resolve_locale(locale);
        let Some(slug) = clean_slug(slug) else {
            return Ok(None);
        };

        self.orchestrator
            .execute(
                &keys::article(&locale, slug),
                self.ttl.article(),
                self.primary.get_article_by_slug(&locale, slug),
                self.secondary.get_article_by_slug(&locale, slug),
            )
            .await
    }

    pub async fn list_recent_articles(&self, locale: &str, skip: i64, count: i64) -> Result<ArticlePage> {
        let locale = self.resolve_locale(locale);
        self.recent_window(&locale, self.recent.window(skip, count)).await
    }

    /// The newest article plus a page of the ones after it. Paged results
    /// never repeat the main article.
    pub async fn list_recent_with_main(&self, locale: &str, skip: i64, count: i64) -> Result<RecentWithMain> {
        let locale = self.resolve_locale(locale);
        let main_window = PageWindow::new(0, 1);
        let window = self.recent_after_main.window(skip, count);

        // Each window falls back on its own, so a fallback main article can sit
        // next to a primary page and the reverse.
        let (main, page) = tokio::join!(
            self.recent_window(&locale, main_window),
            self.recent_window(&locale, window),
        );
        let page = page?;

        Ok(RecentWithMain {
            main: main?.articles.into_iter().next(),
            articles: page.articles,
            total: page.total,
        })
    }

    pub async fn list_trending_articles(&self, locale: &str, count: i64) -> Result<Vec<Article>> {
        let locale = self.resolve_locale(locale);
        let limit = u64::try_from(count)
            .ok()
            .filter(|c| *c > 0)
            .unwrap_or(self.trending_count);

        self.orchestrator
            .execute(
                &keys::trending(&locale, limit),
                self.ttl.list(),
                self.primary.list_trending(&locale, limit),
                self.secondary.list_trending(&locale, limit),
            )
            .await
    }

    pub async fn list_articles_by_category_slug(
        &self,
        locale: &str,
        slug: &str,
        skip: i64,
        count: i64,
    ) -> Result<ArticlePage> {
        let locale = self.resolve_locale(locale);
        let Some(slug) = clean_slug(slug) else {
            return Ok(ArticlePage::default());
        };
        let window = self.category.window(skip, count);

        self.orchestrator
            .execute(
                &keys::category_articles(&locale, slug, window),
                self.ttl.list(),
                self.primary.list_by_category_slug(&locale, slug, window),
                self.secondary.list_by_category_slug(&locale, slug, window),
            )
            .await
    }

    pub async fn get_page_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Page>> {
        let locale = self.resolve_locale(locale);
        let Some(slug) = clean_slug(slug) else {
            return Ok(None);
        };

        self.orchestrator
            .execute(
                &keys::page(&locale, slug),
                self.ttl.page(),
                self.primary.get_page_by_slug(&locale, slug),
                self.secondary.get_page_by_slug(&locale, slug),
            )
            .await
    }

    pub async fn list_categories(&self, locale: &str) -> Result<Vec<Category>> {
        let locale = self.resolve_locale(locale);

        self.orchestrator
            .execute(
                &keys::categories(&locale),
                self.ttl.category(),
                self.primary.list_categories(&locale),
                self.secondary.list_categories(&locale),
            )
            .await
    }

    pub async fn count_articles(&self, locale: &str) -> Result<u64> {
        let locale = self.resolve_locale(locale);

        self.orchestrator
            .execute(
                &keys::count(&locale),
                self.ttl.list(),
                self.primary.count_articles(&locale),
                self.secondary.count_articles(&locale),
            )
            .await
    }

    pub async fn get_category_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Category>> {
        let locale = self.resolve_locale(locale);
        let Some(slug) = clean_slug(slug) else {
            return Ok(None);
        };

        self.orchestrator
            .execute(
                &keys::category(&locale, slug),
                self.ttl.category(),
                self.primary.get_category_by_slug(&locale, slug),
                self.secondary.get_category_by_slug(&locale, slug),
            )
            .await
    }

    /// Articles for `slugs`, skipping blanks. Unknown slugs are left out.
    pub async fn list_articles_by_slugs(&self, locale: &str, slugs: &[String]) -> Result<Vec<Article>> {
        let locale = self.resolve_locale(locale);
        let slugs: Vec<String> = slugs
            .iter()
            .filter_map(|slug| clean_slug(slug))
            .map(str::to_string)
            .collect();
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        self.orchestrator
            .execute(
                &keys::articles_by_slugs(&locale, &slugs),
                self.ttl.list(),
                self.primary.list_articles_by_slugs(&locale, &slugs),
                self.secondary.list_articles_by_slugs(&locale, &slugs),
            )
            .await
    }

    pub async fn get_translations(&self, locale: &str) -> Result<Translations> {
        let locale = self.resolve_locale(locale);

        self.orchestrator
            .execute(
                &keys::translations(&locale),
                self.ttl.translations(),
                self.primary.get_translations(&locale),
                self.secondary.get_translations(&locale),
            )
            .await
    }

    pub async fn get_quiz(&self, locale: &str, id: &str, skip: i64) -> Result<Quiz> {
        let locale = self.resolve_locale(locale);
        let Some(id) = clean_slug(id) else {
            return Ok(Quiz::default());
        };
        let skip = u64::try_from(skip).unwrap_or(0);

        self.orchestrator
            .execute(
                &keys::quiz(&locale, id, skip),
                self.ttl.article(),
                self.primary.get_quiz(&locale, id, skip),
                self.secondary.get_quiz(&locale, id, skip),
            )
            .await
    }

    /// Whether the primary backend answers its health endpoint.
    pub async fn primary_available(&self) -> bool {
        match self.primary.health_check().await {
            Ok(healthy) => healthy,
            Err(err) => {
                debug!("Primary health check failed: {}", err);
                false
            }
        }
    }

    /// Drop the cached copy of one article so the next read refetches it.
    pub fn invalidate_article(&self, locale: &str, slug: &str) -> bool {
        let locale = self.resolve_locale(locale);
        match clean_slug(slug) {
            Some(slug) => self.orchestrator.cache().invalidate(&keys::article(&locale, slug)),
            None => false,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        self.orchestrator.cache()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.orchestrator.cache().stats()
    }

    pub fn fallback_stats(&self) -> FallbackStats {
        self.orchestrator.stats()
    }

    async fn recent_window(&self, locale: &str, window: PageWindow) -> Result<ArticlePage> {
        self.orchestrator
            .execute(
                &keys::recent(locale, window),
                self.ttl.list(),
                self.primary.list_recent(locale, window),
                self.secondary.list_recent(locale, window),
            )
            .await
    }
}

fn clean_slug(slug: &str) -> Option<&str> {
    let slug = slug.trim();
    (!slug.is_empty()).then_some(slug)
}
