use std::sync::Arc;

use async_trait::async_trait;

use super::{hero_and_featured, ContentSource, FallbackDataset, HomepageLayout};
use crate::error::Result;
use crate::model::{Article, ArticlePage, Category, Homepage, MarketSnapshot, Page, Quiz, Translations};
use crate::pagination::PageWindow;

/// Deterministic source over a [`FallbackDataset`]. Never fails.
///
/// The dataset is not localized, so every locale sees the same records.
#[derive(Debug, Clone)]
pub struct SecondaryClient {
    dataset: Arc<FallbackDataset>,
    layout: HomepageLayout,
}

impl SecondaryClient {
    pub fn new(dataset: Arc<FallbackDataset>) -> Self {
        Self {
            dataset,
            layout: HomepageLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: HomepageLayout) -> Self {
        self.layout = layout;
        self
    }

    fn window_of(articles: Vec<&Article>, window: PageWindow) -> ArticlePage {
        let total = articles.len() as u64;
        let (start, end) = window.bounds(articles.len());

        ArticlePage {
            articles: articles[start..end].iter().map(|a| (*a).clone()).collect(),
            total,
        }
    }

    fn trending(&self, limit: u64) -> Vec<Article> {
        let mut articles: Vec<&Article> = self.dataset.articles().iter().collect();
        // Stable sort keeps recency order among equal view counts.
        articles.sort_by(|a, b| b.views.cmp(&a.views));

        articles
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ContentSource for SecondaryClient {
    fn name(&self) -> &'static str {
        "secondary"
    }

    async fn get_homepage(&self, _locale: &str) -> Result<Homepage> {
        let recent = self
            .dataset
            .articles()
            .iter()
            .take(usize::try_from(self.layout.recent).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        let (hero, featured) = hero_and_featured(recent);

        Ok(Homepage {
            hero,
            featured,
            trending: self.trending(self.layout.trending),
            market: MarketSnapshot {
                quotes: self
                    .dataset
                    .market()
                    .quotes
                    .iter()
                    .take(usize::try_from(self.layout.market).unwrap_or(usize::MAX))
                    .cloned()
                    .collect(),
            },
        })
    }

    async fn get_article_by_slug(&self, _locale: &str, slug: &str) -> Result<Option<Article>> {
        Ok(self.dataset.article(slug).cloned())
    }

    async fn list_recent(&self, _locale: &str, window: PageWindow) -> Result<ArticlePage> {
        Ok(Self::window_of(self.dataset.articles().iter().collect(), window))
    }

    async fn list_trending(&self, _locale: &str, limit: u64) -> Result<Vec<Article>> {
        Ok(self.trending(limit))
    }

    async fn list_by_category_slug(&self, _locale: &str, slug: &str, window: PageWindow) -> Result<ArticlePage> {
        let matching = self
            .dataset
            .articles()
            .iter()
            .filter(|a| a.in_category(slug))
            .collect();
        Ok(Self::window_of(matching, window))
    }

    async fn get_page_by_slug(&self, _locale: &str, slug: &str) -> Result<Option<Page>> {
        Ok(self.dataset.page(slug).cloned())
    }

    async fn list_categories(&self, _locale: &str) -> Result<Vec<Category>> {
        Ok(self.dataset.categories().to_vec())
    }

    async fn count_articles(&self, _locale: &str) -> Result<u64> {
        Ok(self.dataset.articles().len() as u64)
    }

    async fn get_category_by_slug(&self, _locale: &str, slug: &str) -> Result<Option<Category>> {
        Ok(self.dataset.category(slug).cloned())
    }

    async fn list_articles_by_slugs(&self, _locale: &str, slugs: &[String]) -> Result<Vec<Article>> {
        Ok(slugs
            .iter()
            .filter_map(|slug| self.dataset.article(slug).cloned())
            .collect())
    }

    async fn get_translations(&self, _locale: &str) -> Result<Translations> {
        Ok(self.dataset.translations().clone())
    }

    async fn get_quiz(&self, _locale: &str, id: &str, skip: u64) -> Result<Quiz> {
        let Some(quiz) = self.dataset.quiz(id) else {
            return Ok(Quiz {
                id: id.to_string(),
                questions: Vec::new(),
            });
        };

        Ok(Quiz {
            id: quiz.id.clone(),
            questions: quiz
                .questions
                .iter()
                .skip(usize::try_from(skip).unwrap_or(usize::MAX))
                .cloned()
                .collect(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
