use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::content::Normalizer;
use crate::error::{Error, Result};
use crate::model::{Article, Category, MarketSnapshot, Page, Quiz, Translations};

const BUILTIN_DATASET: &str = include_str!("../../data/fallback_dataset.json");

/// Read-only content table served when the primary backend is unavailable.
///
/// Records are normalized once at load time. Articles are kept newest first.
#[derive(Debug, Clone, Default)]
pub struct FallbackDataset {
    articles: Vec<Article>,
    categories: Vec<Category>,
    pages: Vec<Page>,
    market: MarketSnapshot,
    translations: Translations,
    quizzes: Vec<Quiz>,
}

impl FallbackDataset {
    /// The dataset compiled into the binary.
    pub fn builtin(normalizer: &Normalizer) -> Result<Self> {
        Self::from_json(BUILTIN_DATASET, normalizer)
    }

    pub fn from_json(text: &str, normalizer: &Normalizer) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("Fallback dataset is not valid JSON: {}", e)))?;
        Self::from_value(&raw, normalizer)
    }

    pub fn from_value(raw: &Value, normalizer: &Normalizer) -> Result<Self> {
        if !raw.is_object() {
            return Err(Error::Config("Fallback dataset must be a JSON object".to_string()));
        }

        let mut articles = normalizer.normalize_articles(section(raw, "articles")?);
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        let categories: Vec<Category> = section(raw, "categories")?
            .iter()
            .map(|c| normalizer.normalize_category(c))
            .collect();

        let pages: Vec<Page> = section(raw, "pages")?
            .iter()
            .map(|p| normalizer.normalize_page(p))
            .collect();

        let market = MarketSnapshot {
            quotes: section(raw, "market")?
                .iter()
                .map(|q| normalizer.normalize_quote(q))
                .collect(),
        };

        let quizzes: Vec<Quiz> = section(raw, "quizzes")?
            .iter()
            .map(|q| normalizer.normalize_quiz(q, ""))
            .collect();

        let translations = raw
            .get("translations")
            .map(|t| normalizer.normalize_translations(t))
            .unwrap_or_default();

        ensure_unique("article", articles.iter().map(|a| a.slug.as_str()))?;
        ensure_unique("category", categories.iter().map(|c| c.slug.as_str()))?;
        ensure_unique("page", pages.iter().map(|p| p.slug.as_str()))?;
        ensure_unique("quiz", quizzes.iter().map(|q| q.id.as_str()))?;

        if let Some(article) = articles.iter().find(|a| a.id.is_empty()) {
            return Err(Error::Config(format!(
                "Fallback article {} has no id",
                article.slug
            )));
        }

        debug!(
            "Loaded fallback dataset: {} articles, {} categories, {} pages",
            articles.len(),
            categories.len(),
            pages.len()
        );

        Ok(Self {
            articles,
            categories,
            pages,
            market,
            translations,
            quizzes,
        })
    }

    /// Articles, newest first.
    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn market(&self) -> &MarketSnapshot {
        &self.market
    }

    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    pub fn article(&self, slug: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.slug == slug)
    }

    pub fn category(&self, slug: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    pub fn page(&self, slug: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.slug == slug)
    }

    pub fn quiz(&self, id: &str) -> Option<&Quiz> {
        self.quizzes.iter().find(|q| q.id == id)
    }
}

/// A missing section is empty; a present one must be an array.
fn section<'a>(raw: &'a Value, key: &str) -> Result<&'a [Value]> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(Error::Config(format!(
            "Fallback dataset section {} must be an array",
            key
        ))),
    }
}

fn ensure_unique<'a>(kind: &str, keys: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if key.is_empty() {
            return Err(Error::Config(format!("Fallback {} without a slug", kind)));
        }
        if !seen.insert(key) {
            return Err(Error::Config(format!("Duplicate fallback {} slug: {}", kind, key)));
        }
    }
    Ok(())
}
