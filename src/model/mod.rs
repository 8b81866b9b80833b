use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured rich-text body. Nodes are kept as raw JSON so CMS trees pass
/// through untouched; HTML sources collapse to a single paragraph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    pub children: Vec<Value>,
}

impl RichText {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            children: vec![serde_json::json!({
                "type": "paragraph",
                "children": [{ "text": text.into() }],
            })],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Concatenated text leaves, one line per top-level block.
    pub fn plain_text(&self) -> String {
        fn collect(node: &Value, out: &mut String) {
            if let Some(text) = node.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
            if let Some(children) = node.get("children").and_then(Value::as_array) {
                for child in children {
                    collect(child, out);
                }
            }
        }

        self.children
            .iter()
            .map(|block| {
                let mut line = String::new();
                collect(block, &mut line);
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub body: RichText,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub locale: String,
    pub views: u64,
    pub tags: Vec<TagRef>,
    pub image: Option<ImageRef>,
    pub author: Author,
    pub category: Option<Category>,
}

impl Article {
    pub fn in_category(&self, slug: &str) -> bool {
        self.category.as_ref().map_or(false, |c| c.slug == slug)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub body: RichText,
    pub seo_title: String,
    pub seo_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub symbol: String,
    pub company_name: Option<String>,
    pub price: f64,
    pub change: f64,
    pub percent_change: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub quotes: Vec<StockQuote>,
}

impl MarketSnapshot {
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Homepage composite. Every slot degrades independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Homepage {
    pub hero: Option<Article>,
    pub featured: Vec<Article>,
    pub trending: Vec<Article>,
    pub market: MarketSnapshot,
}

impl Homepage {
    pub fn is_empty(&self) -> bool {
        self.hero.is_none() && self.featured.is_empty() && self.trending.is_empty() && self.market.is_empty()
    }
}

/// One window of a paginated article list plus the total the source reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentWithMain {
    pub main: Option<Article>,
    pub articles: Vec<Article>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub order: i64,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub questions: Vec<Question>,
}

pub type Translations = BTreeMap<String, String>;
