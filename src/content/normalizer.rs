use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::model::{
    Answer, Article, Author, Category, ImageRef, Page, Question, Quiz, RichText, StockQuote, TagRef, Translations,
};

pub const DEFAULT_LOCALE: &str = "en";

/// Converts loosely typed backend records into the canonical model.
///
/// Every `normalize_*` method is total: absent or mistyped fields degrade to
/// `None`, empty strings or empty lists. Feeding the JSON form of a canonical
/// record back in yields the same record.
#[derive(Debug, Clone)]
pub struct Normalizer {
    markup: Regex,
    default_locale: String,
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        Self::with_locale(DEFAULT_LOCALE)
    }

    pub fn with_locale(default_locale: &str) -> Result<Self> {
        Ok(Self {
            markup: Regex::new(r"<[^>]*>").map_err(|e| Error::Config(e.to_string()))?,
            default_locale: default_locale.to_string(),
        })
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Normalize a native article record.
    pub fn normalize_article(&self, raw: &Value) -> Article {
        let title = string_field(raw, &["title"]).unwrap_or_default();

        Article {
            id: id_field(raw, &["id"]),
            slug: string_field(raw, &["slug"]).unwrap_or_default(),
            excerpt: non_empty(string_field(raw, &["excerpt", "summary"])),
            body: self.body_of(raw),
            published_at: raw_field(raw, &["published_at", "publishedAt"]).and_then(parse_timestamp),
            updated_at: raw_field(raw, &["updated_at", "updatedAt"]).and_then(parse_timestamp),
            locale: non_empty(string_field(raw, &["locale"])).unwrap_or_else(|| self.default_locale.clone()),
            views: raw_field(raw, &["views", "view_count", "viewCount"])
                .and_then(number_value)
                .map(|n| if n.is_finite() && n > 0.0 { n as u64 } else { 0 })
                .unwrap_or(0),
            tags: tags_of(raw),
            image: image_of(raw, &title),
            author: raw_field(raw, &["author"])
                .map(|a| self.normalize_author(a))
                .unwrap_or_default(),
            category: self.category_of(raw),
            title,
        }
    }

    pub fn normalize_articles(&self, raw: &[Value]) -> Vec<Article> {
        raw.iter().map(|record| self.normalize_article(record)).collect()
    }

    pub fn normalize_author(&self, raw: &Value) -> Author {
        // Some backends only ship the display name.
        if let Some(name) = raw.as_str() {
            return Author { name: name.to_string(), ..Default::default() };
        }

        let avatar_url = non_empty(string_field(raw, &["avatar_url", "avatarUrl"])).or_else(|| {
            match raw.get("avatar") {
                Some(Value::String(url)) => non_empty(Some(url.clone())),
                Some(avatar) => non_empty(
                    string_field(avatar, &["url"]).or_else(|| avatar.get("data").and_then(|d| string_field(d, &["url"]))),
                ),
                None => None,
            }
        });

        Author {
            id: id_field(raw, &["id"]),
            name: string_field(raw, &["name", "display_name", "displayName"]).unwrap_or_default(),
            avatar_url,
            bio: non_empty(string_field(raw, &["bio", "biography"])),
        }
    }

    pub fn normalize_category(&self, raw: &Value) -> Category {
        Category {
            id: id_field(raw, &["id"]),
            name: string_field(raw, &["name", "title"]).unwrap_or_default(),
            slug: string_field(raw, &["slug"]).unwrap_or_default(),
            description: non_empty(string_field(raw, &["description"])),
        }
    }

    pub fn normalize_page(&self, raw: &Value) -> Page {
        let seo = raw.get("seoComponent");
        let seo_title = seo.and_then(|s| string_field(s, &["title"]));
        let seo_description = seo.and_then(|s| match s.get("description") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(description) => string_field(description, &["text"]),
            None => None,
        });

        let title = non_empty(string_field(raw, &["title"]))
            .or_else(|| seo_title.clone())
            .unwrap_or_default();

        Page {
            id: id_field(raw, &["id"]),
            slug: string_field(raw, &["slug"]).unwrap_or_default(),
            body: self.body_of(raw),
            seo_title: non_empty(string_field(raw, &["seo_title", "meta_title"]))
                .or(seo_title)
                .unwrap_or_else(|| title.clone()),
            seo_description: non_empty(string_field(raw, &["seo_description", "meta_description"]))
                .or(seo_description)
                .unwrap_or_default(),
            title,
        }
    }

    pub fn normalize_quote(&self, raw: &Value) -> StockQuote {
        StockQuote {
            symbol: string_field(raw, &["symbol"]).unwrap_or_default(),
            company_name: non_empty(string_field(raw, &["company_name", "name"])),
            price: raw_field(raw, &["price", "current_price"]).and_then(number_value).unwrap_or(0.0),
            change: raw_field(raw, &["change", "price_change"]).and_then(number_value).unwrap_or(0.0),
            percent_change: raw_field(raw, &["percent_change", "change_percent"]).and_then(number_value),
        }
    }

    /// `fallback_id` is used when the payload does not echo the quiz id back.
    pub fn normalize_quiz(&self, raw: &Value, fallback_id: &str) -> Quiz {
        let mut questions: Vec<Question> = array_field(raw, &["questions"])
            .map(|items| items.iter().map(normalize_question).collect())
            .unwrap_or_default();
        questions.sort_by_key(|q| q.order);

        Quiz {
            id: non_empty(Some(id_field(raw, &["id", "quiz_id"]))).unwrap_or_else(|| fallback_id.to_string()),
            questions,
        }
    }

    pub fn normalize_translations(&self, raw: &Value) -> Translations {
        let table = raw.get("translations").filter(|t| t.is_object()).unwrap_or(raw);
        let mut translations = Translations::new();

        if let Some(entries) = table.as_object() {
            for (key, value) in entries {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                translations.insert(key.clone(), text);
            }
        }

        translations
    }

    /// Turn a body value of any supported shape into a structured tree.
    pub fn rich_text(&self, raw: &Value) -> RichText {
        match raw {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.starts_with('{') {
                    if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
                        if parsed.get("children").map_or(false, Value::is_array) {
                            return self.rich_text(&parsed);
                        }
                    }
                }
                self.html_to_rich_text(trimmed)
            }
            Value::Object(map) => match map.get("children") {
                Some(Value::Array(children)) => RichText { children: children.clone() },
                _ => map
                    .get("raw")
                    .or_else(|| map.get("html"))
                    .map(|inner| self.rich_text(inner))
                    .unwrap_or_default(),
            },
            Value::Array(children) => RichText { children: children.clone() },
            _ => RichText::default(),
        }
    }

    /// Lossy HTML conversion: every `<...>` span is removed and the remaining
    /// text becomes a single paragraph.
    pub fn html_to_rich_text(&self, html: &str) -> RichText {
        let text = self.markup.replace_all(html, "");
        let text = text.trim();
        if text.is_empty() {
            RichText::default()
        } else {
            RichText::paragraph(text)
        }
    }

    fn body_of(&self, raw: &Value) -> RichText {
        raw_field(raw, &["body", "content"])
            .map(|body| self.rich_text(body))
            .unwrap_or_default()
    }

    fn category_of(&self, raw: &Value) -> Option<Category> {
        let candidate = match raw.get("category") {
            Some(category @ Value::Object(_)) => Some(category),
            _ => raw
                .get("categories")
                .and_then(Value::as_array)
                .and_then(|items| items.first()),
        }?;

        let category = self.normalize_category(candidate);
        if category.slug.is_empty() && category.name.is_empty() {
            None
        } else {
            Some(category)
        }
    }
}

fn normalize_question(raw: &Value) -> Question {
    let mut answers: Vec<Answer> = array_field(raw, &["answers"])
        .map(|items| {
            items
                .iter()
                .map(|a| Answer {
                    id: id_field(a, &["id"]),
                    text: string_field(a, &["text", "answer_text"]).unwrap_or_default(),
                    is_correct: a.get("is_correct").and_then(Value::as_bool).unwrap_or(false),
                    order: integer_field(a, &["order", "answer_order"]),
                })
                .collect()
        })
        .unwrap_or_default();
    answers.sort_by_key(|a| a.order);

    Question {
        id: id_field(raw, &["id"]),
        text: string_field(raw, &["text", "question_text"]).unwrap_or_default(),
        order: integer_field(raw, &["order", "question_order"]),
        answers,
    }
}

fn tags_of(raw: &Value) -> Vec<TagRef> {
    raw.get("tags")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(name) => Some(name.clone()),
                    other => string_field(other, &["tag", "name"]),
                })
                .filter(|name| !name.is_empty())
                .map(|tag| TagRef { tag })
                .collect()
        })
        .unwrap_or_default()
}

fn image_of(raw: &Value, title: &str) -> Option<ImageRef> {
    let nested = raw.get("image").filter(|i| i.is_object());

    let url = nested
        .and_then(|image| {
            string_field(image, &["url"]).or_else(|| image.get("data").and_then(|d| string_field(d, &["url"])))
        })
        .or_else(|| string_field(raw, &["image_url", "imageUrl", "featured_image"]))
        .filter(|url| !url.is_empty())?;

    let alt = non_empty(string_field(raw, &["image_alt", "imageAlt"]))
        .or_else(|| {
            nested.and_then(|image| {
                non_empty(string_field(image, &["alt"]))
                    .or_else(|| non_empty(image.get("description").and_then(|d| string_field(d, &["text"]))))
            })
        })
        .unwrap_or_else(|| title.to_string());

    Some(ImageRef { url, alt })
}

/// First present, non-null value among `keys`.
fn raw_field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let map: &Map<String, Value> = raw.as_object()?;
    keys.iter().filter_map(|key| map.get(*key)).find(|v| !v.is_null())
}

fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    let map = raw.as_object()?;
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|v| v.as_str().map(str::to_string))
}

fn array_field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    raw_field(raw, keys).and_then(Value::as_array)
}

/// Ids arrive as UUID strings or integers depending on the backend.
fn id_field(raw: &Value, keys: &[&str]) -> String {
    match raw_field(raw, keys) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn integer_field(raw: &Value, keys: &[&str]) -> i64 {
    raw_field(raw, keys)
        .and_then(number_value)
        .map(|n| n as i64)
        .unwrap_or(0)
}

/// Numeric columns are sometimes serialized as decimal strings.
fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Accepts RFC 3339 as well as naive ISO-8601 timestamps, which are taken as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
