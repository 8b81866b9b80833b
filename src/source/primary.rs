use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use super::{hero_and_featured, ContentSource, HomepageLayout};
use crate::config::Config;
use crate::content::Normalizer;
use crate::error::{Error, Result, SourceError};
use crate::model::{Article, ArticlePage, Category, Homepage, MarketSnapshot, Page, Quiz, Translations};
use crate::pagination::PageWindow;

const ARTICLE_LIST_KEYS: &[&str] = &["articles", "data", "items"];
const TOTAL_KEYS: &[&str] = &["total", "count"];

/// HTTP client for the primary JSON backend.
///
/// Every request is bounded by a timeout. Non-2xx responses, transport
/// failures and undecodable bodies surface as [`SourceError`]; envelopes
/// missing their list or total surface as [`Error::Shape`].
#[derive(Debug, Clone)]
pub struct PrimaryClient {
    client: Client,
    base_url: Url,
    timeout_duration: Duration,
    user_agent: String,
    layout: HomepageLayout,
    normalizer: Arc<Normalizer>,
}

impl PrimaryClient {
    pub fn new(base_url: &str, normalizer: Arc<Normalizer>) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| SourceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::InvalidUrl(base_url.to_string()).into());
        }

        let timeout_duration = Duration::from_secs(10);

        Ok(Self {
            client: build_client(timeout_duration)?,
            base_url,
            timeout_duration,
            user_agent: format!("news-aggregator/{}", env!("CARGO_PKG_VERSION")),
            layout: HomepageLayout::default(),
            normalizer,
        })
    }

    pub fn from_config(config: &Config, normalizer: Arc<Normalizer>) -> Result<Self> {
        Ok(Self::new(&config.source.base_url, normalizer)?
            .with_timeout(config.source.timeout_duration())?
            .with_user_agent(config.source.user_agent.clone())
            .with_layout(HomepageLayout::from(&config.pagination)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        self.timeout_duration = timeout;
        Ok(self)
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_layout(mut self, layout: HomepageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` extended with `segments`, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint_with_query(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let request = self.client.get(url.clone());
        self.send(request, &url).await
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Value> {
        debug!("Requesting {}", url);

        let response = timeout(
            self.timeout_duration,
            request
                .header("User-Agent", &self.user_agent)
                .header("Accept", "application/json")
                .send(),
        )
        .await
        .map_err(|_| SourceError::Timeout(format!("Request to {} timed out", url)))?
        .map_err(SourceError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        let body = timeout(self.timeout_duration, response.bytes())
            .await
            .map_err(|_| SourceError::Timeout(format!("Reading body from {} timed out", url)))?
            .map_err(|e| SourceError::Http(format!("Failed to read response body: {}", e)))?;

        debug!("Received {} bytes from {}", body.len(), url);

        serde_json::from_slice(&body)
            .map_err(|e| SourceError::Decode(format!("{}: {}", url, e)).into())
    }

    fn article_page(&self, envelope: &Value, url: &Url) -> Result<ArticlePage> {
        let items = list_in(envelope, ARTICLE_LIST_KEYS)
            .ok_or_else(|| Error::Shape(format!("{}: response has no article list", url)))?;
        let total = TOTAL_KEYS
            .iter()
            .find_map(|key| envelope.get(*key).and_then(Value::as_u64))
            .ok_or_else(|| Error::Shape(format!("{}: response has no total", url)))?;

        Ok(ArticlePage {
            articles: self.normalizer.normalize_articles(items),
            total,
        })
    }

    fn article_list(&self, envelope: &Value, url: &Url) -> Result<Vec<Article>> {
        let items = list_in(envelope, ARTICLE_LIST_KEYS)
            .ok_or_else(|| Error::Shape(format!("{}: response has no article list", url)))?;
        Ok(self.normalizer.normalize_articles(items))
    }

    async fn market_snapshot(&self, limit: u64) -> Result<MarketSnapshot> {
        let url = self.endpoint_with_query(&["api", "stocks", "trending"], &[("limit", limit.to_string())])?;
        let envelope = self.get_json(url.clone()).await?;
        let items = list_in(&envelope, &["stocks", "quotes", "data"])
            .ok_or_else(|| Error::Shape(format!("{}: response has no quote list", url)))?;

        Ok(MarketSnapshot {
            quotes: items.iter().map(|q| self.normalizer.normalize_quote(q)).collect(),
        })
    }
}

#[async_trait]
impl ContentSource for PrimaryClient {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn get_homepage(&self, locale: &str) -> Result<Homepage> {
        let layout = self.layout;
        let (recent, trending, market) = tokio::join!(
            self.list_recent(locale, PageWindow::new(0, layout.recent)),
            self.list_trending(locale, layout.trending),
            self.market_snapshot(layout.market),
        );

        let (recent, trending, market) = match (recent, trending, market) {
            (Err(err), Err(_), Err(_)) => {
                warn!("Every homepage branch failed: {}", err);
                return Err(err);
            }
            branches => branches,
        };

        // A failed branch only empties its own slots. Without recent articles
        // the homepage has no hero, but it is still primary data and is cached
        // for the full homepage TTL.
        let recent = degrade("recent", recent).map(|page| page.articles).unwrap_or_default();
        let (hero, featured) = hero_and_featured(recent);

        Ok(Homepage {
            hero,
            featured,
            trending: degrade("trending", trending).unwrap_or_default(),
            market: degrade("market", market).unwrap_or_default(),
        })
    }

    async fn get_article_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Article>> {
        let url = self.endpoint_with_query(&["api", "articles", slug], &[("locale", locale.to_string())])?;
        let Some(envelope) = found(self.get_json(url).await)? else {
            return Ok(None);
        };

        Ok(Some(self.normalizer.normalize_article(record_in(&envelope, "article"))))
    }

    async fn list_recent(&self, locale: &str, window: PageWindow) -> Result<ArticlePage> {
        let url = self.endpoint_with_query(
            &["api", "articles", "recent"],
            &[
                ("locale", locale.to_string()),
                ("skip", window.skip.to_string()),
                ("first", window.count.to_string()),
            ],
        )?;
        let envelope = self.get_json(url.clone()).await?;
        self.article_page(&envelope, &url)
    }

    async fn list_trending(&self, locale: &str, limit: u64) -> Result<Vec<Article>> {
        let url = self.endpoint_with_query(
            &["api", "articles", "trending"],
            &[("locale", locale.to_string()), ("first", limit.to_string())],
        )?;
        let envelope = self.get_json(url.clone()).await?;
        self.article_list(&envelope, &url)
    }

    async fn list_by_category_slug(&self, locale: &str, slug: &str, window: PageWindow) -> Result<ArticlePage> {
        let url = self.endpoint_with_query(
            &["api", "articles", "by-category-slug"],
            &[
                ("locale", locale.to_string()),
                ("categorySlug", slug.to_string()),
                ("skip", window.skip.to_string()),
                ("first", window.count.to_string()),
            ],
        )?;
        let envelope = self.get_json(url.clone()).await?;
        self.article_page(&envelope, &url)
    }

    async fn get_page_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Page>> {
        let url = self.endpoint_with_query(&["api", "pages", slug], &[("locale", locale.to_string())])?;
        let Some(envelope) = found(self.get_json(url).await)? else {
            return Ok(None);
        };

        Ok(Some(self.normalizer.normalize_page(record_in(&envelope, "page"))))
    }

    async fn list_categories(&self, locale: &str) -> Result<Vec<Category>> {
        let url = self.endpoint_with_query(&["api", "categories"], &[("locale", locale.to_string())])?;
        let envelope = self.get_json(url.clone()).await?;
        let items = list_in(&envelope, &["categories", "data", "items"])
            .ok_or_else(|| Error::Shape(format!("{}: response has no category list", url)))?;

        Ok(items.iter().map(|c| self.normalizer.normalize_category(c)).collect())
    }

    async fn count_articles(&self, locale: &str) -> Result<u64> {
        let url = self.endpoint_with_query(&["api", "articles", "count"], &[("locale", locale.to_string())])?;
        let envelope = self.get_json(url.clone()).await?;

        envelope
            .as_u64()
            .or_else(|| TOTAL_KEYS.iter().find_map(|key| envelope.get(*key).and_then(Value::as_u64)))
            .ok_or_else(|| Error::Shape(format!("{}: response has no count", url)))
    }

    async fn get_category_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Category>> {
        let url = self.endpoint_with_query(&["api", "categories", slug], &[("locale", locale.to_string())])?;
        let Some(envelope) = found(self.get_json(url).await)? else {
            return Ok(None);
        };

        Ok(Some(self.normalizer.normalize_category(record_in(&envelope, "category"))))
    }

    async fn list_articles_by_slugs(&self, locale: &str, slugs: &[String]) -> Result<Vec<Article>> {
        let url = self.endpoint(&["api", "articles", "by-slugs"])?;
        let request = self
            .client
            .post(url.clone())
            .json(&json!({ "locale": locale, "slugs": slugs }));
        let envelope = self.send(request, &url).await?;
        self.article_list(&envelope, &url)
    }

    async fn get_translations(&self, locale: &str) -> Result<Translations> {
        let url = self.endpoint_with_query(&["api", "translations"], &[("locale", locale.to_string())])?;
        let envelope = self.get_json(url.clone()).await?;
        if !envelope.is_object() {
            return Err(Error::Shape(format!("{}: translations must be an object", url)));
        }

        Ok(self.normalizer.normalize_translations(&envelope))
    }

    async fn get_quiz(&self, locale: &str, id: &str, skip: u64) -> Result<Quiz> {
        let url = self.endpoint_with_query(
            &["api", "quiz", id],
            &[("locale", locale.to_string()), ("skip", skip.to_string())],
        )?;
        let envelope = self.get_json(url).await?;
        Ok(self.normalizer.normalize_quiz(record_in(&envelope, "quiz"), id))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = self.endpoint(&["api", "health"])?;
        match self.get_json(url).await {
            Ok(_) => Ok(true),
            Err(Error::Source(SourceError::Status { .. })) | Err(Error::Source(SourceError::Decode(_))) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .gzip(true)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// First array under `keys`, or the envelope itself when it is a bare array.
fn list_in<'a>(envelope: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    envelope
        .as_array()
        .or_else(|| keys.iter().find_map(|key| envelope.get(*key).and_then(Value::as_array)))
}

/// Single-record endpoints either wrap the record under `key` or return it bare.
fn record_in<'a>(envelope: &'a Value, key: &str) -> &'a Value {
    envelope.get(key).filter(|v| v.is_object()).unwrap_or(envelope)
}

/// Turn a 404 into `Ok(None)`.
fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

fn degrade<T>(branch: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Homepage {} branch failed, leaving it empty: {}", branch, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> PrimaryClient {
        let normalizer = Arc::new(Normalizer::new().unwrap());
        PrimaryClient::new(&server.uri(), normalizer).unwrap()
    }

    fn article_json(slug: &str) -> Value {
        json!({
            "id": format!("id-{}", slug),
            "title": format!("Title {}", slug),
            "slug": slug,
            "body": "<p>Body</p>",
            "author": { "id": "a1", "name": "John Doe" },
            "tags": [{ "name": "tech" }],
            "image_url": "/img.png",
        })
    }

    #[tokio::test]
    async fn test_list_recent_parses_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/articles/recent"))
            .and(query_param("locale", "en"))
            .and(query_param("skip", "0"))
            .and(query_param("first", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "articles": [article_json("one"), article_json("two")],
                "total": 10,
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let page = client.list_recent("en", PageWindow::new(0, 2)).await.unwrap();

        assert_eq!(page.total, 10);
        assert_eq!(page.articles.len(), 2);
        assert_eq!(page.articles[0].slug, "one");
        assert_eq!(page.articles[0].body.plain_text(), "Body");
        assert_eq!(page.articles[0].tags[0].tag, "tech");
        assert_eq!(page.articles[0].image.as_ref().unwrap().alt, "Title one");
    }

    #[tokio::test]
    async fn test_missing_total_is_shape_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/articles/recent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "articles": [] })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.list_recent("en", PageWindow::new(0, 6)).await.unwrap_err();

        assert_eq!(err.error_code(), "SHAPE");
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_server_error_is_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/categories"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.list_categories("en").await.unwrap_err();

        assert!(matches!(err, Error::Source(SourceError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/articles/count"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.count_articles("en").await.unwrap_err();

        assert_eq!(err.error_code(), "DECODE");
    }

    #[tokio::test]
    async fn test_count_accepts_object_or_number() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/articles/count"))
            .and(query_param("locale", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 42 })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/articles/count"))
            .and(query_param("locale", "fr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(7)))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        assert_eq!(client.count_articles("en").await.unwrap(), 42);
        assert_eq!(client.count_articles("fr").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_article_not_found_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/articles/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        assert!(client.get_article_by_slug("en", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_article_by_slug_unwraps_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/articles/one"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "article": article_json("one") })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let article = client.get_article_by_slug("en", "one").await.unwrap().unwrap();

        assert_eq!(article.id, "id-one");
        assert_eq!(article.author.name, "John Doe");
    }

    #[tokio::test]
    async fn test_by_slugs_posts_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/articles/by-slugs"))
            .and(body_json(json!({ "locale": "en", "slugs": ["one", "two"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "articles": [article_json("one"), article_json("two")],
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let slugs = vec!["one".to_string(), "two".to_string()];
        let articles = client.list_articles_by_slugs("en", &slugs).await.unwrap();

        assert_eq!(articles.len(), 2);
    }

    #[tokio::test]
    async fn test_homepage_degrades_failed_branch() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/articles/recent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "articles": [article_json("hero"), article_json("second")],
                "total": 2,
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/articles/trending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "articles": [article_json("hot")],
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/stocks/trending"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let homepage = client.get_homepage("en").await.unwrap();

        assert_eq!(homepage.hero.unwrap().slug, "hero");
        assert_eq!(homepage.featured.len(), 1);
        assert_eq!(homepage.trending[0].slug, "hot");
        assert!(homepage.market.is_empty());
    }

    #[tokio::test]
    async fn test_homepage_fails_when_every_branch_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        assert!(client.get_homepage("en").await.is_err());
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/categories"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "categories": [] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server)
            .with_timeout(Duration::from_millis(100))
            .unwrap();
        let err = client.list_categories("en").await.unwrap_err();

        assert_eq!(err.error_code(), "TIMEOUT");
    }

    #[tokio::test]
    async fn test_health_check() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        assert!(client.health_check().await.unwrap());
    }

    #[test]
    fn test_endpoint_encodes_slugs_and_keeps_base_path() {
        let normalizer = Arc::new(Normalizer::new().unwrap());
        let client = PrimaryClient::new("http://backend.local/v1/", normalizer).unwrap();

        let url = client.endpoint(&["api", "articles", "a b"]).unwrap();
        assert_eq!(url.as_str(), "http://backend.local/v1/api/articles/a%20b");
    }

    #[test]
    fn test_invalid_base_url() {
        let normalizer = Arc::new(Normalizer::new().unwrap());
        let err = PrimaryClient::new("not a url", normalizer).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_URL");
    }
}
