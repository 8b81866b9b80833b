use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::model::{Article, ArticlePage, Category, Homepage, Page, Quiz, Translations};
use crate::storage::CacheStore;

/// Shape check applied to primary results before they are cached.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<()> {
        match self {
            Some(value) => value.validate(),
            None => Err(Error::Shape("record not found".to_string())),
        }
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<()> {
        self.iter().try_for_each(Validate::validate)
    }
}

impl Validate for u64 {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl Validate for Article {
    fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.slug.is_empty() {
            return Err(Error::Shape("article without id or slug".to_string()));
        }
        Ok(())
    }
}

impl Validate for Category {
    fn validate(&self) -> Result<()> {
        if self.slug.is_empty() {
            return Err(Error::Shape("category without slug".to_string()));
        }
        Ok(())
    }
}

impl Validate for Page {
    fn validate(&self) -> Result<()> {
        if self.slug.is_empty() {
            return Err(Error::Shape("page without slug".to_string()));
        }
        Ok(())
    }
}

impl Validate for ArticlePage {
    fn validate(&self) -> Result<()> {
        if (self.articles.len() as u64) > self.total {
            return Err(Error::Shape(format!(
                "page holds {} articles but reports a total of {}",
                self.articles.len(),
                self.total
            )));
        }
        self.articles.validate()
    }
}

impl Validate for Homepage {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Shape("homepage has no content".to_string()));
        }
        self.hero.iter().try_for_each(Validate::validate)?;
        self.featured.validate()?;
        self.trending.validate()
    }
}

impl Validate for Quiz {
    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::Shape("quiz without id".to_string()));
        }
        Ok(())
    }
}

impl Validate for Translations {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Shape("empty translation table".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FallbackStats {
    pub cache_hits: u64,
    pub primary_successes: u64,
    pub fallbacks: u64,
    /// Misses answered by another caller's fetch: from the cache it filled,
    /// or from the secondary after it failed.
    pub coalesced: u64,
}

/// Per-key lock. The flag records that the fetch holding it failed, and
/// stays set until every caller queued on the key has gone.
type FlightSlot = Arc<Mutex<bool>>;

/// Cache, then primary, then secondary.
///
/// Primary failures never reach the caller. Only the secondary's own errors
/// propagate, and those indicate a broken fallback dataset.
pub struct FallbackOrchestrator {
    cache: CacheStore,
    inflight: DashMap<String, FlightSlot>,
    coalesce_misses: bool,
    stats: RwLock<FallbackStats>,
}

impl FallbackOrchestrator {
    pub fn new(cache: CacheStore) -> Self {
        Self {
            cache,
            inflight: DashMap::new(),
            coalesce_misses: true,
            stats: RwLock::new(FallbackStats::default()),
        }
    }

    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce_misses = enabled;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn stats(&self) -> FallbackStats {
        self.stats.read().clone()
    }

    /// Serve `key` from cache, else from `primary` (cached on success), else
    /// from `secondary` (never cached).
    pub async fn execute<T, P, S>(&self, key: &str, ttl: Duration, primary: P, secondary: S) -> Result<T>
    where
        T: Validate + Clone + Send + Sync + 'static,
        P: Future<Output = Result<T>>,
        S: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.cache.get::<T>(key) {
            debug!("Cache hit for {}", key);
            self.stats.write().cache_hits += 1;
            return Ok(hit);
        }

        let mut flight = None;
        if self.coalesce_misses {
            let joined = self.join_flight(key).await;
            if let Some(hit) = self.cache.get::<T>(key) {
                debug!("Cache filled for {} while waiting", key);
                self.stats.write().coalesced += 1;
                return Ok(hit);
            }
            if joined.primary_failed() {
                debug!("Primary already failed for {} in this flight, serving fallback data", key);
                {
                    let mut stats = self.stats.write();
                    stats.coalesced += 1;
                    stats.fallbacks += 1;
                }
                drop(joined);
                return secondary.await;
            }
            flight = Some(joined);
        }

        match primary.await.and_then(|value| value.validate().map(|_| value)) {
            Ok(value) => {
                self.stats.write().primary_successes += 1;
                Ok(self.cache.set(key, value, ttl))
            }
            Err(err) => {
                if err.is_recoverable() {
                    warn!("Primary source failed for {}, serving fallback data: {}", key, err);
                } else {
                    error!("Unexpected primary error for {}, serving fallback data: {}", key, err);
                }
                self.stats.write().fallbacks += 1;
                if let Some(flight) = flight.as_mut() {
                    flight.mark_failed();
                }
                // Release the key so queued callers can reach the secondary.
                drop(flight);
                secondary.await
            }
        }
    }

    async fn join_flight<'a>(&'a self, key: &'a str) -> Flight<'a> {
        let lock = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(false)))
            .clone();

        Flight {
            key,
            inflight: &self.inflight,
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Holds the per-key lock for one primary fetch. The map entry is dropped
/// once nobody else is waiting on it.
struct Flight<'a> {
    key: &'a str,
    inflight: &'a DashMap<String, FlightSlot>,
    guard: Option<OwnedMutexGuard<bool>>,
}

impl Flight<'_> {
    fn primary_failed(&self) -> bool {
        self.guard.as_deref().copied().unwrap_or(false)
    }

    fn mark_failed(&mut self) {
        if let Some(failed) = self.guard.as_mut() {
            **failed = true;
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.inflight
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn article(slug: &str) -> Article {
        Article {
            id: format!("id-{}", slug),
            title: slug.to_string(),
            slug: slug.to_string(),
            excerpt: None,
            body: Default::default(),
            published_at: None,
            updated_at: None,
            locale: "en".to_string(),
            views: 0,
            tags: Vec::new(),
            image: None,
            author: Default::default(),
            category: None,
        }
    }

    fn page_of(slugs: &[&str], total: u64) -> ArticlePage {
        ArticlePage {
            articles: slugs.iter().map(|s| article(s)).collect(),
            total,
        }
    }

    fn down<T>() -> Result<T> {
        Err(SourceError::Http("connection refused".to_string()).into())
    }

    #[tokio::test]
    async fn test_primary_success_is_cached() {
        let orchestrator = FallbackOrchestrator::new(CacheStore::default());
        let ttl = Duration::from_secs(60);

        let first = orchestrator
            .execute("recent:en", ttl, async { Ok(page_of(&["a"], 1)) }, async { Ok(page_of(&["fb"], 1)) })
            .await
            .unwrap();
        assert_eq!(first.articles[0].slug, "a");

        let second = orchestrator
            .execute("recent:en", ttl, async { down::<ArticlePage>() }, async { Ok(page_of(&["fb"], 1)) })
            .await
            .unwrap();
        assert_eq!(second, first);

        let stats = orchestrator.stats();
        assert_eq!(stats.primary_successes, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.fallbacks, 0);
    }

    #[tokio::test]
    async fn test_primary_failure_serves_uncached_fallback() {
        let orchestrator = FallbackOrchestrator::new(CacheStore::default());

        let value = orchestrator
            .execute("count:en", Duration::from_secs(60), async { down::<u64>() }, async { Ok(2u64) })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert!(orchestrator.cache().is_empty());
        assert_eq!(orchestrator.stats().fallbacks, 1);
    }

    #[tokio::test]
    async fn test_invalid_shape_falls_back() {
        let orchestrator = FallbackOrchestrator::new(CacheStore::default());

        // More articles than the reported total.
        let value = orchestrator
            .execute(
                "recent:en",
                Duration::from_secs(60),
                async { Ok(page_of(&["a", "b"], 1)) },
                async { Ok(page_of(&["fb"], 1)) },
            )
            .await
            .unwrap();

        assert_eq!(value.articles[0].slug, "fb");
        assert!(orchestrator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_missing_record_falls_back() {
        let orchestrator = FallbackOrchestrator::new(CacheStore::default());

        let value = orchestrator
            .execute(
                "article:en:x",
                Duration::from_secs(60),
                async { Ok(None::<Article>) },
                async { Ok(Some(article("x"))) },
            )
            .await
            .unwrap();

        assert_eq!(value.unwrap().slug, "x");
    }

    #[tokio::test]
    async fn test_secondary_errors_propagate() {
        let orchestrator = FallbackOrchestrator::new(CacheStore::default());

        let err = orchestrator
            .execute(
                "count:en",
                Duration::from_secs(60),
                async { down::<u64>() },
                async { Err::<u64, _>(Error::Config("broken dataset".to_string())) },
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "CONFIG");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_coalesce() {
        let orchestrator = Arc::new(FallbackOrchestrator::new(CacheStore::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    orchestrator
                        .execute(
                            "count:en",
                            Duration::from_secs(60),
                            async {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(50)).await;
                                Ok(10u64)
                            },
                            async { Ok(0u64) },
                        )
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 10);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(orchestrator.inflight.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiters_skip_a_primary_that_just_failed() {
        let orchestrator = Arc::new(FallbackOrchestrator::new(CacheStore::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let started = std::time::Instant::now();

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    orchestrator
                        .execute(
                            "count:en",
                            Duration::from_secs(60),
                            async {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(200)).await;
                                down::<u64>()
                            },
                            async { Ok(2u64) },
                        )
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 2);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(600));
        assert!(orchestrator.cache().is_empty());
        assert!(orchestrator.inflight.is_empty());

        let stats = orchestrator.stats();
        assert_eq!(stats.fallbacks, 5);
        assert_eq!(stats.coalesced, 4);
    }

    #[tokio::test]
    async fn test_failed_flight_does_not_outlive_its_waiters() {
        let orchestrator = FallbackOrchestrator::new(CacheStore::default());

        let first = orchestrator
            .execute("count:en", Duration::from_secs(60), async { down::<u64>() }, async { Ok(2u64) })
            .await
            .unwrap();
        assert_eq!(first, 2);

        // A later caller gets a fresh flight and tries the primary again.
        let second = orchestrator
            .execute("count:en", Duration::from_secs(60), async { Ok(7u64) }, async { Ok(2u64) })
            .await
            .unwrap();
        assert_eq!(second, 7);
    }

    #[test]
    fn test_validation_rules() {
        assert!(page_of(&["a"], 1).validate().is_ok());
        assert!(page_of(&[], 0).validate().is_ok());
        assert!(page_of(&["a", "b"], 1).validate().is_err());
        assert!(Homepage::default().validate().is_err());
        assert!(Translations::new().validate().is_err());
        assert!(Some(article("a")).validate().is_ok());
        assert!(None::<Article>.validate().is_err());

        let mut broken = article("a");
        broken.slug.clear();
        assert!(vec![article("b"), broken].validate().is_err());
    }
}
