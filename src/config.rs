use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Primary backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Cache sizing and per-kind TTLs, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_coalesce_misses")]
    pub coalesce_misses: bool,

    #[serde(default = "default_homepage_ttl")]
    pub homepage_ttl: u64,

    #[serde(default = "default_article_ttl")]
    pub article_ttl: u64,

    #[serde(default = "default_list_ttl")]
    pub list_ttl: u64,

    #[serde(default = "default_category_ttl")]
    pub category_ttl: u64,

    #[serde(default = "default_page_ttl")]
    pub page_ttl: u64,

    #[serde(default = "default_translations_ttl")]
    pub translations_ttl: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_recent_per_page")]
    pub recent_per_page: u64,

    #[serde(default = "default_category_per_page")]
    pub category_per_page: u64,

    #[serde(default = "default_trending_count")]
    pub trending_count: u64,

    /// Recent articles fetched for the homepage: one hero plus featured.
    #[serde(default = "default_homepage_recent")]
    pub homepage_recent: u64,

    #[serde(default = "default_market_quotes")]
    pub market_quotes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_locale")]
    pub default: String,

    #[serde(default = "default_supported_locales")]
    pub supported: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default)]
    pub json_format: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|_| Error::NotFound(path.as_ref().display().to_string()))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise start from defaults. Environment
    /// overrides apply either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::default_config_file() {
                Ok(file) if file.exists() => Self::load(&file)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.source.base_url)
            .map_err(|e| Error::Config(format!("Invalid backend URL {}: {}", self.source.base_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Backend URL must use http or https: {}",
                self.source.base_url
            )));
        }

        if self.source.timeout == 0 {
            return Err(Error::Config("Source timeout must be greater than 0".to_string()));
        }

        if self.cache.max_entries == 0 {
            return Err(Error::Config("Cache max_entries must be greater than 0".to_string()));
        }

        if self.pagination.recent_per_page == 0 || self.pagination.category_per_page == 0 {
            return Err(Error::Config("Page sizes must be greater than 0".to_string()));
        }

        if !self.locale.supported.iter().any(|l| l == &self.locale.default) {
            return Err(Error::Config(format!(
                "Default locale {} is not in the supported list",
                self.locale.default
            )));
        }

        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("NEWS_AGGREGATOR_BACKEND_URL") {
            if !url.is_empty() {
                self.source.base_url = url;
            }
        }

        if let Ok(timeout) = std::env::var("NEWS_AGGREGATOR_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                self.source.timeout = val;
            }
        }

        if let Ok(level) = std::env::var("NEWS_AGGREGATOR_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("news-aggregator"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    pub fn default_config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            cache: CacheSettings::default(),
            pagination: PaginationConfig::default(),
            locale: LocaleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SourceConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl CacheSettings {
    pub fn homepage(&self) -> Duration {
        Duration::from_secs(self.homepage_ttl)
    }

    pub fn article(&self) -> Duration {
        Duration::from_secs(self.article_ttl)
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_ttl)
    }

    pub fn category(&self) -> Duration {
        Duration::from_secs(self.category_ttl)
    }

    pub fn page(&self) -> Duration {
        Duration::from_secs(self.page_ttl)
    }

    pub fn translations(&self) -> Duration {
        Duration::from_secs(self.translations_ttl)
    }
}

impl LocaleConfig {
    /// Map a requested locale onto a supported one, defaulting when unknown.
    pub fn resolve(&self, requested: &str) -> String {
        let requested = requested.trim().to_ascii_lowercase();
        // "en-US" style tags fall back to their language.
        let language = requested.split(['-', '_']).next().unwrap_or_default();

        self.supported
            .iter()
            .find(|l| **l == requested || **l == language)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            coalesce_misses: default_coalesce_misses(),
            homepage_ttl: default_homepage_ttl(),
            article_ttl: default_article_ttl(),
            list_ttl: default_list_ttl(),
            category_ttl: default_category_ttl(),
            page_ttl: default_page_ttl(),
            translations_ttl: default_translations_ttl(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            recent_per_page: default_recent_per_page(),
            category_per_page: default_category_per_page(),
            trending_count: default_trending_count(),
            homepage_recent: default_homepage_recent(),
            market_quotes: default_market_quotes(),
        }
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default: default_locale(),
            supported: default_supported_locales(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_to_file: false,
            log_file: default_log_file(),
            json_format: false,
        }
    }
}

fn default_base_url() -> String { "http://localhost:5000".to_string() }
fn default_timeout() -> u64 { 10 }
fn default_user_agent() -> String {
    format!("news-aggregator/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_entries() -> usize { 1000 }
fn default_coalesce_misses() -> bool { true }
fn default_homepage_ttl() -> u64 { 120 }
fn default_article_ttl() -> u64 { 600 }
fn default_list_ttl() -> u64 { 300 }
fn default_category_ttl() -> u64 { 3600 }
fn default_page_ttl() -> u64 { 1800 }
fn default_translations_ttl() -> u64 { 3600 }

fn default_recent_per_page() -> u64 { 6 }
fn default_category_per_page() -> u64 { 4 }
fn default_trending_count() -> u64 { 3 }
fn default_homepage_recent() -> u64 { 5 }
fn default_market_quotes() -> u64 { 6 }

fn default_locale() -> String { "en".to_string() }
fn default_supported_locales() -> Vec<String> {
    ["en", "es", "fr", "de", "it", "pt", "ja", "ko", "zh", "ar"]
        .iter()
        .map(|l| l.to_string())
        .collect()
}

fn default_log_level() -> String { "warn".to_string() }
fn default_log_file() -> String { "logs/news-aggregator.log".to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.homepage(), Duration::from_secs(120));
        assert_eq!(config.cache.article(), Duration::from_secs(600));
        assert_eq!(config.cache.category(), Duration::from_secs(3600));
        assert_eq!(config.cache.page(), Duration::from_secs(1800));
        assert_eq!(config.pagination.recent_per_page, 6);
        assert_eq!(config.pagination.category_per_page, 4);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[source]
base_url = "https://api.example.com"
timeout = 3

[cache]
homepage_ttl = 30
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.source.base_url, "https://api.example.com");
        assert_eq!(config.source.timeout_duration(), Duration::from_secs(3));
        assert_eq!(config.cache.homepage_ttl, 30);
        assert_eq!(config.cache.article_ttl, 600);
        assert_eq!(config.locale.default, "en");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut config = Config::default();
        config.source.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.source.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.source.timeout = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_locale_resolution() {
        let locales = LocaleConfig::default();
        assert_eq!(locales.resolve("fr"), "fr");
        assert_eq!(locales.resolve("DE"), "de");
        assert_eq!(locales.resolve("pt-BR"), "pt");
        assert_eq!(locales.resolve("xx"), "en");
        assert_eq!(locales.resolve(""), "en");
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.source.base_url = "https://news.example.com".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.source.base_url, "https://news.example.com");
    }
}
