use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

use crate::aggregator::Aggregator;
use crate::cli::Cli;
use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};

pub async fn homepage(aggregator: &Aggregator, locale: &str) -> Result<()> {
    print_json(&aggregator.get_homepage(locale).await?)
}

pub async fn article(aggregator: &Aggregator, locale: &str, slug: &str) -> Result<()> {
    match aggregator.get_article_by_slug(locale, slug).await? {
        Some(article) => print_json(&article),
        None => Err(Error::NotFound(format!("Article '{}'", slug))),
    }
}

pub async fn recent(aggregator: &Aggregator, locale: &str, skip: i64, count: i64) -> Result<()> {
    print_json(&aggregator.list_recent_articles(locale, skip, count).await?)
}

pub async fn recent_with_main(aggregator: &Aggregator, locale: &str, skip: i64, count: i64) -> Result<()> {
    print_json(&aggregator.list_recent_with_main(locale, skip, count).await?)
}

pub async fn trending(aggregator: &Aggregator, locale: &str, count: i64) -> Result<()> {
    print_json(&aggregator.list_trending_articles(locale, count).await?)
}

pub async fn category(aggregator: &Aggregator, locale: &str, slug: &str, skip: i64, count: i64) -> Result<()> {
    let (category, page) = tokio::join!(
        aggregator.get_category_by_slug(locale, slug),
        aggregator.list_articles_by_category_slug(locale, slug, skip, count),
    );

    print_json(&json!({
        "category": category?,
        "page": page?,
    }))
}

pub async fn page(aggregator: &Aggregator, locale: &str, slug: &str) -> Result<()> {
    match aggregator.get_page_by_slug(locale, slug).await? {
        Some(page) => print_json(&page),
        None => Err(Error::NotFound(format!("Page '{}'", slug))),
    }
}

pub async fn categories(aggregator: &Aggregator, locale: &str) -> Result<()> {
    print_json(&aggregator.list_categories(locale).await?)
}

pub async fn count(aggregator: &Aggregator, locale: &str) -> Result<()> {
    print_json(&json!({ "count": aggregator.count_articles(locale).await? }))
}

pub async fn translations(aggregator: &Aggregator, locale: &str) -> Result<()> {
    print_json(&aggregator.get_translations(locale).await?)
}

pub async fn quiz(aggregator: &Aggregator, locale: &str, id: &str, skip: i64) -> Result<()> {
    print_json(&aggregator.get_quiz(locale, id, skip).await?)
}

pub async fn health(aggregator: &Aggregator, config: &Config) -> Result<()> {
    let available = aggregator.primary_available().await;
    info!("Primary backend {} available: {}", config.source.base_url, available);

    print_json(&json!({
        "backend": config.source.base_url,
        "available": available,
        "serving": if available { "primary" } else { "fallback" },
    }))
}

/// Write the default configuration to `path` or the user config directory.
pub fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::default_config_file()?,
    };

    if path.exists() && !force {
        return Err(Error::Invalid(format!(
            "Configuration file already exists: {} (use --force to overwrite)",
            path.display()
        )));
    }

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    Config::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

/// Install the global subscriber. Logs go to stderr, or to `logging.log_file`
/// through a non-blocking writer; keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let (writer, guard) = if logging.log_to_file {
        let path = Path::new(&logging.log_file);
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Config(format!("Invalid log file path: {}", logging.log_file)))?;
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let (non_blocking, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        (BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (BoxMakeWriter::new(io::stderr), None)
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .with_file(debug)
        .with_line_number(debug);

    let installed = if logging.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging initialized");
    Ok(guard)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
