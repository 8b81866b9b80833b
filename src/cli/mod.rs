pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "news-aggregator")]
#[command(about = "Query news content through the cached, fallback-backed aggregation layer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Content locale; unsupported values fall back to the default locale
    #[arg(short, long, global = true, default_value = "en")]
    pub locale: String,

    /// Override the primary backend URL
    #[arg(long, global = true, env = "NEWS_AGGREGATOR_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Homepage composite: hero, featured, trending and market data
    Homepage,

    /// Single article by slug
    Article {
        slug: String,
    },

    /// Recent articles
    Recent {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        skip: i64,

        /// Page size; 0 uses the configured default
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        count: i64,
    },

    /// Newest article plus a page of the ones after it
    RecentWithMain {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        skip: i64,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        count: i64,
    },

    /// Most viewed articles
    Trending {
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        count: i64,
    },

    /// Articles in a category
    Category {
        slug: String,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        skip: i64,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        count: i64,
    },

    /// Static page by slug
    Page {
        slug: String,
    },

    /// All categories
    Categories,

    /// Total number of articles
    Count,

    /// Translation table for the locale
    Translations,

    /// Quiz questions
    Quiz {
        id: String,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        skip: i64,
    },

    /// Check whether the primary backend is reachable
    Health,

    /// Write a default configuration file
    Init {
        /// Target path (defaults to the user config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let Cli {
            command,
            config,
            locale,
            backend_url,
            verbose,
            debug,
        } = self;

        match command {
            Commands::Completions { shell } => {
                commands::generate_completions(shell);
                return Ok(());
            }
            Commands::Init { path, force } => return commands::init(path, force),
            _ => {}
        }

        let config = load_config(config, backend_url)?;
        let _guard = commands::init_logging(debug, verbose, &config.logging)?;
        let aggregator = Aggregator::from_config(&config)?;
        let locale = locale.as_str();

        match command {
            Commands::Homepage => commands::homepage(&aggregator, locale).await,
            Commands::Article { slug } => commands::article(&aggregator, locale, &slug).await,
            Commands::Recent { skip, count } => commands::recent(&aggregator, locale, skip, count).await,
            Commands::RecentWithMain { skip, count } => {
                commands::recent_with_main(&aggregator, locale, skip, count).await
            }
            Commands::Trending { count } => commands::trending(&aggregator, locale, count).await,
            Commands::Category { slug, skip, count } => {
                commands::category(&aggregator, locale, &slug, skip, count).await
            }
            Commands::Page { slug } => commands::page(&aggregator, locale, &slug).await,
            Commands::Categories => commands::categories(&aggregator, locale).await,
            Commands::Count => commands::count(&aggregator, locale).await,
            Commands::Translations => commands::translations(&aggregator, locale).await,
            Commands::Quiz { id, skip } => commands::quiz(&aggregator, locale, &id, skip).await,
            Commands::Health => commands::health(&aggregator, &config).await,
            Commands::Init { .. } | Commands::Completions { .. } => Ok(()),
        }
    }
}

fn load_config(path: Option<PathBuf>, backend_url: Option<String>) -> Result<Config> {
    let mut config = Config::load_or_default(path.as_deref())?;
    if let Some(url) = backend_url {
        config.source.base_url = url;
        config.validate()?;
    }
    Ok(config)
}
