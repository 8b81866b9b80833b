pub mod aggregator;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod fallback;
pub mod model;
pub mod pagination;
pub mod source;
pub mod storage;

pub use aggregator::Aggregator;
pub use config::Config;
pub use error::{Error, Result};
