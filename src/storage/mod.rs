pub mod cache;

pub use cache::{CacheConfig, CacheEntry, CacheStats, CacheStore};
