pub mod normalizer;

pub use normalizer::{parse_timestamp, Normalizer, DEFAULT_LOCALE};
