use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the primary backend. Always recoverable: the
/// fallback orchestrator swaps in the secondary source when it sees one.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Source(err.into())
    }
}

impl Error {
    /// Expected primary failures. Anything else is logged as an error before
    /// the orchestrator falls back.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Source(_) | Error::Shape(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::Source(SourceError::Status { status: 404, .. })
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Source(SourceError::Http(_)) => "HTTP_ERROR",
            Error::Source(SourceError::Status { .. }) => "HTTP_STATUS",
            Error::Source(SourceError::Timeout(_)) => "TIMEOUT",
            Error::Source(SourceError::Decode(_)) => "DECODE",
            Error::Source(SourceError::InvalidUrl(_)) => "INVALID_URL",
            Error::Shape(_) => "SHAPE",
            Error::Config(_) => "CONFIG",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Invalid(_) => "INVALID",
        }
    }
}
