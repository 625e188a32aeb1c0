use thiserror::Error;

/// Run-scoped failures. Anything that reaches `main` as an `AppError` ends the run.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Fetcher error: {0}")]
    Fetcher(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

/// A single page fetch failed after the fetcher's own retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Browser error for {url}: {message}")]
    Browser { url: String, message: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status: 404, .. })
    }

    /// Network hiccups, 5xx and 429 are worth another attempt. Other statuses are final.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Browser { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Listing page {page} ({url}) could not be fetched: {source}")]
    ListingFetch {
        page: u32,
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid listing URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Only a failed page fetch fails a whole record; missing fields never do.
#[derive(Error, Debug, Clone)]
pub enum ExtractionError {
    #[error("Product page could not be fetched: {0}")]
    Fetch(#[from] FetchError),
}

#[derive(Error, Debug)]
pub enum ImageDownloadError {
    #[error("Invalid image URL {url}")]
    InvalidUrl { url: String },

    #[error("Image request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Could not write image {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("{sink}: IO error: {source}")]
    Io {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{sink}: encoding error: {message}")]
    Encode { sink: String, message: String },

    #[error("{sink}: database error: {source}")]
    Database {
        sink: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("All configured sinks failed ({failed}) and the fallback dump failed: {message}")]
    Exhausted { failed: usize, message: String },
}

pub type Result<T> = std::result::Result<T, AppError>;
