use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{FetcherKind, ScraperConfig};
use crate::utils::error::{AppError, FetchError};

pub mod browser;
pub mod http;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

/// Turns a URL into page HTML. Implementations own their retry policy; a returned error is
/// final for that call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        (**self).fetch(url).await
    }
}

/// Build the fetcher selected in configuration.
pub fn build_fetcher(config: &ScraperConfig) -> Result<Arc<dyn PageFetcher>, AppError> {
    match config.fetcher {
        FetcherKind::Http => Ok(Arc::new(HttpFetcher::new(config)?)),
        FetcherKind::Browser => Ok(Arc::new(BrowserFetcher::new(config)?)),
    }
}
