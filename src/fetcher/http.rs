use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use super::PageFetcher;
use crate::config::ScraperConfig;
use crate::utils::error::{AppError, FetchError};

/// Plain HTTP fetcher with retry on transient failures.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay_ms: u64,
    request_delay: Duration,
}

/// Client with the configured user agent and timeout. Also used for image downloads.
pub fn build_client(config: &ScraperConfig) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(|e| AppError::Fetcher(format!("Failed to build HTTP client: {}", e)))
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config)?,
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
            request_delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify(url, e))
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        // Delays of retry_delay, 2x, 4x ... capped at 30s.
        let strategy = ExponentialBackoff::from_millis(2)
            .factor((self.retry_delay_ms / 2).max(1))
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.retry_attempts as usize);

        let result = RetryIf::start(
            strategy,
            move || async move {
                let attempt = self.fetch_once(url).await;
                if let Err(e) = &attempt {
                    debug!("Fetch attempt for {} failed: {}", url, e);
                }
                attempt
            },
            |e: &FetchError| e.is_transient(),
        )
        .await;

        if let Err(e) = &result {
            warn!("Giving up on {}: {}", url, e);
        }
        result
    }
}
