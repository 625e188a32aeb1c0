use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::PageFetcher;
use crate::config::ScraperConfig;
use crate::utils::error::{AppError, FetchError};

/// Small round-robin pool of headless Chrome instances.
pub struct BrowserPool {
    browsers: Vec<Browser>,
    current_index: AtomicUsize,
}

impl BrowserPool {
    pub fn new(config: &ScraperConfig) -> Result<Self, AppError> {
        let mut browsers = Vec::new();

        // Chrome is heavy; tabs are cheap. Never more than three processes.
        for _ in 0..config.max_threads.clamp(1, 3) {
            let mut launch_options = LaunchOptions::default_builder()
                .headless(true)
                .sandbox(false)
                .window_size(Some((1920, 1080)))
                .args(vec![
                    std::ffi::OsStr::new("--no-sandbox"),
                    std::ffi::OsStr::new("--disable-dev-shm-usage"),
                    std::ffi::OsStr::new("--disable-gpu"),
                    std::ffi::OsStr::new("--disable-extensions"),
                ])
                .build()
                .map_err(|e| AppError::Fetcher(format!("Failed to create launch options: {}", e)))?;

            if let Some(chrome_path) = &config.chrome_path {
                launch_options.path = Some(std::path::PathBuf::from(chrome_path));
            }

            let browser = Browser::new(launch_options)
                .map_err(|e| AppError::Fetcher(format!("Failed to launch browser: {}", e)))?;
            browsers.push(browser);
        }

        Ok(Self {
            browsers,
            current_index: AtomicUsize::new(0),
        })
    }

    pub fn get_browser(&self) -> Browser {
        let index = self.current_index.fetch_add(1, Ordering::Relaxed) % self.browsers.len();
        self.browsers[index].clone()
    }
}

/// Fetcher for storefronts that render their catalog with JavaScript.
pub struct BrowserFetcher {
    pool: Arc<BrowserPool>,
    user_agent: String,
    timeout: Duration,
    page_load_delay: Duration,
}

impl BrowserFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self, AppError> {
        Ok(Self {
            pool: Arc::new(BrowserPool::new(config)?),
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout),
            page_load_delay: Duration::from_millis(config.page_load_delay),
        })
    }
}

fn render(
    browser: &Browser,
    url: &str,
    user_agent: &str,
    timeout: Duration,
    page_load_delay: Duration,
) -> Result<String, FetchError> {
    let browser_err = |e: anyhow::Error| FetchError::Browser {
        url: url.to_string(),
        message: e.to_string(),
    };

    let tab = browser.new_tab().map_err(browser_err)?;
    let content = load_content(&tab, url, user_agent, timeout, page_load_delay);
    // The tab is closed whether or not the page loaded.
    let _ = tab.close(true);
    content.map_err(browser_err)
}

fn load_content(
    tab: &Tab,
    url: &str,
    user_agent: &str,
    timeout: Duration,
    page_load_delay: Duration,
) -> anyhow::Result<String> {
    tab.set_default_timeout(timeout);
    tab.set_user_agent(user_agent, None, None)?;
    tab.navigate_to(url)?.wait_until_navigated()?;

    if !page_load_delay.is_zero() {
        std::thread::sleep(page_load_delay);
    }

    tab.get_content()
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let browser = self.pool.get_browser();
        let owned_url = url.to_string();
        let user_agent = self.user_agent.clone();
        let timeout = self.timeout;
        let delay = self.page_load_delay;

        debug!("Rendering {} in headless Chrome", url);

        // headless_chrome blocks; keep it off the async workers.
        tokio::task::spawn_blocking(move || render(&browser, &owned_url, &user_agent, timeout, delay))
            .await
            .map_err(|e| FetchError::Browser {
                url: url.to_string(),
                message: format!("Render task failed: {}", e),
            })?
    }
}
