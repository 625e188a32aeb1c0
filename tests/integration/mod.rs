// Shared fixtures for the end-to-end tests: an in-memory storefront and config builders.

pub mod crawl_tests;
pub mod persistence_tests;
pub mod pipeline_tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use woo_scraper::{
    AppConfig, Pipeline, ProductRecord,
    config::OutputFormat,
    fetcher::PageFetcher,
    persistence::PersistenceCoordinator,
    pipeline::ShutdownController,
    utils::error::FetchError,
};

pub const BASE_URL: &str = "https://shop.example.com/shop/";

type FetchHook = Box<dyn Fn(&str, usize) + Send + Sync>;

/// Serves canned pages by URL; anything else is a 404.
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    product_fetches: AtomicUsize,
    on_product_fetch: Option<FetchHook>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            product_fetches: AtomicUsize::new(0),
            on_product_fetch: None,
        }
    }

    pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Called with the URL and the 1-based count of product fetches so far.
    pub fn on_product_fetch(mut self, hook: impl Fn(&str, usize) + Send + Sync + 'static) -> Self {
        self.on_product_fetch = Some(Box::new(hook));
        self
    }

    pub fn product_fetches(&self) -> usize {
        self.product_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if url.contains("/product/") {
            let n = self.product_fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(hook) = &self.on_product_fetch {
                hook(url, n);
            }
            tokio::task::yield_now().await;
        }
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

pub fn product_url(slug: &str) -> String {
    format!("https://shop.example.com/product/{}/", slug)
}

pub fn listing_page(slugs: &[String]) -> String {
    let items: String = slugs
        .iter()
        .map(|slug| {
            format!(
                r#"<li class="product"><a class="woocommerce-LoopProduct-link" href="/product/{}/">{}</a></li>"#,
                slug, slug
            )
        })
        .collect();
    format!(r#"<html><body><ul class="products">{}</ul></body></html>"#, items)
}

pub fn product_page(title: &str, sku: Option<&str>, price_markup: &str) -> String {
    let sku = sku
        .map(|s| format!(r#"<span class="sku_wrapper">SKU: <span class="sku">{}</span></span>"#, s))
        .unwrap_or_default();
    format!(
        r#"<html><body><div class="product">
            <h1 class="product_title entry-title">{}</h1>
            <div class="summary">{}</div>
            <div class="product_meta">{}<span class="posted_in"><a href="/c/parts/">Parts</a></span></div>
        </div></body></html>"#,
        title, price_markup, sku
    )
}

pub fn simple_price(amount: &str) -> String {
    format!(
        r#"<p class="price"><span class="woocommerce-Price-amount amount"><bdi>{}</bdi></span></p>"#,
        amount
    )
}

/// A storefront with one listing page and `count` products named p1..pN.
pub fn storefront(count: usize) -> StaticFetcher {
    let slugs: Vec<String> = (1..=count).map(|i| format!("p{}", i)).collect();
    slugs.iter().fold(
        StaticFetcher::new().page(BASE_URL, listing_page(&slugs)),
        |fetcher, slug| {
            let page = product_page(
                &format!("Part {}", slug),
                Some(&format!("SKU-{}", slug)),
                &simple_price("10,00 ₼"),
            );
            fetcher.page(product_url(slug), page)
        },
    )
}

/// JSON output into `dir`, no database, no image downloads, no log file.
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::with_base_url(BASE_URL);
    config.scraper.max_threads = 4;
    config.output.format = OutputFormat::Json;
    config.output.output_dir = dir.join("output");
    config.output.images_dir = dir.join("output/images");
    config.output.download_images = false;
    config.database.enabled = false;
    config.logging.file = None;
    config
}

pub async fn build_pipeline(
    config: &AppConfig,
    fetcher: Arc<dyn PageFetcher>,
    shutdown: Arc<ShutdownController>,
) -> anyhow::Result<Pipeline> {
    let coordinator = PersistenceCoordinator::from_config(config).await?;
    Ok(Pipeline::new(config, fetcher, None, coordinator, shutdown))
}

/// Records from the first file a run wrote.
pub fn read_written_json(report: &woo_scraper::RunReport) -> anyhow::Result<Vec<ProductRecord>> {
    let persistence = report
        .persistence
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("run did not flush"))?;
    let location = &persistence
        .written
        .first()
        .ok_or_else(|| anyhow::anyhow!("nothing written"))?
        .location;
    Ok(serde_json::from_str(&std::fs::read_to_string(location)?)?)
}
