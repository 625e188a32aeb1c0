use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::config::AppConfig;
use crate::discovery::resolve;
use crate::fetcher::PageFetcher;
use crate::images::ImageDownloader;
use crate::models::{Field, ProductRecord, SelectorConfig};
use crate::selector_engine::SelectorEngine;
use crate::utils::error::ExtractionError;

/// Builds one `ProductRecord` per product page.
pub struct ProductExtractor {
    fetcher: Arc<dyn PageFetcher>,
    engine: SelectorEngine,
    selectors: SelectorConfig,
    fields: HashSet<Field>,
    downloader: Option<ImageDownloader>,
}

impl ProductExtractor {
    /// `downloader` is `None` when images should be kept as remote URLs.
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        selectors: SelectorConfig,
        fields: impl IntoIterator<Item = Field>,
        downloader: Option<ImageDownloader>,
    ) -> Self {
        Self {
            fetcher,
            engine: SelectorEngine::new(),
            selectors,
            fields: fields.into_iter().collect(),
            downloader,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        downloader: Option<ImageDownloader>,
    ) -> Self {
        let downloader = if config.output.download_images {
            downloader
        } else {
            None
        };
        Self::new(
            fetcher,
            config.selectors.clone(),
            config.fields.iter().copied(),
            downloader,
        )
    }

    fn enabled(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Fetch and parse `url`. Only the page fetch can fail; unmatched fields stay empty and
    /// failed image downloads are left out of `images`.
    pub async fn extract(&self, url: &str) -> Result<ProductRecord, ExtractionError> {
        let html = self.fetcher.fetch(url).await?;
        let (mut record, image_urls) = self.parse_product(url, &html);

        if !image_urls.is_empty() {
            record.images = match &self.downloader {
                Some(downloader) => {
                    let folder = record.folder_identifier().to_string();
                    downloader.download_all(&image_urls, &folder).await
                }
                None => image_urls,
            };
        }

        info!(
            "Scraped: {}",
            record.title.as_deref().unwrap_or(record.url.as_str())
        );
        Ok(record)
    }

    /// Parse a fetched page. Returns the record (without images) and the resolved image URLs.
    pub fn parse_product(&self, url: &str, html: &str) -> (ProductRecord, Vec<String>) {
        let document = Html::parse_document(html);
        let mut record = ProductRecord::new(url);

        let single = |field: Field| -> Option<String> {
            if !self.enabled(field) {
                return None;
            }
            let spec = self.selectors.spec_for(field)?;
            let value = self.engine.extract(&document, spec);
            if value.is_none() {
                debug!("No match for '{}' on {}", field, url);
            }
            value
        };

        record.wp_id = single(Field::WpId);
        record.title = single(Field::Title);
        record.price = single(Field::Price);
        record.description = single(Field::Description);
        record.sku = single(Field::Sku);
        record.oem = single(Field::Oem);

        if self.enabled(Field::Tags) {
            record.tags = self.engine.extract_all(&document, &self.selectors.tags);
        }
        if self.enabled(Field::Categories) {
            record.categories = self.engine.extract_all(&document, &self.selectors.categories);
        }
        if self.enabled(Field::Attributes) {
            self.collect_attributes(&document, &mut record);
        }

        let image_urls = if self.enabled(Field::Images) {
            self.image_urls(&document, url)
        } else {
            Vec::new()
        };

        (record, image_urls)
    }

    // Label/value rows; a repeated label overwrites the earlier value.
    fn collect_attributes(&self, document: &Html, record: &mut ProductRecord) {
        let attrs = &self.selectors.attributes;
        for row in self.engine.select_first_matching(document, &attrs.rows) {
            let Some(label) = self.engine.extract_in(row, &attrs.label) else {
                continue;
            };
            let value = self.engine.extract_in(row, &attrs.value).unwrap_or_default();
            record.attributes.insert(label, value);
        }
    }

    fn image_urls(&self, document: &Html, page_url: &str) -> Vec<String> {
        let base = Url::parse(page_url).ok();
        let mut seen = HashSet::new();
        self.engine
            .extract_all(document, &self.selectors.images)
            .into_iter()
            .filter_map(|src| resolve(base.as_ref(), &src))
            .filter(|src| seen.insert(src.clone()))
            .collect()
    }
}
