use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One scraped product, exactly as found on the page.
///
/// Absent single-valued fields are `None` (serialized as `null`), absent multi-valued fields
/// are empty. Nothing is reformatted: `price` keeps its currency symbol and separators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub wp_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub oem: Option<String>,
    pub tags: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub images: Vec<String>,
    pub categories: Vec<String>,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
}

impl ProductRecord {
    /// An empty record for `url`, stamped now.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            wp_id: None,
            title: None,
            price: None,
            description: None,
            sku: None,
            oem: None,
            tags: Vec::new(),
            attributes: BTreeMap::new(),
            images: Vec::new(),
            categories: Vec::new(),
            url: url.into(),
            scraped_at: Utc::now(),
        }
    }

    /// Name used for the per-product image folder: SKU, then title, then a placeholder.
    pub fn folder_identifier(&self) -> &str {
        self.sku
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("unknown_product")
    }

    /// Same record with `scraped_at` zeroed, for comparing two runs.
    pub fn without_timestamp(&self) -> Self {
        Self {
            scraped_at: DateTime::<Utc>::UNIX_EPOCH,
            ..self.clone()
        }
    }
}

/// Reduced export shape selected with `--compact`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactRecord {
    pub name: Option<String>,
    pub sku_code: Option<String>,
    pub main_price: Option<String>,
    pub source_url: String,
    pub has_images: bool,
}

impl From<&ProductRecord> for CompactRecord {
    fn from(record: &ProductRecord) -> Self {
        Self {
            name: record.title.clone(),
            sku_code: record.sku.clone(),
            main_price: record.price.clone(),
            source_url: record.url.clone(),
            has_images: !record.images.is_empty(),
        }
    }
}
