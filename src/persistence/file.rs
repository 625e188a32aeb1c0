use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::traits::RecordSink;
use crate::config::OutputLayout;
use crate::models::{CompactRecord, ProductRecord};
use crate::utils::error::PersistenceError;

const JSON_SINK: &str = "json";
const CSV_SINK: &str = "csv";

/// Writes the snapshot as a pretty-printed UTF-8 JSON array.
pub struct JsonFileSink {
    path: PathBuf,
    layout: OutputLayout,
}

impl JsonFileSink {
    /// `<dir>/<prefix>_<stamp>.json`
    pub fn new(dir: &Path, prefix: &str, stamp: &str, layout: OutputLayout) -> Self {
        Self {
            path: dir.join(format!("{}_{}.json", prefix, stamp)),
            layout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, records: &[ProductRecord]) -> Result<Vec<u8>, serde_json::Error> {
        match self.layout {
            OutputLayout::Full => serde_json::to_vec_pretty(records),
            OutputLayout::Compact => {
                let compact: Vec<CompactRecord> = records.iter().map(CompactRecord::from).collect();
                serde_json::to_vec_pretty(&compact)
            }
        }
    }
}

#[async_trait]
impl RecordSink for JsonFileSink {
    fn name(&self) -> &str {
        JSON_SINK
    }

    async fn write(&self, records: &[ProductRecord]) -> Result<String, PersistenceError> {
        let bytes = self.encode(records).map_err(|e| PersistenceError::Encode {
            sink: JSON_SINK.to_string(),
            message: e.to_string(),
        })?;
        write_file(JSON_SINK, &self.path, bytes).await
    }
}

/// Writes the snapshot as CSV with a header row. List and map fields are JSON-encoded
/// into a single cell.
pub struct CsvFileSink {
    path: PathBuf,
    layout: OutputLayout,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    wp_id: Option<&'a str>,
    title: Option<&'a str>,
    price: Option<&'a str>,
    description: Option<&'a str>,
    sku: Option<&'a str>,
    oem: Option<&'a str>,
    tags: String,
    attributes: String,
    images: String,
    categories: String,
    url: &'a str,
    scraped_at: String,
}

impl<'a> CsvRow<'a> {
    fn from_record(record: &'a ProductRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            wp_id: record.wp_id.as_deref(),
            title: record.title.as_deref(),
            price: record.price.as_deref(),
            description: record.description.as_deref(),
            sku: record.sku.as_deref(),
            oem: record.oem.as_deref(),
            tags: serde_json::to_string(&record.tags)?,
            attributes: serde_json::to_string(&record.attributes)?,
            images: serde_json::to_string(&record.images)?,
            categories: serde_json::to_string(&record.categories)?,
            url: &record.url,
            scraped_at: record.scraped_at.to_rfc3339(),
        })
    }
}

impl CsvFileSink {
    /// `<dir>/<prefix>_<stamp>.csv`
    pub fn new(dir: &Path, prefix: &str, stamp: &str, layout: OutputLayout) -> Self {
        Self {
            path: dir.join(format!("{}_{}.csv", prefix, stamp)),
            layout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, records: &[ProductRecord]) -> Result<Vec<u8>, String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records {
            match self.layout {
                OutputLayout::Full => {
                    let row = CsvRow::from_record(record).map_err(|e| e.to_string())?;
                    writer.serialize(row).map_err(|e| e.to_string())?;
                }
                OutputLayout::Compact => writer
                    .serialize(CompactRecord::from(record))
                    .map_err(|e| e.to_string())?,
            }
        }
        writer.into_inner().map_err(|e| e.to_string())
    }
}

#[async_trait]
impl RecordSink for CsvFileSink {
    fn name(&self) -> &str {
        CSV_SINK
    }

    async fn write(&self, records: &[ProductRecord]) -> Result<String, PersistenceError> {
        let bytes = self.encode(records).map_err(|message| PersistenceError::Encode {
            sink: CSV_SINK.to_string(),
            message,
        })?;
        write_file(CSV_SINK, &self.path, bytes).await
    }
}

async fn write_file(sink: &str, path: &Path, bytes: Vec<u8>) -> Result<String, PersistenceError> {
    let io_err = |source: std::io::Error| PersistenceError::Io {
        sink: sink.to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
    }
    tokio::fs::write(path, bytes).await.map_err(io_err)?;
    debug!("{} sink wrote {}", sink, path.display());
    Ok(path.display().to_string())
}
