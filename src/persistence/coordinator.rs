use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

use super::database::DatabaseSink;
use super::file::{CsvFileSink, JsonFileSink};
use super::file_stamp;
use super::traits::RecordSink;
use crate::config::{AppConfig, OutputLayout};
use crate::models::ProductRecord;
use crate::utils::error::PersistenceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkWrite {
    pub sink: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkFailure {
    pub sink: String,
    pub error: String,
}

/// Outcome of the single flush at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceReport {
    pub records: usize,
    pub written: Vec<SinkWrite>,
    pub failed: Vec<SinkFailure>,
    /// Where the emergency dump went when every sink failed.
    pub fallback: Option<String>,
}

impl PersistenceReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Nothing reached disk or the database.
    pub fn lost_data(&self) -> bool {
        self.records > 0 && self.written.is_empty() && self.fallback.is_none()
    }
}

/// Hands one snapshot to every configured sink. One sink failing does not stop the others;
/// if all of them fail the snapshot is dumped as JSON to the output dir, then the temp dir.
pub struct PersistenceCoordinator {
    sinks: Vec<Box<dyn RecordSink>>,
    fallback_dirs: Vec<PathBuf>,
    stamp: String,
}

impl PersistenceCoordinator {
    pub fn new(sinks: Vec<Box<dyn RecordSink>>, fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            sinks,
            fallback_dirs: vec![fallback_dir.into(), std::env::temp_dir()],
            stamp: file_stamp(),
        }
    }

    /// Build the sinks selected by `output.format` and `database.enabled`.
    pub async fn from_config(config: &AppConfig) -> Result<Self, PersistenceError> {
        let stamp = file_stamp();
        let output = &config.output;
        let mut sinks: Vec<Box<dyn RecordSink>> = Vec::new();

        if output.format.writes_json() {
            sinks.push(Box::new(JsonFileSink::new(
                &output.output_dir,
                "products",
                &stamp,
                output.layout,
            )));
        }
        if output.format.writes_csv() {
            sinks.push(Box::new(CsvFileSink::new(
                &output.output_dir,
                "products",
                &stamp,
                output.layout,
            )));
        }
        if config.database.enabled {
            sinks.push(Box::new(DatabaseSink::connect(&config.database).await?));
        }

        if sinks.is_empty() {
            warn!("No output configured: file output is off and the database is disabled");
        }

        Ok(Self {
            sinks,
            fallback_dirs: vec![output.output_dir.clone(), std::env::temp_dir()],
            stamp,
        })
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub async fn persist(&self, records: &[ProductRecord]) -> PersistenceReport {
        let mut report = PersistenceReport {
            records: records.len(),
            ..PersistenceReport::default()
        };

        if records.is_empty() {
            warn!("No products collected, nothing to save");
            return report;
        }

        for sink in &self.sinks {
            match sink.write(records).await {
                Ok(location) => {
                    info!("Saved {} products via {}: {}", records.len(), sink.name(), location);
                    report.written.push(SinkWrite {
                        sink: sink.name().to_string(),
                        location,
                    });
                }
                Err(e) => {
                    metrics::counter!("woo_scraper_sink_failures_total").increment(1);
                    error!("{} sink failed: {}", sink.name(), e);
                    report.failed.push(SinkFailure {
                        sink: sink.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.written.is_empty() && report.has_failures() {
            match self.fallback_dump(records).await {
                Ok(location) => {
                    warn!("All sinks failed; emergency copy written to {}", location);
                    report.fallback = Some(location);
                }
                Err(e) => error!("{}", e),
            }
        }

        report
    }

    async fn fallback_dump(&self, records: &[ProductRecord]) -> Result<String, PersistenceError> {
        let mut last_error = String::new();
        for dir in &self.fallback_dirs {
            let sink = JsonFileSink::new(dir, "emergency_products", &self.stamp, OutputLayout::Full);
            match sink.write(records).await {
                Ok(location) => return Ok(location),
                Err(e) => {
                    warn!("Emergency dump to {} failed: {}", dir.display(), e);
                    last_error = e.to_string();
                }
            }
        }
        Err(PersistenceError::Exhausted {
            failed: self.sinks.len(),
            message: last_error,
        })
    }
}
