pub mod collector;
pub mod shutdown;
pub mod worker_pool;

pub use collector::{ItemOutcome, ResultCollector, RunState};
pub use shutdown::{ShutdownController, ShutdownState};
pub use worker_pool::{PoolSummary, WorkerPool};

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn, Instrument};

use crate::config::AppConfig;
use crate::discovery::{DiscoveryOptions, LinkDiscoverer};
use crate::extractor::ProductExtractor;
use crate::fetcher::http::build_client;
use crate::fetcher::{build_fetcher, PageFetcher};
use crate::images::ImageDownloader;
use crate::models::generate_run_id;
use crate::persistence::{PersistenceCoordinator, PersistenceReport};
use crate::utils::error::AppError;

/// How a run ended. Maps onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    Interrupted,
    NothingCollected,
    PersistenceFailed,
}

impl RunStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::NothingCollected => 2,
            RunStatus::PersistenceFailed => 3,
            RunStatus::Interrupted => 130,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub state: RunState,
    pub pool: PoolSummary,
    pub persistence: Option<PersistenceReport>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn log_summary(&self) {
        let state = &self.state;
        info!(
            "Run {} finished ({:?}) in {:.1}s: {} discovered, {} extracted, {} failed, {} discarded",
            self.run_id,
            self.status,
            self.elapsed.as_secs_f64(),
            state.total_discovered,
            state.extracted,
            state.failed,
            state.discarded
        );
        if let Some(persistence) = &self.persistence {
            for write in &persistence.written {
                info!("  {} -> {}", write.sink, write.location);
            }
            for failure in &persistence.failed {
                warn!("  {} failed: {}", failure.sink, failure.error);
            }
            if let Some(fallback) = &persistence.fallback {
                warn!("  emergency copy -> {}", fallback);
            }
        }
    }
}

/// Discovery, concurrent extraction and one final flush.
pub struct Pipeline {
    discoverer: LinkDiscoverer,
    extractor: Arc<ProductExtractor>,
    coordinator: PersistenceCoordinator,
    shutdown: Arc<ShutdownController>,
    concurrency: usize,
    test_limit: Option<usize>,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        downloader: Option<ImageDownloader>,
        coordinator: PersistenceCoordinator,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            discoverer: LinkDiscoverer::new(Arc::clone(&fetcher), DiscoveryOptions::from(config)),
            extractor: Arc::new(ProductExtractor::from_config(config, fetcher, downloader)),
            coordinator,
            shutdown,
            concurrency: config.scraper.max_threads,
            test_limit: config.test_limit(),
        }
    }

    /// Wire up the fetcher, image downloader and sinks named in `config`.
    pub async fn from_config(
        config: &AppConfig,
        shutdown: Arc<ShutdownController>,
    ) -> Result<Self, AppError> {
        let fetcher = build_fetcher(&config.scraper)?;
        let downloader = if config.output.download_images {
            Some(ImageDownloader::new(
                build_client(&config.scraper)?,
                &config.output.images_dir,
            ))
        } else {
            None
        };
        let coordinator = PersistenceCoordinator::from_config(config).await?;
        info!("Output sinks: {:?}", coordinator.sink_names());
        Ok(Self::new(config, fetcher, downloader, coordinator, shutdown))
    }

    /// A discovery failure is fatal and returned as an error. Everything after discovery
    /// ends in a report, and the collected snapshot is flushed exactly once.
    pub async fn run(&self) -> Result<RunReport, AppError> {
        let run_id = generate_run_id();
        let span = tracing::info_span!("run", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: String) -> Result<RunReport, AppError> {
        let started = Instant::now();
        if let Some(limit) = self.test_limit {
            info!("Test mode: at most {} products", limit);
        }

        let urls = self.discoverer.discover(self.shutdown.token()).await?;
        info!("Discovered {} product links", urls.len());

        let collector = Arc::new(ResultCollector::new(self.test_limit));
        collector.set_discovered(urls.len()).await;

        let pool = WorkerPool::new(
            Arc::clone(&self.extractor),
            Arc::clone(&collector),
            Arc::clone(&self.shutdown),
            self.concurrency,
        );
        let pool_summary = pool.run(urls).await;

        if self.shutdown.was_interrupted() {
            collector.mark_interrupted().await;
        }

        let snapshot = collector.snapshot().await;
        let persistence = if self.shutdown.begin_flush() {
            Some(self.coordinator.persist(&snapshot).await)
        } else {
            warn!("Results were already flushed, skipping");
            None
        };

        let state = collector.run_state().await;
        let status = match &persistence {
            Some(report) if report.has_failures() => RunStatus::PersistenceFailed,
            _ if state.interrupted => RunStatus::Interrupted,
            _ if snapshot.is_empty() => RunStatus::NothingCollected,
            _ => RunStatus::Completed,
        };

        Ok(RunReport {
            run_id,
            status,
            state,
            pool: pool_summary,
            persistence,
            elapsed: started.elapsed(),
        })
    }
}
