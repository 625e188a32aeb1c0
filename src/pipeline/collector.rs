use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::{ProductRecord, WorkItem};
use crate::utils::error::ExtractionError;

/// Counters for one invocation. Owned by the collector; callers get copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub total_discovered: usize,
    pub extracted: usize,
    pub failed: usize,
    /// Records that arrived after the test-mode cap was already full.
    pub discarded: usize,
    pub interrupted: bool,
    pub test_limit: Option<usize>,
}

/// What a worker hands back for one work item.
#[derive(Debug)]
pub enum ItemOutcome {
    Scraped(ProductRecord),
    Failed {
        item: WorkItem,
        error: ExtractionError,
    },
}

struct CollectorInner {
    records: Vec<ProductRecord>,
    state: RunState,
}

/// Shared sink for worker results. All mutation goes through one lock.
pub struct ResultCollector {
    inner: Mutex<CollectorInner>,
    stop_dispatch: AtomicBool,
}

impl ResultCollector {
    pub fn new(test_limit: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(CollectorInner {
                records: Vec::new(),
                state: RunState {
                    test_limit,
                    ..RunState::default()
                },
            }),
            stop_dispatch: AtomicBool::new(false),
        }
    }

    /// Record one outcome. Once the test-mode cap is full, further records are dropped and
    /// the pool is told to stop dispatching. In-flight items can still overshoot the
    /// dispatch check; those end up here and are discarded.
    pub async fn add(&self, outcome: ItemOutcome) {
        let mut inner = self.inner.lock().await;
        match outcome {
            ItemOutcome::Scraped(record) => {
                let limit = inner.state.test_limit;
                if limit.is_some_and(|limit| inner.records.len() >= limit) {
                    inner.state.discarded += 1;
                    self.stop_dispatch.store(true, Ordering::SeqCst);
                    debug!("Test limit already reached, discarding {}", record.url);
                    return;
                }

                inner.records.push(record);
                inner.state.extracted += 1;
                metrics::counter!("woo_scraper_products_scraped_total").increment(1);

                let total = inner.state.total_discovered;
                if inner.state.extracted % 5 == 0 {
                    info!("Completed: {}/{}", inner.state.extracted, total);
                }

                if let Some(limit) = limit {
                    if inner.records.len() >= limit {
                        self.stop_dispatch.store(true, Ordering::SeqCst);
                        info!("Test limit of {} reached, no new items will be dispatched", limit);
                    }
                }
            }
            ItemOutcome::Failed { item, error } => {
                inner.state.failed += 1;
                metrics::counter!("woo_scraper_products_failed_total").increment(1);
                warn!("Skipped #{} {}: {}", item.index, item.url, error);
            }
        }
    }

    /// Cooperative stop signal for the worker pool (test-mode cap).
    pub fn should_stop_dispatch(&self) -> bool {
        self.stop_dispatch.load(Ordering::SeqCst)
    }

    pub async fn set_discovered(&self, total: usize) {
        self.inner.lock().await.state.total_discovered = total;
    }

    pub async fn mark_interrupted(&self) {
        self.inner.lock().await.state.interrupted = true;
    }

    /// Copy of everything collected so far, in arrival order.
    pub async fn snapshot(&self) -> Vec<ProductRecord> {
        self.inner.lock().await.records.clone()
    }

    pub async fn count(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn run_state(&self) -> RunState {
        self.inner.lock().await.state.clone()
    }
}
