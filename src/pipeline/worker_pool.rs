use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::collector::{ItemOutcome, ResultCollector};
use super::shutdown::ShutdownController;
use crate::extractor::ProductExtractor;
use crate::models::WorkItem;

/// What the pool did with its queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub workers: usize,
    pub dispatched: usize,
    pub not_dispatched: usize,
    pub panicked_workers: usize,
}

/// Fixed-size set of tokio tasks draining one shared queue.
pub struct WorkerPool {
    extractor: Arc<ProductExtractor>,
    collector: Arc<ResultCollector>,
    shutdown: Arc<ShutdownController>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(
        extractor: Arc<ProductExtractor>,
        collector: Arc<ResultCollector>,
        shutdown: Arc<ShutdownController>,
        concurrency: usize,
    ) -> Self {
        Self {
            extractor,
            collector,
            shutdown,
            concurrency: concurrency.max(1),
        }
    }

    /// Process `urls` with at most `concurrency` items in flight. Returns once every worker
    /// has finished its current item after the queue drained, a stop was requested, or the
    /// collector's cap filled up.
    pub async fn run(&self, urls: Vec<String>) -> PoolSummary {
        let total = urls.len();
        if total == 0 {
            return PoolSummary::default();
        }

        let queue: Arc<Mutex<VecDeque<WorkItem>>> = Arc::new(Mutex::new(
            urls.into_iter()
                .enumerate()
                .map(|(index, url)| WorkItem::new(index + 1, url))
                .collect(),
        ));
        let dispatched = Arc::new(AtomicUsize::new(0));
        let workers = self.concurrency.min(total);
        info!("Starting {} workers for {} products", workers, total);

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let dispatched = Arc::clone(&dispatched);
                let extractor = Arc::clone(&self.extractor);
                let collector = Arc::clone(&self.collector);
                let shutdown = Arc::clone(&self.shutdown);
                tokio::spawn(async move {
                    loop {
                        if shutdown.is_stopping() {
                            debug!("Worker {} stopping: shutdown requested", worker_id);
                            break;
                        }
                        if collector.should_stop_dispatch() {
                            debug!("Worker {} stopping: test limit reached", worker_id);
                            break;
                        }

                        let next = queue.lock().await.pop_front();
                        let Some(item) = next else {
                            break;
                        };
                        dispatched.fetch_add(1, Ordering::SeqCst);
                        debug!("Worker {} took #{} {}", worker_id, item.index, item.url);

                        let outcome = match extractor.extract(&item.url).await {
                            Ok(record) => ItemOutcome::Scraped(record),
                            Err(error) => ItemOutcome::Failed { item, error },
                        };
                        collector.add(outcome).await;
                    }
                })
            })
            .collect();

        let mut panicked_workers = 0;
        for (worker_id, result) in futures::future::join_all(handles)
            .await
            .into_iter()
            .enumerate()
        {
            if let Err(e) = result {
                panicked_workers += 1;
                error!("Worker {} terminated abnormally: {}", worker_id, e);
            }
        }

        let dispatched = dispatched.load(Ordering::SeqCst);
        PoolSummary {
            workers,
            dispatched,
            not_dispatched: total - dispatched,
            panicked_workers,
        }
    }
}
