//! Task Dispatcher
//!
//! Fans a list of work items (regions, zones, managed zones...) out to a
//! bounded pool of worker tasks. Each worker drains a shared channel and
//! invokes the caller's handler once per item. A failing or panicking
//! handler only costs that item; siblings and the wave carry on.

use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Worker count used when none is configured
pub const DEFAULT_THREADS: usize = 3;

/// Outcome counts for one fan-out wave
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items never handed to a worker because the run was cancelled
    pub skipped: usize,
}

impl DispatchReport {
    /// Every item was handed out and succeeded
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

#[derive(Debug, Default)]
struct WorkerTally {
    succeeded: usize,
    failed: usize,
}

/// Bounded worker pool shared by every provider of a run
#[derive(Debug, Clone, Copy)]
pub struct TaskDispatcher {
    threads: usize,
}

impl Default for TaskDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THREADS)
    }
}

impl TaskDispatcher {
    /// A worker count of zero is treated as one
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `handler` once for every item and wait for all of them.
    ///
    /// Handlers are expected to append their results to a shared
    /// `ResourceSet` themselves. Once `cancel` fires no further items are
    /// queued; handlers already running are left to observe the token.
    pub async fn dispatch<T, F, Fut>(
        &self,
        wave: &str,
        items: Vec<T>,
        cancel: &CancellationToken,
        handler: F,
    ) -> DispatchReport
    where
        T: Display + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return DispatchReport::default();
        }

        let (tx, rx) = mpsc::channel::<T>(self.threads);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);
        let wave: Arc<str> = Arc::from(wave);

        let mut workers = JoinSet::new();
        for _ in 0..self.threads.min(total) {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let wave = Arc::clone(&wave);
            workers.spawn(async move {
                let mut tally = WorkerTally::default();
                loop {
                    // Release the receiver before running the handler
                    let next = rx.lock().await.recv().await;
                    let Some(item) = next else {
                        break;
                    };

                    let label = item.to_string();
                    match AssertUnwindSafe(handler(item)).catch_unwind().await {
                        Ok(Ok(())) => tally.succeeded += 1,
                        Ok(Err(e)) => {
                            tracing::warn!("{} [{}] failed: {:#}", wave, label, e);
                            tally.failed += 1;
                        }
                        Err(_) => {
                            tracing::error!("{} [{}] handler panicked", wave, label);
                            tally.failed += 1;
                        }
                    }
                }
                tally
            });
        }
        drop(rx);

        let mut queued = 0;
        for item in items {
            if cancel.is_cancelled() {
                break;
            }
            if tx.send(item).await.is_err() {
                break;
            }
            queued += 1;
        }
        drop(tx);

        let mut report = DispatchReport {
            total,
            skipped: total - queued,
            ..DispatchReport::default()
        };
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(tally) => {
                    report.succeeded += tally.succeeded;
                    report.failed += tally.failed;
                }
                Err(e) => tracing::error!("{} worker terminated: {}", wave, e),
            }
        }

        if report.is_complete() {
            tracing::debug!("{} finished: {} ok of {}", wave, report.succeeded, report.total);
        } else {
            tracing::info!(
                "{} incomplete: {} ok, {} failed, {} skipped of {}",
                wave,
                report.succeeded,
                report.failed,
                report.skipped,
                report.total
            );
        }
        report
    }
}
