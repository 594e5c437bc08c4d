//! SessionFlusher - background writer for the write-behind session store.
//!
//! Wakes on every staged change and on a fixed interval, writes dirty
//! sessions to the archive, and backs off exponentially while the archive
//! keeps failing. A final flush runs on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::adapters::storage::{FlushReport, WriteBehindSessionStore};
use crate::config::StorageConfig;

#[derive(Debug, Clone)]
pub struct SessionFlusherConfig {
    /// Regular flush cadence when nothing wakes the flusher earlier.
    pub interval: Duration,
    /// First retry delay after a failed flush.
    pub retry_initial: Duration,
    pub retry_max: Duration,
}

impl Default for SessionFlusherConfig {
    fn default() -> Self {
        Self::from_storage(&StorageConfig::default())
    }
}

impl SessionFlusherConfig {
    pub fn from_storage(storage: &StorageConfig) -> Self {
        Self {
            interval: storage.flush_interval(),
            retry_initial: storage.retry_initial(),
            retry_max: storage.retry_max(),
        }
    }
}

pub struct SessionFlusher {
    store: Arc<WriteBehindSessionStore>,
    config: SessionFlusherConfig,
}

impl SessionFlusher {
    pub fn new(store: Arc<WriteBehindSessionStore>, config: SessionFlusherConfig) -> Self {
        Self { store, config }
    }

    /// Runs until `shutdown` flips to true, then flushes once more.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> FlushReport {
        let mut interval = time::interval(self.config.interval);
        let mut backoff: Option<Duration> = None;

        loop {
            if let Some(delay) = backoff {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = time::sleep(delay) => {}
                }
            } else {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = self.store.changed() => {}
                    _ = interval.tick() => {}
                }
            }

            let report = self.store.flush().await;
            backoff = self.next_backoff(backoff, &report);
            if let Some(delay) = backoff {
                tracing::warn!(
                    failed = report.failed,
                    retry_in_ms = delay.as_millis() as u64,
                    "session flush incomplete, backing off"
                );
            }
        }

        let report = self.store.flush().await;
        tracing::info!(
            written = report.written,
            failed = report.failed,
            "final session flush"
        );
        report
    }

    fn next_backoff(&self, current: Option<Duration>, report: &FlushReport) -> Option<Duration> {
        if report.failed == 0 {
            return None;
        }
        let next = match current {
            Some(delay) => delay.saturating_mul(2),
            None => self.config.retry_initial,
        };
        Some(next.min(self.config.retry_max))
    }
}
