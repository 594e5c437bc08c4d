//! UpkeepScheduler - periodic sweep over stored sessions.
//!
//! On every tick the scheduler reads all sessions, decides which
//! housekeeping task is due on each, and queues it on the chat's worker.
//! The engine decides again when the job runs, so a customer message that
//! arrives in between wins. Closed variant assignments older than the
//! retention window are pruned at the end of each sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::ChatDispatcher;
use crate::config::SchedulerConfig;
use crate::domain::dialogue::due_upkeep;
use crate::domain::foundation::Timestamp;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub queued: usize,
    pub pruned: usize,
}

pub struct UpkeepScheduler {
    dispatcher: Arc<ChatDispatcher>,
    interval: Duration,
    retention: ChronoDuration,
    started_wall: Timestamp,
    started: Instant,
}

impl UpkeepScheduler {
    pub fn new(dispatcher: Arc<ChatDispatcher>, config: &SchedulerConfig) -> Self {
        Self {
            dispatcher,
            interval: config.interval(),
            retention: config.retention(),
            started_wall: Timestamp::now(),
            started: Instant::now(),
        }
    }

    /// Wall time as the runtime clock sees it.
    ///
    /// Anchored on the tokio clock so a paused runtime moves it too.
    pub fn now(&self) -> Timestamp {
        let elapsed = self.started.elapsed().as_millis() as i64;
        self.started_wall.plus_millis(elapsed)
    }

    /// Sweeps on every interval tick until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "upkeep scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let report = self.sweep(self.now()).await;
                    if report != SweepReport::default() {
                        tracing::info!(
                            queued = report.queued,
                            pruned = report.pruned,
                            "upkeep sweep"
                        );
                    }
                }
            }
        }
        tracing::info!("upkeep scheduler stopped");
    }

    /// Queues every task due at `now` on the chat workers.
    pub async fn sweep(&self, now: Timestamp) -> SweepReport {
        let engine = self.dispatcher.engine();
        let mut report = SweepReport::default();

        match engine.sessions().list().await {
            Ok(sessions) => {
                let registry = engine.scripts().snapshot();
                let policy = &engine.settings().upkeep;
                for state in sessions {
                    let version = registry.version(state.script_version());
                    let step = version
                        .as_deref()
                        .and_then(|v| v.step(state.current_step().as_step()?));
                    let Some(task) = due_upkeep(&state, step, policy, &now) else {
                        continue;
                    };
                    let chat_id = state.chat_id();
                    tracing::debug!(chat_id = %chat_id, task = task.label(), "upkeep due");
                    match self.dispatcher.submit_upkeep(chat_id, task, now) {
                        Ok(()) => report.queued += 1,
                        Err(error) => {
                            tracing::warn!(chat_id = %chat_id, %error, "upkeep not queued");
                        }
                    }
                }
            }
            Err(error) => tracing::error!(%error, "listing sessions for upkeep failed"),
        }

        let cutoff = now.plus_millis(-self.retention.num_milliseconds());
        match engine.allocator().prune(cutoff).await {
            Ok(pruned) => report.pruned = pruned,
            Err(error) => tracing::warn!(%error, "pruning variant assignments failed"),
        }
        report
    }
}
