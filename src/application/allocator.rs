//! Variant allocator: the single owner of A/B counters and sticky assignments.
//!
//! All access goes through a channel to one task, so counter updates never
//! race and need no lock. Each mutation is persisted before the task takes
//! the next message; a failed save is logged and retried on the next one.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::domain::foundation::{ChatId, DomainError, ErrorCode, Timestamp};
use crate::domain::script::{AllocationMode, ScriptVersionName};
use crate::domain::variant::{AssignOutcome, StatsDocument, VariantStats};
use crate::ports::{StatsStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocatorError {
    #[error("variant allocator has stopped")]
    Stopped,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AllocatorError> for DomainError {
    fn from(err: AllocatorError) -> Self {
        match err {
            AllocatorError::Stopped => DomainError::new(ErrorCode::InternalError, err.to_string()),
            AllocatorError::Store(e) => e.into(),
        }
    }
}

enum Request {
    Assign {
        chat_id: ChatId,
        mode: AllocationMode,
        available: Vec<ScriptVersionName>,
        reply: oneshot::Sender<AssignOutcome>,
    },
    Restart {
        chat_id: ChatId,
    },
    Forget {
        chat_id: ChatId,
    },
    Prune {
        cutoff: Timestamp,
        reply: oneshot::Sender<usize>,
    },
    Completion {
        version: ScriptVersionName,
    },
    Snapshot {
        reply: oneshot::Sender<StatsDocument>,
    },
}

/// Cheap, cloneable handle to the allocator task.
#[derive(Clone)]
pub struct VariantAllocator {
    tx: mpsc::UnboundedSender<Request>,
}

impl VariantAllocator {
    /// Loads the stored statistics and starts the owning task.
    ///
    /// `seed` fixes the rotation coin for reproducible runs.
    pub async fn spawn(
        store: Arc<dyn StatsStore>,
        seed: Option<u64>,
    ) -> Result<(Self, JoinHandle<()>), AllocatorError> {
        let stats = store.load().await?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let task = Aggregator { stats, rng, store };
        let handle = tokio::spawn(task.run(rx));
        Ok((Self { tx }, handle))
    }

    /// Returns the chat's version, assigning one from `mode` on first contact
    /// or when its stored version is not among `available`.
    ///
    /// `started` is counted once per session; repeat calls while the session
    /// is open return the same version without counting.
    pub async fn assign(
        &self,
        chat_id: &ChatId,
        mode: &AllocationMode,
        available: &[ScriptVersionName],
    ) -> Result<AssignOutcome, AllocatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Assign {
            chat_id: chat_id.clone(),
            mode: mode.clone(),
            available: available.to_vec(),
            reply,
        })?;
        rx.await.map_err(|_| AllocatorError::Stopped)
    }

    /// Closes the chat's session after a reset. The chat keeps its version.
    pub fn restart(&self, chat_id: &ChatId) -> Result<(), AllocatorError> {
        self.send(Request::Restart {
            chat_id: chat_id.clone(),
        })
    }

    /// Drops the chat's assignment after its session expired.
    pub fn forget(&self, chat_id: &ChatId) -> Result<(), AllocatorError> {
        self.send(Request::Forget {
            chat_id: chat_id.clone(),
        })
    }

    /// Drops closed assignments older than `cutoff`; returns how many went.
    pub async fn prune(&self, cutoff: Timestamp) -> Result<usize, AllocatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Prune { cutoff, reply })?;
        rx.await.map_err(|_| AllocatorError::Stopped)
    }

    /// Counts one conversion for `version`. Callers guarantee once per session.
    pub fn record_completion(&self, version: &ScriptVersionName) -> Result<(), AllocatorError> {
        self.send(Request::Completion {
            version: version.clone(),
        })
    }

    /// Current counters and assignments.
    pub async fn snapshot(&self) -> Result<StatsDocument, AllocatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Snapshot { reply })?;
        rx.await.map_err(|_| AllocatorError::Stopped)
    }

    pub async fn stats(&self, version: &ScriptVersionName) -> Result<VariantStats, AllocatorError> {
        Ok(self.snapshot().await?.stats(version))
    }

    fn send(&self, request: Request) -> Result<(), AllocatorError> {
        self.tx.send(request).map_err(|_| AllocatorError::Stopped)
    }
}

struct Aggregator {
    stats: StatsDocument,
    rng: StdRng,
    store: Arc<dyn StatsStore>,
}

impl Aggregator {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
        tracing::debug!("variant allocator started");
        while let Some(request) = rx.recv().await {
            let changed = self.handle(request);
            if changed {
                if let Err(error) = self.store.save(&self.stats).await {
                    tracing::error!(%error, "failed to persist variant stats");
                }
            }
        }
        tracing::debug!("variant allocator stopped");
    }

    /// Applies one request; returns whether the document changed.
    fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::Assign {
                chat_id,
                mode,
                available,
                reply,
            } => {
                let pick_second = matches!(mode, AllocationMode::Rotation(..))
                    && self.rng.gen_bool(0.5);
                let now = Timestamp::now();
                let outcome = self
                    .stats
                    .assign(&chat_id, &mode, &available, pick_second, now);
                if outcome.started {
                    tracing::info!(
                        chat_id = %chat_id,
                        version = %outcome.version,
                        "session started"
                    );
                }
                let changed = outcome.started;
                let _ = reply.send(outcome);
                changed
            }
            Request::Restart { chat_id } => self.stats.restart(&chat_id),
            Request::Forget { chat_id } => self.stats.forget(&chat_id),
            Request::Prune { cutoff, reply } => {
                let pruned = self.stats.prune_closed(&cutoff);
                if pruned > 0 {
                    tracing::info!(pruned, "stale assignments pruned");
                }
                let _ = reply.send(pruned);
                pruned > 0
            }
            Request::Completion { version } => {
                self.stats.record_completion(&version);
                tracing::info!(version = %version, "conversion recorded");
                true
            }
            Request::Snapshot { reply } => {
                let _ = reply.send(self.stats.clone());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryStatsStore;

    fn name(s: &str) -> ScriptVersionName {
        ScriptVersionName::new(s).unwrap()
    }

    fn chat(s: &str) -> ChatId {
        ChatId::new(s).unwrap()
    }

    fn all() -> Vec<ScriptVersionName> {
        vec![name("v1"), name("v2"), name("a"), name("b")]
    }

    async fn allocator(seed: u64) -> (VariantAllocator, Arc<InMemoryStatsStore>) {
        let store = Arc::new(InMemoryStatsStore::default());
        let (allocator, _task) = VariantAllocator::spawn(store.clone(), Some(seed))
            .await
            .unwrap();
        (allocator, store)
    }

    #[tokio::test]
    async fn assignment_is_sticky_across_mode_switch() {
        let (allocator, _) = allocator(7).await;
        let first = allocator
            .assign(&chat("a"), &AllocationMode::Active(name("v1")), &all())
            .await
            .unwrap();
        let second = allocator
            .assign(&chat("a"), &AllocationMode::Active(name("v2")), &all())
            .await
            .unwrap();

        assert_eq!(first.version, name("v1"));
        assert_eq!(second.version, name("v1"));
        assert!(first.started);
        assert!(!second.started);
        assert_eq!(allocator.stats(&name("v1")).await.unwrap().started, 1);
        assert_eq!(allocator.stats(&name("v2")).await.unwrap().started, 0);
    }

    #[tokio::test]
    async fn restart_counts_a_new_session_on_the_same_version() {
        let (allocator, _) = allocator(7).await;
        let mode = AllocationMode::Active(name("v1"));
        allocator.assign(&chat("a"), &mode, &all()).await.unwrap();
        allocator.restart(&chat("a")).unwrap();
        let again = allocator
            .assign(&chat("a"), &AllocationMode::Active(name("v2")), &all())
            .await
            .unwrap();

        assert_eq!(again.version, name("v1"));
        assert!(again.started);
        assert_eq!(allocator.stats(&name("v1")).await.unwrap().started, 2);
    }

    #[tokio::test]
    async fn completions_are_counted_and_persisted() {
        let (allocator, store) = allocator(7).await;
        allocator
            .assign(&chat("a"), &AllocationMode::Active(name("v1")), &all())
            .await
            .unwrap();
        allocator.record_completion(&name("v1")).unwrap();

        let stats = allocator.stats(&name("v1")).await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.conversion_rate(), 1.0);
        assert_eq!(store.load().await.unwrap().stats(&name("v1")).completed, 1);
    }

    #[tokio::test]
    async fn forgotten_chat_is_allocated_afresh() {
        let (allocator, store) = allocator(7).await;
        let v1 = AllocationMode::Active(name("v1"));
        allocator.assign(&chat("a"), &v1, &all()).await.unwrap();
        allocator.forget(&chat("a")).unwrap();
        let again = allocator
            .assign(&chat("a"), &AllocationMode::Active(name("v2")), &all())
            .await
            .unwrap();

        assert_eq!(again.version, name("v2"));
        allocator.snapshot().await.unwrap();
        let saved = store.load().await.unwrap();
        assert_eq!(saved.assignment(&chat("a")).unwrap().version, name("v2"));
    }

    #[tokio::test]
    async fn prune_reports_closed_assignments_removed() {
        let (allocator, _) = allocator(7).await;
        let v1 = AllocationMode::Active(name("v1"));
        allocator.assign(&chat("a"), &v1, &all()).await.unwrap();
        allocator.assign(&chat("b"), &v1, &all()).await.unwrap();
        allocator.restart(&chat("a")).unwrap();

        let future = Timestamp::now().plus_secs(60);
        assert_eq!(allocator.prune(future).await.unwrap(), 1);
        let doc = allocator.snapshot().await.unwrap();
        assert!(doc.assignment(&chat("a")).is_none());
        assert!(doc.assignment(&chat("b")).is_some());
    }

    #[tokio::test]
    async fn rotation_splits_roughly_evenly() {
        let (allocator, _) = allocator(42).await;
        let mode = AllocationMode::Rotation(name("a"), name("b"));
        for i in 0..1000 {
            allocator
                .assign(&chat(&format!("chat-{}", i)), &mode, &all())
                .await
                .unwrap();
        }
        let a = allocator.stats(&name("a")).await.unwrap().started;
        let b = allocator.stats(&name("b")).await.unwrap().started;
        assert_eq!(a + b, 1000);
        assert!((420..=580).contains(&a), "a got {}", a);
    }
}
