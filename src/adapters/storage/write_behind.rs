//! Write-behind session store.
//!
//! The in-memory copy is authoritative: `put` stages the state and returns
//! immediately, marking the chat dirty. A flusher task later writes dirty
//! sessions to the durable `SessionArchive`; a session stays dirty until a
//! write of its latest revision succeeds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};

use crate::domain::conversation::ConversationState;
use crate::domain::foundation::ChatId;
use crate::ports::{SessionArchive, SessionStore, SessionStoreError};

struct Slot {
    state: ConversationState,
    dirty: bool,
}

/// Outcome of one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

pub struct WriteBehindSessionStore {
    slots: RwLock<HashMap<ChatId, Slot>>,
    archive: Arc<dyn SessionArchive>,
    // Serializes archive writes against removals
    io: Mutex<()>,
    changed: Notify,
}

impl WriteBehindSessionStore {
    /// Empty store over `archive`; nothing is read from it.
    pub fn new(archive: Arc<dyn SessionArchive>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            archive,
            io: Mutex::new(()),
            changed: Notify::new(),
        }
    }

    /// Store primed with every session the archive holds.
    pub async fn load(archive: Arc<dyn SessionArchive>) -> Result<Self, SessionStoreError> {
        let store = Self::new(archive);
        let sessions = store.archive.load_all().await?;
        tracing::info!(sessions = sessions.len(), "loaded sessions from archive");
        {
            let mut slots = store.slots.write().await;
            for state in sessions {
                slots.insert(
                    state.chat_id().clone(),
                    Slot {
                        state,
                        dirty: false,
                    },
                );
            }
        }
        Ok(store)
    }

    /// Resolves after the next `put`. Used by the flusher to wake up.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    pub async fn dirty_count(&self) -> usize {
        self.slots.read().await.values().filter(|s| s.dirty).count()
    }

    pub async fn is_dirty(&self, chat_id: &ChatId) -> bool {
        self.slots
            .read()
            .await
            .get(chat_id)
            .map(|s| s.dirty)
            .unwrap_or(false)
    }

    /// Writes every dirty session to the archive once.
    pub async fn flush(&self) -> FlushReport {
        let _io = self.io.lock().await;
        let pending: Vec<ConversationState> = self
            .slots
            .read()
            .await
            .values()
            .filter(|s| s.dirty)
            .map(|s| s.state.clone())
            .collect();

        let mut report = FlushReport::default();
        for state in pending {
            match self.archive.write(&state).await {
                Ok(()) => {
                    report.written += 1;
                    let mut slots = self.slots.write().await;
                    if let Some(slot) = slots.get_mut(state.chat_id()) {
                        // A newer put keeps the slot dirty
                        if slot.state.revision() == state.revision() {
                            slot.dirty = false;
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        chat_id = %state.chat_id(),
                        revision = state.revision(),
                        error = %e,
                        "session flush failed"
                    );
                }
            }
        }
        report
    }
}

#[async_trait]
impl SessionStore for WriteBehindSessionStore {
    async fn get(&self, chat_id: &ChatId) -> Result<Option<ConversationState>, SessionStoreError> {
        Ok(self
            .slots
            .read()
            .await
            .get(chat_id)
            .map(|slot| slot.state.clone()))
    }

    async fn put(&self, state: &ConversationState) -> Result<u64, SessionStoreError> {
        let revision = {
            let mut slots = self.slots.write().await;
            let stored = slots
                .get(state.chat_id())
                .map(|slot| slot.state.revision())
                .unwrap_or(0);
            if stored != state.revision() {
                return Err(SessionStoreError::Conflict {
                    chat_id: state.chat_id().clone(),
                    expected: state.revision(),
                    actual: stored,
                });
            }
            let mut staged = state.clone();
            staged.set_revision(stored + 1);
            slots.insert(
                state.chat_id().clone(),
                Slot {
                    state: staged,
                    dirty: true,
                },
            );
            stored + 1
        };
        self.changed.notify_one();
        Ok(revision)
    }

    async fn reset(&self, chat_id: &ChatId) -> Result<bool, SessionStoreError> {
        let existed = self.slots.write().await.remove(chat_id).is_some();
        let _io = self.io.lock().await;
        self.archive.remove(chat_id).await?;
        Ok(existed)
    }

    async fn list(&self) -> Result<Vec<ConversationState>, SessionStoreError> {
        let mut sessions: Vec<ConversationState> = self
            .slots
            .read()
            .await
            .values()
            .map(|slot| slot.state.clone())
            .collect();
        sessions.sort_by(|a, b| b.last_activity_at().cmp(a.last_activity_at()));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemorySessionArchive;
    use crate::domain::conversation::Role;
    use crate::domain::script::{ScriptVersionName, StepKey};

    fn chat(s: &str) -> ChatId {
        ChatId::new(s).unwrap()
    }

    fn state(id: &str) -> ConversationState {
        ConversationState::new(
            chat(id),
            ScriptVersionName::new("v1").unwrap(),
            StepKey::new("greeting").unwrap(),
        )
    }

    fn store() -> (Arc<InMemorySessionArchive>, WriteBehindSessionStore) {
        let archive = Arc::new(InMemorySessionArchive::new());
        let store = WriteBehindSessionStore::new(archive.clone());
        (archive, store)
    }

    #[tokio::test]
    async fn put_is_visible_immediately_and_bumps_revision() {
        let (_, store) = store();
        let mut s = state("a");
        s.append(Role::Customer, "hola", Vec::new());

        assert_eq!(store.put(&s).await.unwrap(), 1);
        let read = store.get(&chat("a")).await.unwrap().unwrap();
        assert_eq!(read.revision(), 1);
        assert_eq!(read.history().len(), 1);
        assert!(store.is_dirty(&chat("a")).await);
    }

    #[tokio::test]
    async fn stale_put_conflicts() {
        let (_, store) = store();
        let s = state("a");
        store.put(&s).await.unwrap();

        let err = store.put(&s).await.unwrap_err();
        assert_eq!(
            err,
            SessionStoreError::Conflict {
                chat_id: chat("a"),
                expected: 0,
                actual: 1
            }
        );
    }

    #[tokio::test]
    async fn flush_writes_dirty_sessions_and_cleans_them() {
        let (archive, store) = store();
        store.put(&state("a")).await.unwrap();
        store.put(&state("b")).await.unwrap();

        let report = store.flush().await;

        assert_eq!(report, FlushReport { written: 2, failed: 0 });
        assert_eq!(store.dirty_count().await, 0);
        assert_eq!(archive.stored(&chat("a")).await.unwrap().revision(), 1);
        assert_eq!(store.flush().await.written, 0);
    }

    #[tokio::test]
    async fn failed_flush_keeps_session_dirty() {
        let (archive, store) = store();
        store.put(&state("a")).await.unwrap();
        archive.set_failing(true);

        assert_eq!(store.flush().await.failed, 1);
        assert!(store.is_dirty(&chat("a")).await);

        archive.set_failing(false);
        assert_eq!(store.flush().await.written, 1);
        assert!(!store.is_dirty(&chat("a")).await);
    }

    #[tokio::test]
    async fn reset_removes_from_memory_and_archive() {
        let (archive, store) = store();
        store.put(&state("a")).await.unwrap();
        store.flush().await;

        assert!(store.reset(&chat("a")).await.unwrap());
        assert!(store.get(&chat("a")).await.unwrap().is_none());
        assert!(archive.stored(&chat("a")).await.is_none());
        assert!(!store.reset(&chat("a")).await.unwrap());
    }

    #[tokio::test]
    async fn load_primes_from_archive() {
        let archive = Arc::new(InMemorySessionArchive::new());
        let mut s = state("a");
        s.set_revision(4);
        archive.write(&s).await.unwrap();

        let store = WriteBehindSessionStore::load(archive).await.unwrap();
        let read = store.get(&chat("a")).await.unwrap().unwrap();
        assert_eq!(read.revision(), 4);
        assert_eq!(store.dirty_count().await, 0);
    }

    #[tokio::test]
    async fn list_orders_by_latest_activity() {
        let (_, store) = store();
        store.put(&state("old")).await.unwrap();
        let mut newer = state("new");
        newer.append(Role::Customer, "hola", Vec::new());
        store.put(&newer).await.unwrap();

        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.chat_id().to_string())
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }
}
