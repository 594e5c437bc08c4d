//! In-memory stores for tests and ephemeral runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::domain::conversation::{ConversationState, OrderRecord, OrderUpdate};
use crate::domain::foundation::{ChatId, OrderId};
use crate::domain::pricing::PriceCatalog;
use crate::domain::script::{AllocationMode, ScriptDocument, ScriptVersionName};
use crate::domain::variant::StatsDocument;
use crate::ports::{
    OrderStore, PriceStore, ScriptStore, SessionArchive, SessionStoreError, StatsStore,
    StoreError,
};

/// Session archive held in a map, with switchable write failures.
#[derive(Default)]
pub struct InMemorySessionArchive {
    sessions: RwLock<HashMap<ChatId, ConversationState>>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl InMemorySessionArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `write` fails with an I/O error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn stored(&self, chat_id: &ChatId) -> Option<ConversationState> {
        self.sessions.read().await.get(chat_id).cloned()
    }
}

#[async_trait]
impl SessionArchive for InMemorySessionArchive {
    async fn load_all(&self) -> Result<Vec<ConversationState>, SessionStoreError> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }

    async fn write(&self, state: &ConversationState) -> Result<(), SessionStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionStoreError::Io("disk unavailable".to_string()));
        }
        self.sessions
            .write()
            .await
            .insert(state.chat_id().clone(), state.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, chat_id: &ChatId) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(chat_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryScriptStore {
    versions: RwLock<BTreeMap<ScriptVersionName, ScriptDocument>>,
    mode: RwLock<Option<AllocationMode>>,
}

impl InMemoryScriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScriptStore for InMemoryScriptStore {
    async fn load_all(&self) -> Result<Vec<(ScriptVersionName, ScriptDocument)>, StoreError> {
        Ok(self
            .versions
            .read()
            .await
            .iter()
            .map(|(name, doc)| (name.clone(), doc.clone()))
            .collect())
    }

    async fn save(
        &self,
        name: &ScriptVersionName,
        document: &ScriptDocument,
    ) -> Result<(), StoreError> {
        self.versions
            .write()
            .await
            .insert(name.clone(), document.clone());
        Ok(())
    }

    async fn load_mode(&self) -> Result<Option<AllocationMode>, StoreError> {
        Ok(self.mode.read().await.clone())
    }

    async fn save_mode(&self, mode: &AllocationMode) -> Result<(), StoreError> {
        *self.mode.write().await = Some(mode.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPriceStore {
    catalog: RwLock<Option<PriceCatalog>>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn load(&self) -> Result<Option<PriceCatalog>, StoreError> {
        Ok(self.catalog.read().await.clone())
    }

    async fn save(&self, catalog: &PriceCatalog) -> Result<(), StoreError> {
        *self.catalog.write().await = Some(catalog.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStatsStore {
    stats: RwLock<StatsDocument>,
    saves: AtomicUsize,
}

impl InMemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatsStore for InMemoryStatsStore {
    async fn load(&self) -> Result<StatsDocument, StoreError> {
        Ok(self.stats.read().await.clone())
    }

    async fn save(&self, stats: &StatsDocument) -> Result<(), StoreError> {
        *self.stats.write().await = stats.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<OrderRecord>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn append(&self, record: &OrderRecord) -> Result<(), StoreError> {
        self.orders.write().await.push(record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<OrderRecord>, StoreError> {
        Ok(self.orders.read().await.clone())
    }

    async fn update(
        &self,
        id: &OrderId,
        update: &OrderUpdate,
    ) -> Result<Option<OrderRecord>, StoreError> {
        let mut orders = self.orders.write().await;
        Ok(orders.iter_mut().find(|r| r.id() == *id).map(|record| {
            record.apply(update);
            record.clone()
        }))
    }
}
