//! Ports for the whole-document stores: script versions, price catalog,
//! variant statistics and the order ledger.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::conversation::{OrderRecord, OrderUpdate};
use crate::domain::foundation::{DomainError, ErrorCode, OrderId};
use crate::domain::pricing::PriceCatalog;
use crate::domain::script::{AllocationMode, ScriptDocument, ScriptVersionName};
use crate::domain::variant::StatsDocument;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(String),

    #[error("document '{name}' is invalid: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("failed to serialize document: {0}")]
    Serialization(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        DomainError::new(ErrorCode::PersistenceError, err.to_string())
    }
}

/// Versioned script definitions and the persisted allocation mode.
///
/// Loading does not validate step graphs; that is the registry's job.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<(ScriptVersionName, ScriptDocument)>, StoreError>;

    async fn save(
        &self,
        name: &ScriptVersionName,
        document: &ScriptDocument,
    ) -> Result<(), StoreError>;

    async fn load_mode(&self) -> Result<Option<AllocationMode>, StoreError>;

    async fn save_mode(&self, mode: &AllocationMode) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// `None` when no catalog was ever saved.
    async fn load(&self) -> Result<Option<PriceCatalog>, StoreError>;

    async fn save(&self, catalog: &PriceCatalog) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn load(&self) -> Result<StatsDocument, StoreError>;

    async fn save(&self, stats: &StatsDocument) -> Result<(), StoreError>;
}

/// Confirmed orders, oldest first.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn append(&self, record: &OrderRecord) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<OrderRecord>, StoreError>;

    /// Applies `update` to the entry with `id`; `None` when there is none.
    async fn update(
        &self,
        id: &OrderId,
        update: &OrderUpdate,
    ) -> Result<Option<OrderRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_stores_are_object_safe() {
        fn _scripts(_: &dyn ScriptStore) {}
        fn _prices(_: &dyn PriceStore) {}
        fn _stats(_: &dyn StatsStore) {}
        fn _orders(_: &dyn OrderStore) {}
    }
}
