//! File-backed script, price, statistics and order stores.
//!
//! Layout under the data directory:
//!
//! - `scripts/<version>.json` and `scripts/_mode.json`
//! - `prices.json`
//! - `stats.json`
//! - `orders.json`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::json_file::{self, JsonFileError, JSON_EXT};
use crate::domain::conversation::{OrderRecord, OrderUpdate};
use crate::domain::foundation::OrderId;
use crate::domain::pricing::PriceCatalog;
use crate::domain::script::{AllocationMode, ScriptDocument, ScriptVersionName};
use crate::domain::variant::StatsDocument;
use crate::ports::{OrderStore, PriceStore, ScriptStore, StatsStore, StoreError};

const MODE_FILE: &str = "_mode.json";

impl From<JsonFileError> for StoreError {
    fn from(err: JsonFileError) -> Self {
        match err {
            JsonFileError::Io { .. } => StoreError::Io(err.to_string()),
            JsonFileError::Parse { ref path, ref source } => StoreError::Corrupt {
                name: path.display().to_string(),
                reason: source.to_string(),
            },
            JsonFileError::Serialize(e) => StoreError::Serialization(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileScriptStore {
    dir: PathBuf,
}

impl FileScriptStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            dir: data_dir.as_ref().join("scripts"),
        }
    }

    fn version_path(&self, name: &ScriptVersionName) -> PathBuf {
        // Version names are already restricted to file-safe characters
        self.dir.join(format!("{}.{}", name, JSON_EXT))
    }
}

#[async_trait]
impl ScriptStore for FileScriptStore {
    async fn load_all(&self) -> Result<Vec<(ScriptVersionName, ScriptDocument)>, StoreError> {
        let mut versions = Vec::new();
        for path in json_file::list_json(&self.dir).await? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // `_mode.json` and anything else not shaped like a version name
            let Ok(name) = ScriptVersionName::new(stem) else {
                continue;
            };
            match json_file::read_optional::<ScriptDocument>(&path).await {
                Ok(Some(document)) => versions.push((name, document)),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(version = %name, error = %e, "skipping unreadable script")
                }
            }
        }
        Ok(versions)
    }

    async fn save(
        &self,
        name: &ScriptVersionName,
        document: &ScriptDocument,
    ) -> Result<(), StoreError> {
        json_file::write_atomic(&self.version_path(name), document).await?;
        Ok(())
    }

    async fn load_mode(&self) -> Result<Option<AllocationMode>, StoreError> {
        Ok(json_file::read_optional(&self.dir.join(MODE_FILE)).await?)
    }

    async fn save_mode(&self, mode: &AllocationMode) -> Result<(), StoreError> {
        json_file::write_atomic(&self.dir.join(MODE_FILE), mode).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FilePriceStore {
    path: PathBuf,
}

impl FilePriceStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join("prices.json"),
        }
    }
}

#[async_trait]
impl PriceStore for FilePriceStore {
    async fn load(&self) -> Result<Option<PriceCatalog>, StoreError> {
        Ok(json_file::read_optional(&self.path).await?)
    }

    async fn save(&self, catalog: &PriceCatalog) -> Result<(), StoreError> {
        json_file::write_atomic(&self.path, catalog).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileStatsStore {
    path: PathBuf,
}

impl FileStatsStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join("stats.json"),
        }
    }
}

#[async_trait]
impl StatsStore for FileStatsStore {
    async fn load(&self) -> Result<StatsDocument, StoreError> {
        Ok(json_file::read_optional(&self.path).await?.unwrap_or_default())
    }

    async fn save(&self, stats: &StatsDocument) -> Result<(), StoreError> {
        json_file::write_atomic(&self.path, stats).await?;
        Ok(())
    }
}

/// The whole ledger in one file; writers hold `lock` across read-modify-write.
#[derive(Debug)]
pub struct FileOrderStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileOrderStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join("orders.json"),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Vec<OrderRecord>, StoreError> {
        Ok(json_file::read_optional(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl OrderStore for FileOrderStore {
    async fn append(&self, record: &OrderRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut orders = self.read().await?;
        orders.push(record.clone());
        json_file::write_atomic(&self.path, &orders).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<OrderRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn update(
        &self,
        id: &OrderId,
        update: &OrderUpdate,
    ) -> Result<Option<OrderRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut orders = self.read().await?;
        let Some(record) = orders.iter_mut().find(|r| r.id() == *id) else {
            return Ok(None);
        };
        record.apply(update);
        let updated = record.clone();
        json_file::write_atomic(&self.path, &orders).await?;
        Ok(Some(updated))
    }
}
