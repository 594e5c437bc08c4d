//! Read-mostly shared documents: the script registry and the price catalog.
//!
//! Readers take an `Arc` snapshot and never hold a lock across an await.
//! Writers validate, persist, then swap the pointer, so a reader sees either
//! the old document or the new one in full.

use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};
use crate::domain::pricing::PriceCatalog;
use crate::domain::script::{
    default_version, AllocationMode, ScriptConfigError, ScriptDocument, ScriptRegistry,
    ScriptVersion, ScriptVersionName,
};
use crate::ports::{PriceStore, ScriptStore, StoreError};

/// Errors from editing scripts or prices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Script(#[from] ScriptConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LibraryError> for DomainError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::Script(e) => e.into(),
            LibraryError::Validation(e) => e.into(),
            LibraryError::Store(e) => e.into(),
        }
    }
}

fn read<T>(lock: &RwLock<Arc<T>>) -> Arc<T> {
    Arc::clone(&lock.read().unwrap_or_else(|p| p.into_inner()))
}

fn swap<T>(lock: &RwLock<Arc<T>>, next: T) {
    *lock.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(next);
}

/// The live script registry backed by a [`ScriptStore`].
pub struct ScriptLibrary {
    registry: RwLock<Arc<ScriptRegistry>>,
    store: Arc<dyn ScriptStore>,
    // Serializes edits so a concurrent author cannot lose another's version.
    write_lock: Mutex<()>,
}

impl ScriptLibrary {
    /// Loads every stored version and the allocation mode.
    ///
    /// An empty store is seeded with the built-in `v1` funnel, activated.
    /// Versions with graph defects are kept (and logged) so sessions already
    /// on them keep working; a stored mode naming a missing version falls
    /// back to the first loaded one.
    pub async fn load(store: Arc<dyn ScriptStore>) -> Result<Self, LibraryError> {
        let mut versions: Vec<ScriptVersion> = store
            .load_all()
            .await?
            .into_iter()
            .map(|(name, document)| ScriptVersion::load(name, document))
            .collect();

        if versions.is_empty() {
            let seed = default_version()?;
            store.save(seed.name(), seed.document()).await?;
            store
                .save_mode(&AllocationMode::Active(seed.name().clone()))
                .await?;
            tracing::info!(version = %seed.name(), "seeded default script");
            versions.push(seed);
        }

        for version in &versions {
            for issue in version.issues() {
                tracing::error!(version = %version.name(), error = %issue, "script config error");
            }
        }

        let first = versions[0].name().clone();
        let stored_mode = store.load_mode().await?;
        let mode = stored_mode.unwrap_or_else(|| AllocationMode::Active(first.clone()));

        let registry = match ScriptRegistry::new(versions.clone(), mode) {
            Ok(registry) => registry,
            Err(error) => {
                tracing::error!(%error, fallback = %first, "stored allocation mode is unusable");
                ScriptRegistry::new(versions, AllocationMode::Active(first))?
            }
        };

        Ok(Self {
            registry: RwLock::new(Arc::new(registry)),
            store,
            write_lock: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<ScriptRegistry> {
        read(&self.registry)
    }

    /// Adds or replaces a version. The graph must be fully valid.
    pub async fn author(
        &self,
        name: ScriptVersionName,
        document: ScriptDocument,
    ) -> Result<Arc<ScriptVersion>, LibraryError> {
        let version = ScriptVersion::validated(name, document)?;
        let _guard = self.write_lock.lock().await;
        self.store.save(version.name(), version.document()).await?;
        let next = self.snapshot().with_version(version.clone());
        swap(&self.registry, next);
        tracing::info!(version = %version.name(), "script version saved");
        Ok(Arc::new(version))
    }

    /// Changes which versions new sessions get. Existing sessions keep theirs.
    pub async fn set_mode(&self, mode: AllocationMode) -> Result<(), LibraryError> {
        let _guard = self.write_lock.lock().await;
        let next = self.snapshot().with_mode(mode.clone())?;
        self.store.save_mode(&mode).await?;
        swap(&self.registry, next);
        tracing::info!(mode = ?mode, "allocation mode changed");
        Ok(())
    }
}

/// The live price catalog backed by a [`PriceStore`].
pub struct PriceBook {
    catalog: RwLock<Arc<PriceCatalog>>,
    store: Arc<dyn PriceStore>,
    write_lock: Mutex<()>,
}

impl PriceBook {
    /// Loads the stored catalog, or the built-in prices when none was saved.
    pub async fn load(store: Arc<dyn PriceStore>) -> Result<Self, LibraryError> {
        let catalog = match store.load().await? {
            Some(catalog) => catalog,
            None => PriceCatalog::with_defaults(),
        };
        Ok(Self {
            catalog: RwLock::new(Arc::new(catalog)),
            store,
            write_lock: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<PriceCatalog> {
        read(&self.catalog)
    }

    pub async fn update(&self, catalog: PriceCatalog) -> Result<(), LibraryError> {
        catalog.validate()?;
        let _guard = self.write_lock.lock().await;
        self.store.save(&catalog).await?;
        swap(&self.catalog, catalog);
        tracing::info!("price catalog updated");
        Ok(())
    }
}

impl std::fmt::Debug for ScriptLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptLibrary")
            .field("mode", self.snapshot().mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::{InMemoryPriceStore, InMemoryScriptStore};
    use crate::domain::script::{
        default_document, FlowStep, Phase, StepKey, StepRef, DEFAULT_VERSION,
    };
    use std::collections::BTreeMap;

    fn name(s: &str) -> ScriptVersionName {
        ScriptVersionName::new(s).unwrap()
    }

    fn tiny_document() -> ScriptDocument {
        let mut flow = BTreeMap::new();
        flow.insert(
            StepKey::new("greeting").unwrap(),
            FlowStep::new(Phase::Greeting, "hola").with_next(StepRef::Completed),
        );
        ScriptDocument::new(StepKey::new("greeting").unwrap(), flow)
    }

    #[tokio::test]
    async fn empty_store_is_seeded_with_default_version() {
        let store = Arc::new(InMemoryScriptStore::default());
        let library = ScriptLibrary::load(store.clone()).await.unwrap();

        let registry = library.snapshot();
        assert_eq!(
            registry.mode(),
            &AllocationMode::Active(name(DEFAULT_VERSION))
        );
        assert_eq!(store.load_all().await.unwrap().len(), 1);
        assert_eq!(
            store.load_mode().await.unwrap(),
            Some(AllocationMode::Active(name(DEFAULT_VERSION)))
        );
    }

    #[tokio::test]
    async fn authoring_rejects_dangling_next() {
        let library = ScriptLibrary::load(Arc::new(InMemoryScriptStore::default()))
            .await
            .unwrap();
        let mut flow = BTreeMap::new();
        flow.insert(
            StepKey::new("greeting").unwrap(),
            FlowStep::new(Phase::Greeting, "hola")
                .with_next(StepRef::step(StepKey::new("nowhere").unwrap())),
        );
        let result = library
            .author(
                name("v2"),
                ScriptDocument::new(StepKey::new("greeting").unwrap(), flow),
            )
            .await;

        assert!(matches!(
            result,
            Err(LibraryError::Script(ScriptConfigError::DanglingNext { .. }))
        ));
        assert!(library.snapshot().version(&name("v2")).is_none());
    }

    #[tokio::test]
    async fn authored_version_is_visible_in_new_snapshots_only() {
        let library = ScriptLibrary::load(Arc::new(InMemoryScriptStore::default()))
            .await
            .unwrap();
        let before = library.snapshot();
        library.author(name("v2"), tiny_document()).await.unwrap();

        assert!(before.version(&name("v2")).is_none());
        assert!(library.snapshot().version(&name("v2")).is_some());
    }

    #[tokio::test]
    async fn rotation_requires_known_distinct_versions() {
        let library = ScriptLibrary::load(Arc::new(InMemoryScriptStore::default()))
            .await
            .unwrap();
        let v1 = name(DEFAULT_VERSION);

        assert!(library
            .set_mode(AllocationMode::Rotation(v1.clone(), name("v9")))
            .await
            .is_err());
        assert!(library
            .set_mode(AllocationMode::Rotation(v1.clone(), v1.clone()))
            .await
            .is_err());

        library.author(name("v2"), tiny_document()).await.unwrap();
        library
            .set_mode(AllocationMode::Rotation(v1.clone(), name("v2")))
            .await
            .unwrap();
        assert_eq!(
            library.snapshot().mode(),
            &AllocationMode::Rotation(v1, name("v2"))
        );
    }

    #[tokio::test]
    async fn unusable_stored_mode_falls_back_to_first_version() {
        let store = Arc::new(InMemoryScriptStore::default());
        store.save(&name("v1"), &default_document()).await.unwrap();
        store
            .save_mode(&AllocationMode::Active(name("gone")))
            .await
            .unwrap();

        let library = ScriptLibrary::load(store).await.unwrap();
        assert_eq!(
            library.snapshot().mode(),
            &AllocationMode::Active(name("v1"))
        );
    }

    #[tokio::test]
    async fn price_book_defaults_and_updates() {
        let store = Arc::new(InMemoryPriceStore::default());
        let book = PriceBook::load(store.clone()).await.unwrap();
        assert_eq!(book.snapshot().price("Gotas", "60"), Some("48.900"));

        let mut catalog = (*book.snapshot()).clone();
        catalog.set_price("Gotas", "60", "50.000").unwrap();
        book.update(catalog).await.unwrap();

        assert_eq!(book.snapshot().price("Gotas", "60"), Some("50.000"));
        assert!(store.load().await.unwrap().is_some());
    }
}
