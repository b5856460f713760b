//! Named store registry.
//!
//! Callers look stores up by name instead of knowing which backend serves
//! them. A registry can be filled by hand or built from a
//! [`RegistryConfig`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::backends::open_store;
use crate::config::{BackendKind, RegistryConfig};
use crate::error::{StoreError, StoreResult};
use crate::store::FileStore;

/// Information about a registered store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    /// Registry name.
    pub name: String,
    /// Backend serving the store.
    pub backend: BackendKind,
    /// Virtual root prefix.
    pub root_path: String,
    /// Whether the store rejects writes.
    pub read_only: bool,
}

/// Registry of named stores.
pub struct StoreRegistry {
    stores: RwLock<BTreeMap<String, Arc<dyn FileStore>>>,
    default_store: RwLock<Option<String>>,
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &"<locked>")
            .finish()
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(BTreeMap::new()),
            default_store: RwLock::new(None),
        }
    }

    /// Open every store described by `config`.
    ///
    /// Fails on the first store that cannot be opened, or if the default
    /// store names an entry that does not exist.
    pub async fn from_config(config: RegistryConfig) -> StoreResult<Self> {
        let registry = Self::new();
        for (name, entry) in config.stores {
            let store = open_store(entry.backend, entry.options).await?;
            registry.register_arc(name, store).await;
        }
        if let Some(name) = config.default_store {
            registry.set_default(name).await?;
        }
        Ok(registry)
    }

    /// Register a store under `name`, replacing any previous one.
    pub async fn register(&self, name: impl Into<String>, store: impl FileStore + 'static) {
        self.register_arc(name, Arc::new(store)).await;
    }

    /// Register a store (already wrapped in Arc) under `name`.
    pub async fn register_arc(&self, name: impl Into<String>, store: Arc<dyn FileStore>) {
        let name = name.into();
        tracing::debug!(name = %name, backend = %store.backend(), "registered store");
        self.stores.write().await.insert(name, store);
    }

    /// Remove the store registered under `name`.
    ///
    /// Returns `true` if a store was removed. Removing the default store
    /// clears the default.
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.stores.write().await.remove(name).is_some();
        if removed {
            let mut default_store = self.default_store.write().await;
            if default_store.as_deref() == Some(name) {
                *default_store = None;
            }
        }
        removed
    }

    /// Look up a store by name.
    pub async fn get(&self, name: &str) -> StoreResult<Arc<dyn FileStore>> {
        self.stores
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchStore(name.to_string()))
    }

    /// Make `name` the default store. It must already be registered.
    pub async fn set_default(&self, name: impl Into<String>) -> StoreResult<()> {
        let name = name.into();
        if !self.stores.read().await.contains_key(&name) {
            return Err(StoreError::NoSuchStore(name));
        }
        *self.default_store.write().await = Some(name);
        Ok(())
    }

    /// The default store.
    ///
    /// Falls back to the only registered store when no default was set.
    pub async fn default_store(&self) -> StoreResult<Arc<dyn FileStore>> {
        let name = self.default_store.read().await.clone();
        if let Some(name) = name {
            return self.get(&name).await;
        }

        let stores = self.stores.read().await;
        if stores.len() == 1 {
            if let Some(store) = stores.values().next() {
                return Ok(Arc::clone(store));
            }
        }
        Err(StoreError::NoSuchStore("<default>".to_string()))
    }

    /// List all registered stores.
    pub async fn list(&self) -> Vec<StoreInfo> {
        self.stores
            .read()
            .await
            .iter()
            .map(|(name, store)| StoreInfo {
                name: name.clone(),
                backend: store.backend(),
                root_path: store.root_path().to_string(),
                read_only: store.read_only(),
            })
            .collect()
    }
}
