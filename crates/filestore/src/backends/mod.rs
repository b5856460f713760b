//! Store backends.
//!
//! Backends implement [`FileStore`](crate::FileStore) for different storage
//! media. [`open_store`] builds one from a [`BackendKind`] and options.

mod local;
mod memory;

use std::sync::Arc;

pub use local::LocalBackend;
pub use memory::MemoryBackend;

use crate::config::{BackendKind, StoreOptions};
use crate::error::StoreResult;
use crate::store::FileStore;

/// Resolve `options` and open a store of the requested kind.
pub async fn open_store(kind: BackendKind, options: StoreOptions) -> StoreResult<Arc<dyn FileStore>> {
    let config = options.resolve()?;
    let store: Arc<dyn FileStore> = match kind {
        BackendKind::Local => Arc::new(LocalBackend::open(config).await?),
        BackendKind::Memory => Arc::new(MemoryBackend::from_config(&config)),
    };
    Ok(store)
}
