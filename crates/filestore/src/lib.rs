//! # filestore
//!
//! Virtual file storage with pluggable backends.
//!
//! Callers address content by a backend-agnostic virtual path (segments
//! joined by a configurable separator). A backend maps that path onto its
//! storage medium and maps results back before returning them.
//!
//! - [`FileStore`] - The operation set every backend implements
//! - [`LocalBackend`] - Local disk, rooted at a physical directory
//! - [`MemoryBackend`] - Ephemeral in-process storage
//! - [`PathTranslator`] - Virtual ↔ physical path mapping
//! - [`StoreOptions`] / [`StoreConfig`] - Validated configuration
//! - [`StoreRegistry`] - Named stores selected at runtime
//!
//! ```no_run
//! # async fn demo() -> filestore::StoreResult<()> {
//! use filestore::{FileStore, LocalBackend, StoreOptions};
//!
//! let config = StoreOptions::new()
//!     .with_root_path("~/content")
//!     .with_separator('/')
//!     .resolve()?;
//! let store = LocalBackend::open(config).await?;
//!
//! store.write_all("pages/home.md", b"# Home", true).await?;
//! for page in store.list_directories("")?.to_vec().await? {
//!     println!("{page}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
mod error;
pub mod path;
mod registry;
mod store;
mod types;

pub use backends::{open_store, LocalBackend, MemoryBackend};
pub use config::{BackendKind, RegistryConfig, StoreConfig, StoreEntry, StoreOptions};
pub use error::{StoreError, StoreResult};
pub use path::PathTranslator;
pub use registry::{StoreInfo, StoreRegistry};
pub use store::FileStore;
pub use types::{
    ContentSource, EntryKind, EntryStream, FileFilter, FileReader, Listing, SeekableRead,
    TimestampKind,
};
