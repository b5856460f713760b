//! The file store contract.
//!
//! Every operation takes a virtual path relative to the store's root; the
//! empty string names the root itself. Backends translate those paths onto
//! their medium and translate results back before returning them.

use std::time::SystemTime;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::config::BackendKind;
use crate::error::StoreResult;
use crate::types::{ContentSource, FileFilter, FileReader, Listing, TimestampKind};

/// Backend-agnostic file store.
///
/// Missing targets are tolerated wherever the operation is idempotent:
/// deletes are no-ops, listings are empty and existence checks are `false`.
/// Reading a file or querying timestamps of a missing path fails with
/// [`StoreError::NotFound`](crate::StoreError::NotFound). A file standing in
/// for an ancestor directory counts as missing. Other medium
/// failures come back as [`StoreError::Io`](crate::StoreError::Io) carrying
/// the medium's error unchanged.
#[async_trait]
pub trait FileStore: Send + Sync {
    // ========================================================================
    // Identity
    // ========================================================================

    /// Which backend implements this store.
    fn backend(&self) -> BackendKind;

    /// Virtual root prefix.
    fn root_path(&self) -> &str;

    /// Virtual path separator.
    fn separator(&self) -> char;

    /// Returns true if write operations are rejected.
    fn read_only(&self) -> bool;

    // ========================================================================
    // Directories
    // ========================================================================

    /// Directories immediately under `path`.
    fn list_directories(&self, path: &str) -> StoreResult<Listing>;

    /// Delete a directory, descending into it only when `recursive`.
    async fn delete_directory(&self, path: &str, recursive: bool) -> StoreResult<()>;

    /// Whether a directory exists at `path`.
    async fn directory_exists(&self, path: &str) -> bool;

    // ========================================================================
    // Files
    // ========================================================================

    /// Files immediately under `path` whose names match `filter`.
    fn list_files(&self, path: &str, filter: &FileFilter) -> StoreResult<Listing>;

    /// Write `content` to `path`, creating missing parent directories.
    ///
    /// Fails with `Conflict` if a file is already there and `overwrite` is
    /// false. Returns the number of bytes written.
    async fn add_file(
        &self,
        path: &str,
        content: ContentSource<'_>,
        overwrite: bool,
    ) -> StoreResult<u64>;

    /// Open a file for reading, positioned at its start.
    async fn open_file(&self, path: &str) -> StoreResult<FileReader>;

    /// Delete a file.
    async fn delete_file(&self, path: &str) -> StoreResult<()>;

    /// Whether a file exists at `path`.
    async fn file_exists(&self, path: &str) -> bool;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// A timestamp of the directory or file at `path`.
    ///
    /// A directory at `path` takes precedence over a file.
    async fn timestamp(&self, path: &str, kind: TimestampKind) -> StoreResult<SystemTime>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Last write time.
    async fn last_modified(&self, path: &str) -> StoreResult<SystemTime> {
        self.timestamp(path, TimestampKind::LastModified).await
    }

    /// Creation time.
    async fn created(&self, path: &str) -> StoreResult<SystemTime> {
        self.timestamp(path, TimestampKind::Created).await
    }

    /// Last access time.
    async fn last_accessed(&self, path: &str) -> StoreResult<SystemTime> {
        self.timestamp(path, TimestampKind::LastAccessed).await
    }

    /// Root-qualified virtual path: `root_path + separator + path`.
    ///
    /// Pure string concatenation; never touches the medium.
    fn absolute_path(&self, path: &str) -> String {
        format!("{}{}{}", self.root_path(), self.separator(), path)
    }

    /// Directories under the root.
    fn root_directories(&self) -> StoreResult<Listing> {
        self.list_directories("")
    }

    /// All files under the root.
    fn root_files(&self) -> StoreResult<Listing> {
        self.list_files("", &FileFilter::all())
    }

    /// Read an entire file.
    async fn read_all(&self, path: &str) -> StoreResult<Vec<u8>> {
        let mut reader = self.open_file(path).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Write a byte slice as a file.
    async fn write_all(&self, path: &str, data: &[u8], overwrite: bool) -> StoreResult<u64> {
        let mut cursor = std::io::Cursor::new(data);
        self.add_file(path, ContentSource::seekable(&mut cursor), overwrite)
            .await
    }
}
