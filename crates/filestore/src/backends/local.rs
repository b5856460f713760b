//! Local filesystem backend.
//!
//! Maps virtual paths onto a directory on local disk. For example, with a
//! physical root of `/srv/site/content` and separator `/`,
//! `add_file("media/logo.png", ..)` writes `/srv/site/content/media/logo.png`.
//!
//! Paths that would escape the root are rejected before any write: `..`
//! lexically, and symlinks pointing outside the root once resolved.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::{BackendKind, StoreConfig};
use crate::error::{StoreError, StoreResult, is_missing};
use crate::path::PathTranslator;
use crate::store::FileStore;
use crate::types::{
    ContentSource, EntryKind, EntryStream, FileFilter, FileReader, Listing, TimestampKind,
};

/// Local filesystem backend.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    config: Arc<StoreConfig>,
    translator: PathTranslator,
}

impl LocalBackend {
    /// Create a backend over an existing physical root.
    ///
    /// The root is canonicalized when it exists (e.g. macOS `/tmp` →
    /// `/private/tmp`); otherwise it is used as given.
    pub fn new(config: StoreConfig) -> Self {
        let root = dunce::canonicalize(config.physical_root())
            .unwrap_or_else(|_| config.physical_root().to_path_buf());
        Self::with_root(config, root)
    }

    /// Create a backend, creating the physical root if it is missing.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(config.physical_root()).await?;
        let root = dunce::canonicalize(config.physical_root())?;
        tracing::info!(
            root_path = %config.root_path(),
            physical_root = %root.display(),
            read_only = config.read_only(),
            "opened local file store"
        );
        Ok(Self::with_root(config, root))
    }

    fn with_root(config: StoreConfig, root: PathBuf) -> Self {
        let translator = PathTranslator::new(&root, config.separator());
        Self {
            config: Arc::new(config.with_physical_root(root)),
            translator,
        }
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> StoreResult<()> {
        if self.config.read_only() {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Resolve a virtual path to a physical path within the root.
    ///
    /// The returned path is the lexical one, so operations act on a symlink
    /// rather than its target, but the link must not lead outside the root.
    async fn resolve(&self, path: &str) -> StoreResult<PathBuf> {
        let full_path = self.translator.to_physical(path)?;
        check_contained(&full_path, self.translator.root(), path).await?;
        Ok(full_path)
    }

    /// The file sitting where a directory would be needed above `full_path`.
    async fn file_ancestor(&self, full_path: &Path) -> Option<PathBuf> {
        let root = self.translator.root();
        for ancestor in full_path.ancestors().skip(1) {
            if ancestor == root || !ancestor.starts_with(root) {
                break;
            }
            if is_kind(ancestor, EntryKind::File).await {
                return Some(ancestor.to_path_buf());
            }
        }
        None
    }

    fn listing(
        &self,
        path: &str,
        kind: EntryKind,
        filter: FileFilter,
    ) -> StoreResult<Listing> {
        let scan = Arc::new(DirScan {
            path: path.to_string(),
            dir: self.translator.to_physical(path)?,
            kind,
            filter,
            translator: self.translator.clone(),
        });
        Ok(Listing::new(move || scan.clone().entries()))
    }
}

/// Refuse `full_path` when its deepest existing ancestor below `root`
/// resolves to somewhere outside `root`.
async fn check_contained(full_path: &Path, root: &Path, path: &str) -> StoreResult<()> {
    for ancestor in full_path.ancestors() {
        if ancestor == root || !ancestor.starts_with(root) {
            break;
        }
        if fs::symlink_metadata(ancestor).await.is_err() {
            continue;
        }

        // A dangling link can't be checked, so it is refused outright.
        let canonical = fs::canonicalize(ancestor).await.map_err(|e| {
            if is_missing(&e) {
                StoreError::path_escapes_root(path)
            } else {
                StoreError::Io(e)
            }
        })?;
        if !dunce::simplified(&canonical).starts_with(root) {
            tracing::debug!(path = %path, target = %canonical.display(), "link leads outside root");
            return Err(StoreError::path_escapes_root(path));
        }
        break;
    }
    Ok(())
}

/// Resolve what an entry is, following symlinks. Dangling links resolve to
/// nothing.
async fn entry_kind(path: &Path) -> Option<EntryKind> {
    let meta = fs::metadata(path).await.ok()?;
    if meta.is_dir() {
        Some(EntryKind::Directory)
    } else if meta.is_file() {
        Some(EntryKind::File)
    } else {
        None
    }
}

async fn is_kind(path: &Path, kind: EntryKind) -> bool {
    entry_kind(path).await == Some(kind)
}

/// Treat a medium "not found" as success.
fn ignore_missing(result: io::Result<()>) -> StoreResult<()> {
    match result {
        Err(e) if is_missing(&e) => Ok(()),
        other => other.map_err(StoreError::from),
    }
}

/// Empty the store root without removing the root itself.
async fn clear_root(root: &Path, recursive: bool) -> StoreResult<()> {
    let mut entries = fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !recursive {
            return Err(StoreError::Io(io::Error::from(
                io::ErrorKind::DirectoryNotEmpty,
            )));
        }
        // file_type() does not follow links, so a linked directory loses
        // only the link.
        let result = if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(entry.path()).await
        } else {
            fs::remove_file(entry.path()).await
        };
        ignore_missing(result)?;
    }
    Ok(())
}

/// One directory enumeration request.
#[derive(Debug)]
struct DirScan {
    path: String,
    dir: PathBuf,
    kind: EntryKind,
    filter: FileFilter,
    translator: PathTranslator,
}

enum ScanState {
    Start,
    Reading(fs::ReadDir),
    Done,
}

impl DirScan {
    fn entries(self: Arc<Self>) -> EntryStream {
        stream::unfold(ScanState::Start, move |state| {
            let scan = Arc::clone(&self);
            async move { scan.advance(state).await }
        })
        .boxed()
    }

    async fn advance(&self, mut state: ScanState) -> Option<(StoreResult<String>, ScanState)> {
        loop {
            match state {
                ScanState::Done => return None,
                ScanState::Start => {
                    if let Err(e) =
                        check_contained(&self.dir, self.translator.root(), &self.path).await
                    {
                        return Some((Err(e), ScanState::Done));
                    }
                    match fs::metadata(&self.dir).await {
                        Ok(meta) if meta.is_dir() => {}
                        Ok(_) => return None,
                        Err(e) if is_missing(&e) => return None,
                        Err(e) => return Some((Err(e.into()), ScanState::Done)),
                    }
                    state = match fs::read_dir(&self.dir).await {
                        Ok(read_dir) => ScanState::Reading(read_dir),
                        Err(e) if is_missing(&e) => return None,
                        Err(e) => return Some((Err(e.into()), ScanState::Done)),
                    };
                }
                ScanState::Reading(mut read_dir) => {
                    let entry = match read_dir.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => return None,
                        Err(e) => return Some((Err(e.into()), ScanState::Done)),
                    };

                    let path = entry.path();
                    if entry_kind(&path).await != Some(self.kind) {
                        state = ScanState::Reading(read_dir);
                        continue;
                    }
                    if self.kind == EntryKind::File
                        && !self.filter.matches(&entry.file_name().to_string_lossy())
                    {
                        state = ScanState::Reading(read_dir);
                        continue;
                    }

                    let item = self.translator.to_virtual(&path);
                    return Some((item, ScanState::Reading(read_dir)));
                }
            }
        }
    }
}

#[async_trait]
impl FileStore for LocalBackend {
    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    fn root_path(&self) -> &str {
        self.config.root_path()
    }

    fn separator(&self) -> char {
        self.config.separator()
    }

    fn read_only(&self) -> bool {
        self.config.read_only()
    }

    fn list_directories(&self, path: &str) -> StoreResult<Listing> {
        self.listing(path, EntryKind::Directory, FileFilter::all())
    }

    async fn delete_directory(&self, path: &str, recursive: bool) -> StoreResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path).await?;

        if !is_kind(&full_path, EntryKind::Directory).await {
            tracing::debug!(path = %path, "delete_directory: nothing to delete");
            return Ok(());
        }

        if full_path == self.translator.root() {
            clear_root(&full_path, recursive).await?;
            tracing::debug!(recursive, "cleared store root");
            return Ok(());
        }

        let result = if recursive {
            fs::remove_dir_all(&full_path).await
        } else {
            fs::remove_dir(&full_path).await
        };
        ignore_missing(result)?;
        tracing::debug!(path = %path, recursive, "deleted directory");
        Ok(())
    }

    async fn directory_exists(&self, path: &str) -> bool {
        match self.resolve(path).await {
            Ok(full_path) => is_kind(&full_path, EntryKind::Directory).await,
            Err(_) => false,
        }
    }

    fn list_files(&self, path: &str, filter: &FileFilter) -> StoreResult<Listing> {
        self.listing(path, EntryKind::File, filter.clone())
    }

    #[tracing::instrument(skip(self, content), fields(root = %self.config.root_path()))]
    async fn add_file(
        &self,
        path: &str,
        mut content: ContentSource<'_>,
        overwrite: bool,
    ) -> StoreResult<u64> {
        self.check_writable()?;
        let full_path = self.resolve(path).await?;

        match entry_kind(&full_path).await {
            Some(EntryKind::File) if !overwrite => return Err(StoreError::conflict(path)),
            Some(EntryKind::Directory) => return Err(StoreError::is_a_directory(path)),
            _ => {}
        }
        if let Some(file) = self.file_ancestor(&full_path).await {
            return Err(StoreError::not_a_directory(self.translator.to_virtual(&file)?));
        }

        // Concurrent callers may race to create the same parent; create_dir_all
        // treats an existing directory as success.
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        content.rewind().await?;

        let mut dest = fs::File::create(&full_path).await?;
        let written = content.copy_to(&mut dest).await?;
        dest.flush().await?;

        tracing::debug!(path = %path, bytes = written, "added file");
        Ok(written)
    }

    async fn open_file(&self, path: &str) -> StoreResult<FileReader> {
        let full_path = self.resolve(path).await?;

        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| StoreError::from_io_at(e, path))?;
        if meta.is_dir() {
            return Err(StoreError::is_a_directory(path));
        }

        let file = fs::File::open(&full_path)
            .await
            .map_err(|e| StoreError::from_io_at(e, path))?;
        Ok(Box::new(file))
    }

    async fn delete_file(&self, path: &str) -> StoreResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path).await?;

        if !is_kind(&full_path, EntryKind::File).await {
            tracing::debug!(path = %path, "delete_file: nothing to delete");
            return Ok(());
        }

        ignore_missing(fs::remove_file(&full_path).await)?;
        tracing::debug!(path = %path, "deleted file");
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        match self.resolve(path).await {
            Ok(full_path) => is_kind(&full_path, EntryKind::File).await,
            Err(_) => false,
        }
    }

    async fn timestamp(&self, path: &str, kind: TimestampKind) -> StoreResult<SystemTime> {
        let full_path = self.resolve(path).await?;

        // Directory and file metadata come from the same call on local disk.
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| StoreError::from_io_at(e, path))?;

        let time = match kind {
            TimestampKind::LastModified => meta.modified(),
            TimestampKind::Created => meta.created(),
            TimestampKind::LastAccessed => meta.accessed(),
        };
        Ok(time?)
    }
}
