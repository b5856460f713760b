//! In-memory backend.
//!
//! Used for scratch stores and testing. All data is ephemeral.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;

use crate::config::{BackendKind, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::path::split_virtual;
use crate::store::FileStore;
use crate::types::{ContentSource, EntryKind, FileFilter, FileReader, Listing, TimestampKind};

/// Path key: validated segments, so `a/b` and `/a//b/` address the same node.
type Key = Vec<String>;

#[derive(Debug, Clone, Copy)]
struct Times {
    created: SystemTime,
    modified: SystemTime,
    accessed: SystemTime,
}

impl Times {
    fn now() -> Self {
        let now = SystemTime::now();
        Self {
            created: now,
            modified: now,
            accessed: now,
        }
    }

    fn get(&self, kind: TimestampKind) -> SystemTime {
        match kind {
            TimestampKind::LastModified => self.modified,
            TimestampKind::Created => self.created,
            TimestampKind::LastAccessed => self.accessed,
        }
    }
}

/// Node in the memory tree.
#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, times: Times },
    Directory { times: Times },
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self {
            Node::File { .. } => EntryKind::File,
            Node::Directory { .. } => EntryKind::Directory,
        }
    }

    fn times(&self) -> &Times {
        match self {
            Node::File { times, .. } | Node::Directory { times } => times,
        }
    }
}

type Tree = Arc<RwLock<BTreeMap<Key, Node>>>;

/// In-memory file store.
///
/// Thread-safe via an internal `RwLock`. All data is lost when dropped.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    root_path: String,
    separator: char,
    read_only: bool,
    nodes: Tree,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new(root_path: impl Into<String>, separator: char) -> Self {
        let mut nodes = BTreeMap::new();
        // Root directory always exists
        nodes.insert(Key::new(), Node::Directory { times: Times::now() });
        Self {
            root_path: root_path.into(),
            separator,
            read_only: false,
            nodes: Arc::new(RwLock::new(nodes)),
        }
    }

    /// Create an empty store from a resolved config. The physical root is
    /// not used.
    pub fn from_config(config: &StoreConfig) -> Self {
        let mut backend = Self::new(config.root_path(), config.separator());
        backend.read_only = config.read_only();
        backend
    }

    /// Set whether this store is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn key(&self, path: &str) -> StoreResult<Key> {
        Ok(split_virtual(path, self.separator)?
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.read_only {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn kind_of(&self, path: &str) -> Option<EntryKind> {
        let key = self.key(path).ok()?;
        self.nodes.read().get(&key).map(Node::kind)
    }

    fn listing(&self, path: &str, kind: EntryKind, filter: FileFilter) -> StoreResult<Listing> {
        let parent = self.key(path)?;
        let nodes = Arc::clone(&self.nodes);
        let separator = self.separator;

        Ok(Listing::new(move || {
            let nodes = Arc::clone(&nodes);
            let parent = parent.clone();
            let filter = filter.clone();
            stream::once(async move {
                let nodes = nodes.read();
                if !matches!(nodes.get(&parent), Some(Node::Directory { .. })) {
                    return Vec::new();
                }
                children(&nodes, &parent)
                    .filter(|(_, node)| node.kind() == kind)
                    .filter(|(name, _)| kind == EntryKind::Directory || filter.matches(name))
                    .map(|(name, _)| {
                        let mut key = parent.clone();
                        key.push(name.to_string());
                        Ok(key.join(&separator.to_string()))
                    })
                    .collect::<Vec<StoreResult<String>>>()
            })
            .flat_map(stream::iter)
            .boxed()
        }))
    }
}

/// Direct children of `parent`, in name order.
fn children<'a>(
    nodes: &'a BTreeMap<Key, Node>,
    parent: &'a Key,
) -> impl Iterator<Item = (&'a str, &'a Node)> + 'a {
    nodes
        .range(parent.clone()..)
        .skip_while(move |(key, _)| *key == parent)
        .take_while(move |(key, _)| key.starts_with(parent))
        .filter(move |(key, _)| key.len() == parent.len() + 1)
        .map(|(key, node)| (key[key.len() - 1].as_str(), node))
}

/// Whether `parent` has any descendants.
fn has_children(nodes: &BTreeMap<Key, Node>, parent: &Key) -> bool {
    nodes
        .range(parent.clone()..)
        .nth(1)
        .is_some_and(|(key, _)| key.starts_with(parent))
}

#[async_trait]
impl FileStore for MemoryBackend {
    fn backend(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn root_path(&self) -> &str {
        &self.root_path
    }

    fn separator(&self) -> char {
        self.separator
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn list_directories(&self, path: &str) -> StoreResult<Listing> {
        self.listing(path, EntryKind::Directory, FileFilter::all())
    }

    async fn delete_directory(&self, path: &str, recursive: bool) -> StoreResult<()> {
        self.check_writable()?;
        let key = self.key(path)?;
        let mut nodes = self.nodes.write();

        if !matches!(nodes.get(&key), Some(Node::Directory { .. })) {
            tracing::debug!(path = %path, "delete_directory: nothing to delete");
            return Ok(());
        }

        if has_children(&nodes, &key) {
            if !recursive {
                return Err(StoreError::directory_not_empty(path));
            }
            nodes.retain(|k, _| !(k.starts_with(&key) && k.len() > key.len()));
        }
        // The root itself is never removed.
        if !key.is_empty() {
            nodes.remove(&key);
        }
        tracing::debug!(path = %path, recursive, "deleted directory");
        Ok(())
    }

    async fn directory_exists(&self, path: &str) -> bool {
        self.kind_of(path) == Some(EntryKind::Directory)
    }

    fn list_files(&self, path: &str, filter: &FileFilter) -> StoreResult<Listing> {
        self.listing(path, EntryKind::File, filter.clone())
    }

    async fn add_file(
        &self,
        path: &str,
        mut content: ContentSource<'_>,
        overwrite: bool,
    ) -> StoreResult<u64> {
        self.check_writable()?;
        let key = self.key(path)?;

        if !overwrite && self.kind_of(path) == Some(EntryKind::File) {
            return Err(StoreError::conflict(path));
        }

        content.rewind().await?;
        let data = content.read_remaining().await?;
        let written = data.len() as u64;

        let mut nodes = self.nodes.write();
        match nodes.get(&key) {
            Some(Node::Directory { .. }) => return Err(StoreError::is_a_directory(path)),
            Some(Node::File { .. }) if !overwrite => return Err(StoreError::conflict(path)),
            _ => {}
        }

        for depth in 0..key.len() {
            let ancestor = key[..depth].to_vec();
            match nodes.get(&ancestor) {
                Some(Node::Directory { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(StoreError::not_a_directory(ancestor.join(&self.separator.to_string())));
                }
                None => {
                    nodes.insert(ancestor, Node::Directory { times: Times::now() });
                }
            }
        }

        let times = match nodes.get(&key) {
            Some(Node::File { times, .. }) => Times {
                modified: SystemTime::now(),
                accessed: SystemTime::now(),
                ..*times
            },
            _ => Times::now(),
        };
        nodes.insert(
            key,
            Node::File {
                data,
                times,
            },
        );

        tracing::debug!(path = %path, bytes = written, "added file");
        Ok(written)
    }

    async fn open_file(&self, path: &str) -> StoreResult<FileReader> {
        let key = self.key(path)?;
        let mut nodes = self.nodes.write();
        match nodes.get_mut(&key) {
            Some(Node::File { data, times }) => {
                times.accessed = SystemTime::now();
                Ok(Box::new(Cursor::new(data.clone())))
            }
            Some(Node::Directory { .. }) => Err(StoreError::is_a_directory(path)),
            None => Err(StoreError::not_found(path)),
        }
    }

    async fn delete_file(&self, path: &str) -> StoreResult<()> {
        self.check_writable()?;
        let key = self.key(path)?;
        let mut nodes = self.nodes.write();

        if !matches!(nodes.get(&key), Some(Node::File { .. })) {
            tracing::debug!(path = %path, "delete_file: nothing to delete");
            return Ok(());
        }
        nodes.remove(&key);
        tracing::debug!(path = %path, "deleted file");
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        self.kind_of(path) == Some(EntryKind::File)
    }

    async fn timestamp(&self, path: &str, kind: TimestampKind) -> StoreResult<SystemTime> {
        let key = self.key(path)?;
        self.nodes
            .read()
            .get(&key)
            .map(|node| node.times().get(kind))
            .ok_or_else(|| StoreError::not_found(path))
    }
}
