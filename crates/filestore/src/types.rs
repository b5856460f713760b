//! Core store types: content streams, listings, filters.

use std::fmt;
use std::io::{self, SeekFrom};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite};

use crate::error::{StoreError, StoreResult};

/// A readable, seekable byte stream.
pub trait SeekableRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableRead for T {}

/// Stream returned by [`FileStore::open_file`](crate::FileStore::open_file).
pub type FileReader = Box<dyn SeekableRead>;

/// Caller-owned content handed to `add_file`.
///
/// The store borrows the reader for the duration of the call and never
/// closes it. Seekable sources are rewound to their start before copying;
/// forward-only sources are copied from wherever they currently are.
pub enum ContentSource<'a> {
    /// Reader that supports seeking.
    Seekable(&'a mut (dyn SeekableRead + 'a)),
    /// Reader that can only move forward.
    Forward(&'a mut (dyn AsyncRead + Send + Unpin + 'a)),
}

impl<'a> ContentSource<'a> {
    /// Wrap a seekable reader.
    pub fn seekable<R: SeekableRead + 'a>(reader: &'a mut R) -> Self {
        Self::Seekable(reader)
    }

    /// Wrap a forward-only reader.
    pub fn forward<R: AsyncRead + Send + Unpin + 'a>(reader: &'a mut R) -> Self {
        Self::Forward(reader)
    }

    /// Whether the source can be rewound.
    pub fn can_seek(&self) -> bool {
        matches!(self, Self::Seekable(_))
    }

    /// Seek back to offset 0 if supported.
    pub async fn rewind(&mut self) -> io::Result<()> {
        if let Self::Seekable(reader) = self {
            reader.seek(SeekFrom::Start(0)).await?;
        }
        Ok(())
    }

    /// Copy everything that remains into `dest`, returning the byte count.
    pub async fn copy_to<W>(&mut self, dest: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match self {
            Self::Seekable(reader) => tokio::io::copy(&mut **reader, dest).await,
            Self::Forward(reader) => tokio::io::copy(&mut **reader, dest).await,
        }
    }

    /// Read everything that remains into memory.
    pub async fn read_remaining(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Seekable(reader) => reader.read_to_end(&mut buf).await?,
            Self::Forward(reader) => reader.read_to_end(&mut buf).await?,
        };
        Ok(buf)
    }
}

impl fmt::Debug for ContentSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seekable(_) => f.write_str("ContentSource::Seekable"),
            Self::Forward(_) => f.write_str("ContentSource::Forward"),
        }
    }
}

/// One enumeration of virtual paths.
pub type EntryStream = BoxStream<'static, StoreResult<String>>;

/// Restartable, lazily evaluated listing of virtual paths.
///
/// A `Listing` does no I/O until [`stream`](Self::stream) is polled, and
/// every call to `stream` starts a fresh enumeration, so a listing kept
/// across mutations reflects the current state of the store.
#[derive(Clone)]
pub struct Listing {
    source: Arc<dyn Fn() -> EntryStream + Send + Sync>,
}

impl Listing {
    /// Create a listing from a stream factory.
    pub fn new<F>(source: F) -> Self
    where
        F: Fn() -> EntryStream + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(source),
        }
    }

    /// A listing that never yields anything.
    pub fn empty() -> Self {
        Self::new(|| stream::empty().boxed())
    }

    /// Start a new enumeration.
    pub fn stream(&self) -> EntryStream {
        (self.source)()
    }

    /// Run one enumeration to completion.
    pub async fn to_vec(&self) -> StoreResult<Vec<String>> {
        self.stream().try_collect().await
    }
}

impl fmt::Debug for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing").finish_non_exhaustive()
    }
}

/// Kind of entry a listing enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Which timestamp a metadata query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TimestampKind {
    /// Last write.
    LastModified,
    /// Creation.
    Created,
    /// Last access.
    LastAccessed,
}

/// Wildcard filter applied to file names.
///
/// `*` matches any run of characters and `?` exactly one. `*`, `*.*` and the
/// empty pattern match every name.
#[derive(Debug, Clone)]
pub struct FileFilter {
    pattern: String,
    matcher: Option<Regex>,
}

impl FileFilter {
    /// The default pattern.
    pub const ALL: &'static str = "*.*";

    /// Compile a wildcard pattern.
    pub fn new(pattern: &str) -> StoreResult<Self> {
        if pattern.chars().any(std::path::is_separator) {
            return Err(StoreError::InvalidFilter(pattern.to_string()));
        }

        let matcher = match pattern {
            "" | "*" | Self::ALL => None,
            _ => {
                let mut re = String::with_capacity(pattern.len() + 8);
                re.push('^');
                for c in pattern.chars() {
                    match c {
                        '*' => re.push_str(".*"),
                        '?' => re.push('.'),
                        c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
                    }
                }
                re.push('$');
                Some(Regex::new(&re).map_err(|e| StoreError::InvalidFilter(e.to_string()))?)
            }
        };

        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// A filter matching every file.
    pub fn all() -> Self {
        Self {
            pattern: Self::ALL.to_string(),
            matcher: None,
        }
    }

    /// The source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Test a file name (not a path) against the filter.
    pub fn matches(&self, name: &str) -> bool {
        self.matcher.as_ref().is_none_or(|re| re.is_match(name))
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::all()
    }
}
