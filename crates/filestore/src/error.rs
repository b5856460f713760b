//! Store error types.

use std::io;
use thiserror::Error;

/// File store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file already exists and overwriting was not requested.
    #[error("a file at path '{0}' already exists")]
    Conflict(String),

    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Store is read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// Path escapes root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid virtual path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Invalid file filter pattern.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A required configuration option was not supplied.
    #[error("missing required option: {0}")]
    MissingOption(&'static str),

    /// A configuration option has an unusable value.
    #[error("invalid option {key}: {reason}")]
    InvalidOption { key: &'static str, reason: String },

    /// No store registered under the given name.
    #[error("no store registered as: {0}")]
    NoSuchStore(String),

    /// Registry configuration could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// Error raised by the storage medium, passed through unchanged.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Create a Conflict error.
    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an InvalidOption error.
    pub fn invalid_option(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key,
            reason: reason.into(),
        }
    }

    /// Map a medium error to `NotFound` when the medium reports a missing
    /// path, keeping every other error verbatim.
    pub(crate) fn from_io_at(err: io::Error, path: &str) -> Self {
        if is_missing(&err) {
            Self::not_found(path)
        } else {
            Self::Io(err)
        }
    }
}

/// Whether a medium error means nothing exists at the path.
///
/// A file standing in for one of the ancestors (`f.txt/sub`) is reported by
/// the medium as `NotADirectory`; the path is still missing.
pub(crate) fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Convert StoreError to std::io::Error for compatibility.
impl From<StoreError> for io::Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            StoreError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            StoreError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            StoreError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            StoreError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            StoreError::ReadOnly => {
                io::Error::new(io::ErrorKind::PermissionDenied, "store is read-only")
            }
            StoreError::PathEscapesRoot(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            StoreError::InvalidPath(msg) | StoreError::InvalidFilter(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            e @ (StoreError::MissingOption(_) | StoreError::InvalidOption { .. }) => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            StoreError::NoSuchStore(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            StoreError::Config(e) => io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
            StoreError::Io(e) => e,
        }
    }
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;
