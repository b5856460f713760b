//! Store configuration.
//!
//! [`StoreOptions`] is the loose, caller-facing form (deserializable, built
//! with setters, or read from string pairs). [`StoreOptions::resolve`]
//! validates it once and yields an immutable [`StoreConfig`].
//!
//! Registries of named stores are described by [`RegistryConfig`], loaded
//! from RON:
//!
//! ```ron
//! (
//!     default_store: Some("content"),
//!     stores: {
//!         "content": (
//!             backend: Local,
//!             options: (root_path: Some("~/content"), path_separator: Some("/")),
//!         ),
//!         "scratch": (
//!             backend: Memory,
//!             options: (root_path: Some("scratch"), path_separator: Some("/")),
//!         ),
//!     },
//! )
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::path::split_virtual;

/// Option key for the virtual root prefix.
pub const ROOT_PATH: &str = "rootPath";
/// Option key for the virtual path separator.
pub const PATH_SEPARATOR: &str = "pathSeparator";
/// Option key for an explicit physical root.
pub const ROOT_PHYSICAL_PATH: &str = "rootPhysicalPath";
/// Option key for the directory `rootPath` is mapped onto.
pub const BASE_DIR: &str = "baseDir";
/// Option key for read-only mode.
pub const READ_ONLY: &str = "readOnly";

/// Unvalidated store options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Virtual root prefix (required).
    #[serde(default, alias = "rootPath")]
    pub root_path: Option<String>,

    /// Separator used in virtual paths (required, one character).
    #[serde(default, alias = "pathSeparator")]
    pub path_separator: Option<String>,

    /// Explicit physical root. When absent, `root_path` is mapped onto
    /// `base_dir`.
    #[serde(default, alias = "rootPhysicalPath")]
    pub root_physical_path: Option<PathBuf>,

    /// Directory that `root_path` is relative to (default: working dir).
    #[serde(default, alias = "baseDir")]
    pub base_dir: Option<PathBuf>,

    /// Reject write operations.
    #[serde(default, alias = "readOnly")]
    pub read_only: bool,
}

impl StoreOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from untyped key/value pairs.
    ///
    /// Recognized keys are [`ROOT_PATH`], [`PATH_SEPARATOR`],
    /// [`ROOT_PHYSICAL_PATH`], [`BASE_DIR`] and [`READ_ONLY`]. Anything else
    /// is ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut options = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.into();
            match key {
                ROOT_PATH => options.root_path = Some(value),
                PATH_SEPARATOR => options.path_separator = Some(value),
                ROOT_PHYSICAL_PATH => options.root_physical_path = Some(value.into()),
                BASE_DIR => options.base_dir = Some(value.into()),
                READ_ONLY => {
                    options.read_only = value.parse().map_err(|_| {
                        StoreError::invalid_option(READ_ONLY, format!("not a boolean: {value}"))
                    })?;
                }
                other => tracing::debug!(key = %other, "ignoring unknown store option"),
            }
        }
        Ok(options)
    }

    /// Set the virtual root prefix.
    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    /// Set the virtual separator.
    pub fn with_separator(mut self, separator: char) -> Self {
        self.path_separator = Some(separator.to_string());
        self
    }

    /// Set an explicit physical root.
    pub fn with_root_physical_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_physical_path = Some(path.into());
        self
    }

    /// Set the base directory used to map the root path.
    pub fn with_base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    /// Set read-only mode.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Validate the options and produce a [`StoreConfig`].
    pub fn resolve(self) -> StoreResult<StoreConfig> {
        let root_path = self.root_path.ok_or(StoreError::MissingOption(ROOT_PATH))?;
        if root_path.is_empty() {
            return Err(StoreError::invalid_option(ROOT_PATH, "must not be empty"));
        }

        let raw_separator = self
            .path_separator
            .ok_or(StoreError::MissingOption(PATH_SEPARATOR))?;
        let mut chars = raw_separator.chars();
        let separator = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(StoreError::invalid_option(
                    PATH_SEPARATOR,
                    format!("expected exactly one character, got {raw_separator:?}"),
                ));
            }
        };

        let physical_root = match self.root_physical_path {
            Some(path) => path,
            None => {
                let base = match self.base_dir {
                    Some(base) => base,
                    None => std::env::current_dir()?,
                };
                map_root_path(&root_path, separator, &base)?
            }
        };

        Ok(StoreConfig {
            root_path,
            separator,
            physical_root,
            read_only: self.read_only,
        })
    }
}

/// Map an application-relative root path (`~/content`, `content`) onto a
/// base directory.
pub fn map_root_path(root_path: &str, separator: char, base: &Path) -> StoreResult<PathBuf> {
    let relative = root_path.trim_start_matches('~');
    let mut physical = base.to_path_buf();
    for segment in split_virtual(relative, separator)? {
        physical.push(segment);
    }
    Ok(physical)
}

/// Resolved, immutable store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    root_path: String,
    separator: char,
    physical_root: PathBuf,
    read_only: bool,
}

impl StoreConfig {
    /// Virtual root prefix.
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Virtual path separator.
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Physical root directory.
    pub fn physical_root(&self) -> &Path {
        &self.physical_root
    }

    /// Whether write operations are rejected.
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Copy of this config with a different physical root.
    pub(crate) fn with_physical_root(&self, physical_root: PathBuf) -> Self {
        Self {
            physical_root,
            ..self.clone()
        }
    }
}

/// Backend implementation selector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    /// Local disk.
    Local,
    /// Ephemeral in-memory storage.
    Memory,
}

/// One named store in a registry config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Which backend serves this store.
    pub backend: BackendKind,
    /// Backend options.
    #[serde(default)]
    pub options: StoreOptions,
}

/// Configuration for a [`StoreRegistry`](crate::StoreRegistry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Name of the store returned by `default_store()`.
    #[serde(default)]
    pub default_store: Option<String>,
    /// Stores keyed by name.
    #[serde(default)]
    pub stores: BTreeMap<String, StoreEntry>,
}

impl RegistryConfig {
    /// Parse a registry config from RON text.
    pub fn from_ron(text: &str) -> StoreResult<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Load a registry config from a RON file.
    pub async fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let config = Self::from_ron(&text)?;
        tracing::info!(path = %path.display(), stores = config.stores.len(), "loaded store registry config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_physical_root() {
        let config = StoreOptions::new()
            .with_root_path("content")
            .with_separator('/')
            .with_root_physical_path("/srv/content")
            .resolve()
            .unwrap();
        assert_eq!(config.root_path(), "content");
        assert_eq!(config.separator(), '/');
        assert_eq!(config.physical_root(), Path::new("/srv/content"));
        assert!(!config.read_only());
    }

    #[test]
    fn test_resolve_maps_root_onto_base_dir() {
        let config = StoreOptions::new()
            .with_root_path("~/app_data/content")
            .with_separator('/')
            .with_base_dir("/opt/site")
            .resolve()
            .unwrap();
        assert_eq!(
            config.physical_root(),
            Path::new("/opt/site/app_data/content")
        );
    }

    #[test]
    fn test_missing_required_options() {
        let err = StoreOptions::new().with_separator('/').resolve().unwrap_err();
        assert!(matches!(err, StoreError::MissingOption(ROOT_PATH)));

        let err = StoreOptions::new()
            .with_root_path("content")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingOption(PATH_SEPARATOR)));
    }

    #[test]
    fn test_separator_must_be_one_char() {
        let mut options = StoreOptions::new().with_root_path("content");
        options.path_separator = Some("::".to_string());
        assert!(matches!(
            options.clone().resolve(),
            Err(StoreError::InvalidOption { key: PATH_SEPARATOR, .. })
        ));

        options.path_separator = Some(String::new());
        assert!(options.resolve().is_err());
    }

    #[test]
    fn test_from_pairs() {
        let options = StoreOptions::from_pairs([
            ("rootPath", "~/content"),
            ("pathSeparator", "/"),
            ("rootPhysicalPath", "/tmp/content"),
            ("readOnly", "true"),
            ("provider", "ignored"),
        ])
        .unwrap();
        assert_eq!(options.root_path.as_deref(), Some("~/content"));
        assert_eq!(options.path_separator.as_deref(), Some("/"));
        assert_eq!(
            options.root_physical_path.as_deref(),
            Some(Path::new("/tmp/content"))
        );
        assert!(options.read_only);
    }

    #[test]
    fn test_from_pairs_bad_bool() {
        let err = StoreOptions::from_pairs([("readOnly", "sometimes")]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOption { key: READ_ONLY, .. }));
    }

    #[test]
    fn test_backend_kind_strings() {
        assert_eq!(BackendKind::Local.to_string(), "local");
        assert_eq!("Memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert!("s3".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_registry_config_from_ron() {
        let text = r#"
            (
                default_store: Some("content"),
                stores: {
                    "content": (
                        backend: Local,
                        options: (
                            root_path: Some("content"),
                            path_separator: Some("/"),
                            root_physical_path: Some("/srv/content"),
                        ),
                    ),
                    "scratch": (
                        backend: Memory,
                        options: (root_path: Some("scratch"), path_separator: Some("/"), read_only: true),
                    ),
                },
            )
        "#;
        let config = RegistryConfig::from_ron(text).unwrap();
        assert_eq!(config.default_store.as_deref(), Some("content"));
        assert_eq!(config.stores.len(), 2);
        assert_eq!(config.stores["content"].backend, BackendKind::Local);
        assert!(config.stores["scratch"].options.read_only);
    }

    #[test]
    fn test_registry_config_parse_error() {
        assert!(matches!(
            RegistryConfig::from_ron("(stores: {"),
            Err(StoreError::Config(_))
        ));
    }
}
