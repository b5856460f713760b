//! Virtual ↔ physical path translation.
//!
//! Virtual paths are strings whose segments are joined by a configurable
//! separator. Physical paths are native [`PathBuf`]s under a fixed root.
//! Translation is purely lexical: nothing here touches the medium.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Split a virtual path into validated segments.
///
/// Empty segments (leading, trailing or doubled separators) and `.` are
/// skipped. `..` is rejected because it would leave the root, and so is any
/// segment that the native medium would not treat as a single file name.
pub fn split_virtual(path: &str, separator: char) -> StoreResult<Vec<&str>> {
    let mut segments = Vec::new();
    for segment in path.split(separator) {
        match segment {
            "" | "." => continue,
            ".." => return Err(StoreError::path_escapes_root(path)),
            _ => {}
        }

        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == OsStr::new(segment) => {
                segments.push(segment);
            }
            _ => return Err(StoreError::invalid_path(path)),
        }
    }
    Ok(segments)
}

/// Translates between virtual paths and physical paths under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTranslator {
    root: PathBuf,
    separator: char,
}

impl PathTranslator {
    /// Create a translator for the given physical root and virtual separator.
    pub fn new(root: impl Into<PathBuf>, separator: char) -> Self {
        Self {
            root: root.into(),
            separator,
        }
    }

    /// The physical root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The virtual separator.
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Map a relative virtual path onto the physical root.
    ///
    /// The empty path maps to the root itself.
    pub fn to_physical(&self, virtual_path: &str) -> StoreResult<PathBuf> {
        let mut full = self.root.clone();
        for segment in split_virtual(virtual_path, self.separator)? {
            full.push(segment);
        }
        Ok(full)
    }

    /// Map a physical path under the root back to a virtual path.
    ///
    /// Containment is checked component-wise, so `/data/store2/x` is not
    /// considered to live under a root of `/data/store`.
    pub fn to_virtual(&self, physical: &Path) -> StoreResult<String> {
        let relative = physical
            .strip_prefix(&self.root)
            .map_err(|_| StoreError::path_escapes_root(physical.display().to_string()))?;

        let mut out = String::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    if !out.is_empty() {
                        out.push(self.separator);
                    }
                    let name = name
                        .to_str()
                        .ok_or_else(|| StoreError::invalid_path(physical.display().to_string()))?;
                    out.push_str(name);
                }
                Component::CurDir => {}
                _ => return Err(StoreError::invalid_path(physical.display().to_string())),
            }
        }
        Ok(out)
    }
}
