//! Namespaced template search roots.
//!
//! [`Folders`] maps each namespace to an ordered list of directories. Several
//! directories can be registered under one namespace; during resolution the
//! most recently added directory is searched first, so a theme folder added
//! after a base folder overrides the base templates it redefines and falls
//! back to the base for everything else.
//!
//! # Example
//!
//! ```rust
//! use strata::template::Folders;
//!
//! let mut folders = Folders::new();
//! folders.add("main", "templates/base", false).unwrap();
//! folders.add("main", "templates/theme/", false).unwrap();
//!
//! let paths = folders.get("main").unwrap();
//! assert_eq!(paths.len(), 2);
//! assert!(paths[1].ends_with("theme"));
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RenderError, Result};

/// Registry of namespace search roots.
#[derive(Debug, Clone, Default)]
pub struct Folders {
    namespaces: BTreeMap<String, Vec<PathBuf>>,
}

impl Folders {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `directory` as a search root for `namespace`.
    ///
    /// Trailing separators are trimmed before the directory is compared and
    /// stored. With `check_exists`, the directory must exist now; otherwise
    /// existence is only checked when a template is resolved.
    ///
    /// # Errors
    ///
    /// - [`RenderError::EmptyNamespace`] / [`RenderError::EmptyDirectory`] for empty input
    /// - [`RenderError::DirectoryNotFound`] if `check_exists` and the directory is missing
    /// - [`RenderError::PathConflict`] if the directory is already registered
    ///   under `namespace`
    pub fn add(
        &mut self,
        namespace: &str,
        directory: impl AsRef<Path>,
        check_exists: bool,
    ) -> Result<()> {
        let directory = directory.as_ref();
        if directory.as_os_str().is_empty() {
            return Err(RenderError::EmptyDirectory);
        }
        if namespace.is_empty() {
            return Err(RenderError::EmptyNamespace);
        }

        let directory = trim_trailing_separators(directory);
        if check_exists && !directory.is_dir() {
            return Err(RenderError::DirectoryNotFound(directory));
        }

        let roots = self.namespaces.entry(namespace.to_string()).or_default();
        if roots.contains(&directory) {
            return Err(RenderError::PathConflict {
                namespace: namespace.to_string(),
                directory,
            });
        }

        debug!(namespace, directory = %directory.display(), "registered template path");
        roots.push(directory);
        Ok(())
    }

    /// Returns the search roots of `namespace`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownNamespace`] if nothing was registered under it.
    pub fn get(&self, namespace: &str) -> Result<&[PathBuf]> {
        self.namespaces
            .get(namespace)
            .map(Vec::as_slice)
            .ok_or_else(|| RenderError::UnknownNamespace(namespace.to_string()))
    }

    /// Removes a namespace and returns its search roots.
    pub fn remove(&mut self, namespace: &str) -> Result<Vec<PathBuf>> {
        self.namespaces
            .remove(namespace)
            .ok_or_else(|| RenderError::UnknownNamespace(namespace.to_string()))
    }

    /// Returns true if `namespace` has at least one search root.
    pub fn contains(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Iterates over registered namespaces in sorted order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Number of registered namespaces.
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    /// Returns true if no namespace is registered.
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// `templates/` and `templates` name the same root.
fn trim_trailing_separators(path: &Path) -> PathBuf {
    path.components().collect()
}
