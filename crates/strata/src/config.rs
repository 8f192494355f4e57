//! Engine configuration.
//!
//! [`EngineConfig`] collects the settings an [`Engine`](crate::Engine) is built
//! from. It can be constructed in code or loaded from YAML:
//!
//! ```yaml
//! file_extension: html
//! strict_namespaces: true
//! folders:
//!   main: [templates/base, templates/theme]
//!   emails: [templates/emails]
//! ```
//!
//! Every field is optional; missing fields take the values of
//! [`EngineConfig::default`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// Extension appended to template names unless configured otherwise.
pub const DEFAULT_FILE_EXTENSION: &str = "phtml";

/// Default limit for nested `fetch`/layout renders.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Settings for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Extension appended to template names. `None` or `""` uses names verbatim.
    pub file_extension: Option<String>,
    /// Reject template references without a `namespace::` prefix.
    pub strict_namespaces: bool,
    /// Check that directories exist when they are registered rather than when
    /// a template is resolved.
    pub check_directories: bool,
    /// HTML-escape every printed value unless marked safe.
    pub auto_escape: bool,
    /// Maximum nesting of `fetch` and layout renders.
    pub max_depth: usize,
    /// Search roots per namespace, registered in order.
    pub folders: BTreeMap<String, Vec<PathBuf>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            file_extension: Some(DEFAULT_FILE_EXTENSION.to_string()),
            strict_namespaces: false,
            check_directories: false,
            auto_escape: false,
            max_depth: DEFAULT_MAX_DEPTH,
            folders: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from YAML.
    ///
    /// ```rust
    /// use strata::EngineConfig;
    ///
    /// let config = EngineConfig::from_yaml("file_extension: html\nmax_depth: 8").unwrap();
    /// assert_eq!(config.extension(), Some("html"));
    /// assert_eq!(config.max_depth, 8);
    /// assert!(!config.strict_namespaces);
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        Self::from_yaml(&yaml)
    }

    /// The effective file extension, without a leading dot.
    pub fn extension(&self) -> Option<&str> {
        normalize_extension(self.file_extension.as_deref())
    }
}

/// `".html"` and `"html"` are the same extension; an empty one is none.
pub(crate) fn normalize_extension(extension: Option<&str>) -> Option<&str> {
    extension
        .map(|ext| ext.trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.extension(), Some("phtml"));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.auto_escape);
        assert!(config.folders.is_empty());
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r#"
file_extension: .html
strict_namespaces: true
check_directories: true
auto_escape: true
max_depth: 4
folders:
  main:
    - templates/base
    - templates/theme
  emails: [templates/emails]
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.extension(), Some("html"));
        assert!(config.strict_namespaces);
        assert!(config.check_directories);
        assert!(config.auto_escape);
        assert_eq!(config.max_depth, 4);
        assert_eq!(
            config.folders["main"],
            vec![PathBuf::from("templates/base"), PathBuf::from("templates/theme")]
        );
    }

    #[test]
    fn test_from_yaml_empty_is_default() {
        assert_eq!(EngineConfig::from_yaml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_null_extension_disables_it() {
        let config = EngineConfig::from_yaml("file_extension: null").unwrap();
        assert_eq!(config.extension(), None);
        let config = EngineConfig::from_yaml("file_extension: ''").unwrap();
        assert_eq!(config.extension(), None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EngineConfig::from_yaml("cache: true").unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "strict_namespaces: true\n").unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert!(config.strict_namespaces);

        let err = EngineConfig::from_file("/no/such/config.yaml").unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }
}
