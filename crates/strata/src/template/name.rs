//! Template name parsing and file resolution.
//!
//! A template reference is either a bare file name (`"profile"`) or a file name
//! qualified with a namespace (`"emails::welcome"`). Bare names belong to the
//! default namespace, [`DEFAULT_NAMESPACE`], unless strict namespaces are on.
//!
//! Resolution appends the configured file extension and walks the namespace's
//! search roots from the most recently added to the oldest, returning the first
//! regular file found.

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, trace};

use super::folders::Folders;
use crate::error::{NameIssue, RenderError, Result};

/// Separator between namespace and file name.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Namespace used for bare template names and by [`Engine::add_path`](crate::Engine::add_path).
pub const DEFAULT_NAMESPACE: &str = "main";

/// A parsed template reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateName {
    reference: String,
    namespace: String,
    file: String,
}

impl TemplateName {
    /// Parses a template reference.
    ///
    /// With `strict`, a reference without a namespace is rejected instead of
    /// being placed in [`DEFAULT_NAMESPACE`].
    ///
    /// ```rust
    /// use strata::template::TemplateName;
    ///
    /// let name = TemplateName::parse("emails::welcome", false).unwrap();
    /// assert_eq!(name.namespace(), "emails");
    /// assert_eq!(name.file(), "welcome");
    ///
    /// let bare = TemplateName::parse("home", false).unwrap();
    /// assert_eq!(bare.qualified(), "main::home");
    ///
    /// assert!(TemplateName::parse("home", true).is_err());
    /// assert!(TemplateName::parse("a::b::c", false).is_err());
    /// ```
    pub fn parse(reference: &str, strict: bool) -> Result<Self> {
        let invalid = |issue| RenderError::InvalidName {
            name: reference.to_string(),
            issue,
        };

        let parts: Vec<&str> = reference.split(NAMESPACE_SEPARATOR).collect();
        let (namespace, file) = match parts.as_slice() {
            [_] if strict => return Err(invalid(NameIssue::MissingNamespace)),
            [file] => (DEFAULT_NAMESPACE, *file),
            [namespace, file] => (*namespace, *file),
            _ => return Err(invalid(NameIssue::RepeatedSeparator)),
        };

        if namespace.is_empty() {
            return Err(invalid(NameIssue::EmptyNamespace));
        }
        if file.is_empty() {
            return Err(invalid(NameIssue::EmptyFile));
        }

        Ok(Self {
            reference: reference.to_string(),
            namespace: namespace.to_string(),
            file: file.to_string(),
        })
    }

    /// The reference exactly as given.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The namespace part (or [`DEFAULT_NAMESPACE`]).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The file part, without extension.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// `namespace::file`, identical for `"home"` and `"main::home"`.
    pub fn qualified(&self) -> String {
        format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, self.file)
    }

    /// The file name to look for in each search root.
    ///
    /// ```rust
    /// use strata::template::TemplateName;
    ///
    /// let name = TemplateName::parse("home", false).unwrap();
    /// assert_eq!(name.file_name(Some("phtml")), "home.phtml");
    /// assert_eq!(name.file_name(None), "home");
    /// ```
    pub fn file_name(&self, extension: Option<&str>) -> String {
        match extension {
            Some(ext) if !ext.is_empty() => format!("{}.{}", self.file, ext),
            _ => self.file.clone(),
        }
    }

    /// Finds the template file, searching the newest search root first.
    ///
    /// # Errors
    ///
    /// - [`RenderError::UnknownNamespace`] if the namespace has no search roots
    /// - [`RenderError::TemplateNotFound`] naming the original reference if no
    ///   root contains the file
    pub fn resolve(&self, folders: &Folders, extension: Option<&str>) -> Result<PathBuf> {
        let roots = folders.get(&self.namespace)?;
        let file_name = self.file_name(extension);

        for root in roots.iter().rev() {
            let candidate = root.join(&file_name);
            trace!(template = %self, candidate = %candidate.display(), "checking candidate");
            if candidate.is_file() {
                debug!(template = %self, path = %candidate.display(), "resolved template");
                return Ok(candidate);
            }
        }

        Err(RenderError::TemplateNotFound {
            name: self.reference.clone(),
        })
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}
