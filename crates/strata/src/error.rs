//! Error types for template resolution and rendering.
//!
//! This module provides [`RenderError`], the single error type for every fallible
//! operation in the crate: registration, name resolution, template execution and
//! the section protocol.
//!
//! Errors raised while a template is executing travel through MiniJinja as the
//! error source and are recovered unchanged at the render boundary (see
//! [`RenderError::from_engine`]), so a `TemplateNotFound` raised by a `fetch()`
//! three includes deep still reaches the caller as `TemplateNotFound`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Why a template reference failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameIssue {
    /// The namespace separator `::` appears more than once.
    RepeatedSeparator,
    /// Nothing follows the namespace separator.
    EmptyFile,
    /// Nothing precedes the namespace separator.
    EmptyNamespace,
    /// A bare name was used while strict namespaces are enabled.
    MissingNamespace,
}

impl fmt::Display for NameIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameIssue::RepeatedSeparator => {
                f.write_str("do not use the folder namespace separator \"::\" more than once")
            }
            NameIssue::EmptyFile => f.write_str("the template name cannot be empty"),
            NameIssue::EmptyNamespace => f.write_str("the template namespace cannot be empty"),
            NameIssue::MissingNamespace => {
                f.write_str("you must use the folder namespace separator \"::\" once")
            }
        }
    }
}

/// Error type for template registration and rendering operations.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    // Configuration
    /// A path was registered under an empty namespace.
    #[error("the template namespace cannot be empty")]
    EmptyNamespace,

    /// An empty directory path was registered.
    #[error("the template directory path cannot be empty")]
    EmptyDirectory,

    /// The same directory was registered twice under one namespace.
    #[error("the directory \"{}\" is already registered under the \"{namespace}\" namespace", .directory.display())]
    PathConflict { namespace: String, directory: PathBuf },

    /// Eager directory checks are on and the directory is missing.
    #[error("the specified directory path \"{}\" does not exist", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A function name is not a valid identifier.
    #[error("\"{0}\" is not a valid function name")]
    InvalidFunctionName(String),

    /// A function name is already taken.
    #[error("the template function name \"{0}\" is already registered")]
    FunctionExists(String),

    /// A function name belongs to a built-in template function.
    #[error("the template function name \"{0}\" is reserved")]
    ReservedFunctionName(String),

    /// Engine configuration could not be loaded.
    #[error("invalid engine configuration: {0}")]
    Config(String),

    // Resolution
    /// The namespace was never registered.
    #[error("the template namespace \"{0}\" was not found")]
    UnknownNamespace(String),

    /// No search root contains the template file.
    #[error("the template \"{name}\" does not exist")]
    TemplateNotFound { name: String },

    /// The template reference is malformed.
    #[error("the template name \"{name}\" is not valid: {issue}")]
    InvalidName { name: String, issue: NameIssue },

    // Execution
    /// The template source failed to compile or raised an error while running.
    #[error("template execution failed: {0}")]
    Execution(#[source] Arc<minijinja::Error>),

    /// The template file could not be read.
    #[error("failed to read template \"{}\": {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Template data could not be converted into a variable map.
    #[error("template data error: {0}")]
    Data(String),

    // Section protocol
    /// `start("content")` or `push("content")` was called.
    #[error("the section name \"content\" is reserved")]
    ReservedSection,

    /// A section was started while another one was still collecting.
    #[error("you cannot nest section \"{requested}\" within section \"{active}\"")]
    NestedSection { active: String, requested: String },

    /// `stop()` was called with no section collecting.
    #[error("you must start a section before you can stop it")]
    SectionNotStarted,

    /// Execution finished while a section was still collecting.
    #[error("the section \"{0}\" was started but never stopped")]
    UnclosedSection(String),

    /// A section was started but its opening was never written to the
    /// output, e.g. `{% set x = start("a") %}`.
    #[error("the section \"{0}\" was started outside of the template output")]
    DetachedSection(String),

    // Functions
    /// A batch pipeline step names no registered function or built-in filter.
    #[error("the batch function could not find the \"{0}\" function")]
    UnknownFunction(String),

    /// Lookup of an unregistered function.
    #[error("the template function \"{0}\" was not found")]
    FunctionNotFound(String),

    // Recursion
    /// A layout chain refers back to a template already on it.
    #[error("layout cycle detected: {}", .chain.join(" -> "))]
    LayoutCycle { chain: Vec<String> },

    /// Nested `fetch`/layout renders went deeper than the configured limit.
    #[error("rendering \"{name}\" exceeds the maximum nesting depth of {limit}")]
    DepthExceeded { name: String, limit: usize },
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

impl RenderError {
    /// Converts a MiniJinja error back into a [`RenderError`].
    ///
    /// If any error in the source chain is a `RenderError` (raised by one of the
    /// crate's template functions), that error is returned as-is. Anything else
    /// becomes [`RenderError::Execution`].
    pub fn from_engine(err: minijinja::Error) -> Self {
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            if let Some(inner) = cause.downcast_ref::<RenderError>() {
                return inner.clone();
            }
            source = cause.source();
        }
        RenderError::Execution(Arc::new(err))
    }

    /// Returns true for errors raised by the section protocol.
    pub fn is_section_error(&self) -> bool {
        matches!(
            self,
            RenderError::ReservedSection
                | RenderError::NestedSection { .. }
                | RenderError::SectionNotStarted
                | RenderError::UnclosedSection(_)
                | RenderError::DetachedSection(_)
        )
    }

    /// Returns true for errors raised while resolving a template name.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            RenderError::UnknownNamespace(_)
                | RenderError::TemplateNotFound { .. }
                | RenderError::InvalidName { .. }
        )
    }
}

// Lets template functions use `?` on crate results; the original error rides
// along as the source and is recovered by `RenderError::from_engine`.
impl From<RenderError> for minijinja::Error {
    fn from(err: RenderError) -> Self {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, err.to_string())
            .with_source(err)
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::Data(err.to_string())
    }
}

impl From<serde_yaml::Error> for RenderError {
    fn from(err: serde_yaml::Error) -> Self {
        RenderError::Config(err.to_string())
    }
}
