//! The template engine: search paths, data, functions and configuration.
//!
//! [`Engine`] is the composition root. Register search paths, shared data and
//! functions on it, then create [`Template`]s with [`Engine::make`] or render
//! directly with [`Engine::render`].
//!
//! # Example
//!
//! ```rust
//! use strata::Engine;
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("hello.phtml"), "Hello {{ name }}!").unwrap();
//!
//! let mut engine = Engine::new();
//! engine.add_path(dir.path()).unwrap();
//!
//! let output = engine.render("hello", &json!({"name": "World"})).unwrap();
//! assert_eq!(output, "Hello World!");
//! ```
//!
//! # Sharing
//!
//! Cloning an `Engine` is cheap: its registries live behind an [`Arc`] and are
//! only copied when a clone is modified. Every [`Template`] holds such a clone,
//! so registrations made after a template was created do not affect it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use minijinja::Value;
use serde::Serialize;
use tracing::debug;

use crate::config::{normalize_extension, EngineConfig};
use crate::context::CallContext;
use crate::data::TemplateData;
use crate::error::{RenderError, Result};
use crate::extension::Extension;
use crate::functions::{FunctionResult, Functions, TemplateFunction};
use crate::template::{Folders, Lineage, Template, TemplateName, DEFAULT_NAMESPACE};
use crate::util::{to_data_map, DataMap};

#[derive(Debug, Clone, Default)]
struct Registry {
    config: EngineConfig,
    folders: Folders,
    functions: Functions,
    data: TemplateData,
}

/// Template engine.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    inner: Arc<Registry>,
}

impl Engine {
    /// Creates an engine with the default configuration and no search paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine from a configuration, registering its folders.
    ///
    /// # Errors
    ///
    /// Fails like [`Engine::add_namespaced_path`] for any configured folder.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let folders = config.folders.clone();
        let mut engine = Self {
            inner: Arc::new(Registry {
                config,
                ..Registry::default()
            }),
        };
        for (namespace, directories) in &folders {
            for directory in directories {
                engine.add_namespaced_path(namespace, directory)?;
            }
        }
        Ok(engine)
    }

    fn registry(&mut self) -> &mut Registry {
        Arc::make_mut(&mut self.inner)
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // =========================================================================
    // Search paths
    // =========================================================================

    /// Adds a search root to the default namespace.
    pub fn add_path(&mut self, directory: impl AsRef<Path>) -> Result<&mut Self> {
        self.add_namespaced_path(DEFAULT_NAMESPACE, directory)
    }

    /// Adds a search root to `namespace`.
    ///
    /// Roots added later are searched first.
    ///
    /// # Errors
    ///
    /// - [`RenderError::EmptyNamespace`] / [`RenderError::EmptyDirectory`]
    /// - [`RenderError::PathConflict`] if the root is already registered
    /// - [`RenderError::DirectoryNotFound`] if `check_directories` is on and the
    ///   directory is missing
    pub fn add_namespaced_path(
        &mut self,
        namespace: &str,
        directory: impl AsRef<Path>,
    ) -> Result<&mut Self> {
        let check = self.config().check_directories;
        self.registry().folders.add(namespace, directory, check)?;
        Ok(self)
    }

    /// The search roots of `namespace`, oldest first.
    pub fn paths(&self, namespace: &str) -> Result<&[PathBuf]> {
        self.inner.folders.get(namespace)
    }

    /// Removes a namespace with all of its search roots.
    pub fn remove_namespace(&mut self, namespace: &str) -> Result<Vec<PathBuf>> {
        self.registry().folders.remove(namespace)
    }

    /// All registered search roots.
    pub fn folders(&self) -> &Folders {
        &self.inner.folders
    }

    /// Sets the extension appended to template names.
    ///
    /// A leading dot is ignored; `None` or `""` uses names verbatim.
    pub fn set_file_extension(&mut self, extension: Option<&str>) -> &mut Self {
        let extension = normalize_extension(extension).map(str::to_string);
        debug!(?extension, "set file extension");
        self.registry().config.file_extension = extension;
        self
    }

    /// The extension appended to template names, without a leading dot.
    pub fn file_extension(&self) -> Option<&str> {
        self.config().extension()
    }

    // =========================================================================
    // Data
    // =========================================================================

    /// Shares `data` with every template.
    ///
    /// `data` must serialize to a map. Keys are merged into data added earlier.
    pub fn add_data<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<&mut Self> {
        let data = to_data_map(data)?;
        self.registry().data.share_with_all(data);
        Ok(self)
    }

    /// Shares `data` with the named templates only.
    ///
    /// Names are matched against the reference passed to [`Engine::render`]
    /// exactly as written. An empty list shares with every template.
    pub fn add_data_for<T, I, S>(&mut self, data: &T, templates: I) -> Result<&mut Self>
    where
        T: Serialize + ?Sized,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let data = to_data_map(data)?;
        self.registry().data.add(data, templates);
        Ok(self)
    }

    /// Data preassigned to `template`, or only the shared data for `None`.
    pub fn data(&self, template: Option<&str>) -> DataMap {
        self.inner.data.get(template)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Registers a function callable from templates by `name`.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidFunctionName`] if `name` is not an identifier
    /// - [`RenderError::ReservedFunctionName`] if `name` is a built-in such as `section`
    /// - [`RenderError::FunctionExists`] if `name` is taken
    pub fn register_function<F>(&mut self, name: &str, callback: F) -> Result<&mut Self>
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        self.register_function_with_context(name, move |_: &CallContext<'_>, args: &[Value]| {
            callback(args)
        })
    }

    /// Registers a function that also receives the calling template's context.
    pub fn register_function_with_context<F>(
        &mut self,
        name: &str,
        callback: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&CallContext<'_>, &[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        let function = TemplateFunction::new(name, callback)?;
        self.registry().functions.add(function)?;
        debug!(name, "registered template function");
        Ok(self)
    }

    /// Looks up a registered function.
    pub fn function(&self, name: &str) -> Result<&TemplateFunction> {
        self.inner.functions.get(name)
    }

    /// Returns true if a function is registered under `name`.
    pub fn has_function(&self, name: &str) -> bool {
        self.inner.functions.exists(name)
    }

    /// Unregisters a function.
    pub fn remove_function(&mut self, name: &str) -> Result<TemplateFunction> {
        self.registry().functions.remove(name)
    }

    /// All registered functions.
    pub fn functions(&self) -> &Functions {
        &self.inner.functions
    }

    // =========================================================================
    // Extensions
    // =========================================================================

    /// Installs an extension.
    pub fn load_extension<E: Extension + ?Sized>(&mut self, extension: &E) -> Result<&mut Self> {
        extension.register(self)?;
        Ok(self)
    }

    /// Installs several extensions in order, stopping at the first failure.
    pub fn load_extensions<'a, I>(&mut self, extensions: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = &'a dyn Extension>,
    {
        for extension in extensions {
            extension.register(self)?;
        }
        Ok(self)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    pub(crate) fn parse_name(&self, reference: &str) -> Result<TemplateName> {
        TemplateName::parse(reference, self.config().strict_namespaces)
    }

    /// Creates a template for `name` with its preassigned data.
    ///
    /// The name is parsed but not resolved; a missing file is only reported
    /// when the template is rendered.
    pub fn make(&self, name: &str) -> Result<Template> {
        let name = self.parse_name(name)?;
        let lineage = Lineage::root(&name);
        Ok(Template::build(self.clone(), name, lineage))
    }

    /// Renders `name` with `data`.
    ///
    /// # Errors
    ///
    /// Any resolution, execution or section error raised by the template or by
    /// the templates and layouts it renders.
    pub fn render<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<String> {
        self.make(name)?.render(data)
    }

    /// Returns true if `name` resolves to a file.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_ok()
    }

    /// Resolves `name` to a file.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        self.parse_name(name)?
            .resolve(self.folders(), self.file_extension())
    }

    /// Reads the source of `name`, for `{% include %}` and friends.
    pub(crate) fn source(&self, name: &str) -> Result<String> {
        let path = self.path(name)?;
        std::fs::read_to_string(&path).map_err(|source| RenderError::Io {
            path,
            source: Arc::new(source),
        })
    }

    pub(crate) fn render_nested(
        &self,
        name: &str,
        data: DataMap,
        parent: &Lineage,
    ) -> Result<String> {
        let name = self.parse_name(name)?;
        let lineage = parent.fetch(&name, self.config().max_depth)?;
        Template::build(self.clone(), name, lineage).render(&data)
    }
}
