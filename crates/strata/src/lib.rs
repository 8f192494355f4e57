//! # Strata - Layered HTML Templates
//!
//! `strata` renders HTML from template files organised in namespaced folders.
//! Templates are executed with [MiniJinja](minijinja) and can wrap themselves
//! in layouts, fill named sections, render other templates inline and call
//! functions registered on the engine.
//!
//! ## Core Concepts
//!
//! - [`Engine`]: search paths, shared data, functions and configuration
//! - [`Template`]: one render of one template, with its data and sections
//! - [`TemplateName`](template::TemplateName): `namespace::file` references
//!   resolved against [`Folders`](template::Folders)
//! - [`TemplateData`]: data shared with every template or with named ones
//! - [`Functions`]: validated name-to-function table, see [`CallContext`]
//! - [`Extension`]: bundles of registrations
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::Engine;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Profile {
//!     name: String,
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(
//!     dir.path().join("layout.phtml"),
//!     "<title>{{ title }}</title>{{ section('content') }}",
//! )
//! .unwrap();
//! std::fs::write(
//!     dir.path().join("profile.phtml"),
//!     "{{ layout('layout', {'title': 'Profile'}) }}Hello {{ name }}!",
//! )
//! .unwrap();
//!
//! let mut engine = Engine::new();
//! engine.add_path(dir.path()).unwrap();
//!
//! let html = engine
//!     .render("profile", &Profile { name: "Ada".into() })
//!     .unwrap();
//! assert_eq!(html, "<title>Profile</title>Hello Ada!");
//! ```
//!
//! ## Namespaces and Themes
//!
//! Bare names live in the `main` namespace; `emails::welcome` looks in the
//! folders registered under `emails`. Registering several folders under one
//! namespace layers them: the most recently added folder is searched first, so
//! a theme folder overrides only the templates it redefines.
//!
//! ## Sections
//!
//! `start(name)` / `push(name)` and `stop()` capture output into a named
//! section, replacing or appending. Layouts read sections with
//! `section(name, default)`; the output of the wrapped template is available
//! as the reserved `content` section.
//!
//! ## Logging
//!
//! Resolution and rendering emit [`tracing`] events at `debug` and `trace`
//! level, inside a `render` span per template. No subscriber is installed.

// Internal modules
pub mod config;
pub mod context;
mod data;
pub mod engine;
mod error;
pub mod extension;
pub mod functions;
pub mod prelude;
pub mod template;
mod util;

// Error type
pub use error::{NameIssue, RenderError, Result};

// Engine and configuration
pub use config::{EngineConfig, DEFAULT_FILE_EXTENSION, DEFAULT_MAX_DEPTH};
pub use engine::Engine;
pub use extension::Extension;

// Rendering
pub use context::CallContext;
pub use template::{Layout, Template};

// Registries
pub use data::TemplateData;
pub use functions::{
    is_valid_identifier, FunctionResult, Functions, TemplateFunction, RESERVED_FUNCTION_NAMES,
};

// Utility exports
pub use util::{escape_html, to_data_map, DataMap};
