//! Prelude for convenient imports.
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let mut engine = Engine::new();
//! engine
//!     .register_function("shout", |args: &[Value]| {
//!         Ok(Value::from(args[0].to_string().to_uppercase()))
//!     })
//!     .unwrap();
//! assert!(engine.has_function("shout"));
//! ```

// Engine and rendering
pub use crate::{CallContext, Engine, EngineConfig, Extension, Template};

// Errors
pub use crate::{RenderError, Result};

// Values passed to and returned from template functions
pub use minijinja::Value;
