//! Engine extensions.
//!
//! An extension bundles registrations (functions, data, paths) so they can be
//! installed in one call with [`Engine::load_extension`](crate::Engine::load_extension).

use crate::engine::Engine;
use crate::error::Result;

/// Something that registers itself with an [`Engine`].
///
/// Closures taking `&mut Engine` are extensions too:
///
/// ```rust
/// use strata::{Engine, Extension};
/// use minijinja::Value;
///
/// let assets = |engine: &mut Engine| -> strata::Result<()> {
///     engine.register_function("asset", |args: &[Value]| {
///         Ok(Value::from(format!("/static/{}", args[0])))
///     })?;
///     Ok(())
/// };
///
/// let mut engine = Engine::new();
/// engine.load_extension(&assets).unwrap();
/// assert!(engine.has_function("asset"));
/// ```
pub trait Extension {
    /// Installs the extension. Called exactly once per load.
    fn register(&self, engine: &mut Engine) -> Result<()>;
}

impl<F> Extension for F
where
    F: Fn(&mut Engine) -> Result<()>,
{
    fn register(&self, engine: &mut Engine) -> Result<()> {
        self(engine)
    }
}
