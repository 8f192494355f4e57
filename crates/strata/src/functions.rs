//! Registered template functions.
//!
//! [`Functions`] is the lookup table behind every custom helper a template can
//! call, whether by its own name (`{{ uppercase(name) }}`), through the generic
//! `call("uppercase", name)` entry point, or as a step of a `batch` pipeline.
//!
//! Function names follow the identifier rule `[A-Za-z_][A-Za-z0-9_]*`, extended
//! to accept any non-ASCII code point.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use minijinja::Value;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::CallContext;
use crate::error::{RenderError, Result};

/// Return type of a template function.
pub type FunctionResult = std::result::Result<Value, minijinja::Error>;

type Callback = dyn Fn(&CallContext<'_>, &[Value]) -> FunctionResult + Send + Sync;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_\x{80}-\x{10FFFF}][A-Za-z0-9_\x{80}-\x{10FFFF}]*$")
        .expect("identifier pattern is valid")
});

/// Names of the built-in template functions; none of them can be registered.
pub const RESERVED_FUNCTION_NAMES: &[&str] = &[
    "layout", "start", "push", "stop", "end", "section", "fetch", "insert", "batch", "escape",
    "e", "call",
];

/// Returns true if `name` may be used as a template function name.
///
/// ```rust
/// use strata::is_valid_identifier;
///
/// assert!(is_valid_identifier("uppercase"));
/// assert!(is_valid_identifier("_private2"));
/// assert!(is_valid_identifier("größe"));
/// assert!(!is_valid_identifier("2fast"));
/// assert!(!is_valid_identifier("two words"));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// A named, callable template helper.
#[derive(Clone)]
pub struct TemplateFunction {
    name: String,
    callback: Arc<Callback>,
}

impl TemplateFunction {
    /// Creates a function, validating its name.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidFunctionName`] if `name` is not an identifier,
    /// or [`RenderError::ReservedFunctionName`] if it names a built-in.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Result<Self>
    where
        F: Fn(&CallContext<'_>, &[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(RenderError::InvalidFunctionName(name));
        }
        if RESERVED_FUNCTION_NAMES.contains(&name.as_str()) {
            return Err(RenderError::ReservedFunctionName(name));
        }
        Ok(Self {
            name,
            callback: Arc::new(callback),
        })
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the function.
    pub fn call(&self, ctx: &CallContext<'_>, args: &[Value]) -> FunctionResult {
        (self.callback)(ctx, args)
    }
}

impl fmt::Debug for TemplateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name-to-function lookup table.
#[derive(Debug, Clone, Default)]
pub struct Functions {
    functions: HashMap<String, TemplateFunction>,
}

impl Functions {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::FunctionExists`] if the name is taken.
    pub fn add(&mut self, function: TemplateFunction) -> Result<()> {
        if self.exists(function.name()) {
            return Err(RenderError::FunctionExists(function.name().to_string()));
        }
        self.functions.insert(function.name().to_string(), function);
        Ok(())
    }

    /// Removes and returns a function.
    pub fn remove(&mut self, name: &str) -> Result<TemplateFunction> {
        self.functions
            .remove(name)
            .ok_or_else(|| RenderError::FunctionNotFound(name.to_string()))
    }

    /// Looks up a function.
    pub fn get(&self, name: &str) -> Result<&TemplateFunction> {
        self.functions
            .get(name)
            .ok_or_else(|| RenderError::FunctionNotFound(name.to_string()))
    }

    /// Returns true if a function with this name is registered.
    pub fn exists(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Iterates over registered functions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateFunction> {
        self.functions.values()
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Sections;
    use crate::util::DataMap;

    fn upper() -> TemplateFunction {
        TemplateFunction::new("uppercase", |_ctx, args| {
            Ok(Value::from(
                args.first().map(|v| v.to_string()).unwrap_or_default().to_uppercase(),
            ))
        })
        .unwrap()
    }

    // =========================================================================
    // TemplateFunction tests
    // =========================================================================

    #[test]
    fn test_function_name_validation() {
        for bad in ["", "1abc", "with space", "dash-name", "semi;colon", "a.b"] {
            let result = TemplateFunction::new(bad, |_ctx, _args| Ok(Value::UNDEFINED));
            assert!(
                matches!(result, Err(RenderError::InvalidFunctionName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_reserved_names_rejected() {
        for name in RESERVED_FUNCTION_NAMES {
            let result = TemplateFunction::new(*name, |_ctx, _args| Ok(Value::UNDEFINED));
            assert!(
                matches!(result, Err(RenderError::ReservedFunctionName(ref n)) if n == name),
                "{name:?} should be reserved"
            );
        }
        assert!(TemplateFunction::new("sections", |_ctx, _args| Ok(Value::UNDEFINED)).is_ok());
    }

    #[test]
    fn test_function_call() {
        let data = DataMap::new();
        let sections = Sections::new();
        let ctx = CallContext::new("main::t", &data, &sections);
        let rv = upper().call(&ctx, &[Value::from("abc")]).unwrap();
        assert_eq!(rv.as_str(), Some("ABC"));
    }

    // =========================================================================
    // Functions table tests
    // =========================================================================

    #[test]
    fn test_add_and_get() {
        let mut functions = Functions::new();
        functions.add(upper()).unwrap();
        assert!(functions.exists("uppercase"));
        assert_eq!(functions.get("uppercase").unwrap().name(), "uppercase");
        assert_eq!(functions.len(), 1);
    }

    #[test]
    fn test_add_duplicate_fails() {
        let mut functions = Functions::new();
        functions.add(upper()).unwrap();
        let err = functions.add(upper()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "the template function name \"uppercase\" is already registered"
        );
    }

    #[test]
    fn test_get_missing_fails() {
        let functions = Functions::new();
        assert!(matches!(
            functions.get("nope"),
            Err(RenderError::FunctionNotFound(ref n)) if n == "nope"
        ));
    }

    #[test]
    fn test_remove() {
        let mut functions = Functions::new();
        functions.add(upper()).unwrap();
        functions.remove("uppercase").unwrap();
        assert!(!functions.exists("uppercase"));
        assert!(functions.is_empty());
        assert!(functions.remove("uppercase").is_err());
    }
}
