//! Call context handed to registered template functions.
//!
//! Registered functions never reach the active template through shared state.
//! Instead, every call receives a [`CallContext`] describing the template that is
//! currently executing: its logical name, its assigned data and the sections
//! known at the time of the call.
//!
//! # Example
//!
//! ```rust
//! use strata::{CallContext, Engine};
//! use minijinja::Value;
//!
//! let mut engine = Engine::new();
//! engine
//!     .register_function_with_context("current", |ctx: &CallContext<'_>, _args: &[Value]| {
//!         Ok(Value::from(ctx.template_name()))
//!     })
//!     .unwrap();
//! assert!(engine.has_function("current"));
//! ```

use crate::template::Sections;
use crate::util::DataMap;

/// The active template, as seen by a registered function.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    template: &'a str,
    data: &'a DataMap,
    sections: &'a Sections,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(template: &'a str, data: &'a DataMap, sections: &'a Sections) -> Self {
        Self {
            template,
            data,
            sections,
        }
    }

    /// The logical name of the executing template (e.g. `"emails::welcome"`).
    pub fn template_name(&self) -> &'a str {
        self.template
    }

    /// All data assigned to the executing template.
    pub fn data(&self) -> &'a DataMap {
        self.data
    }

    /// Looks up a single template variable.
    pub fn get(&self, key: &str) -> Option<&'a serde_json::Value> {
        self.data.get(key)
    }

    /// Content of a section as of the call, including sections captured
    /// earlier in the same execution.
    pub fn section(&self, name: &str) -> Option<&'a str> {
        self.sections.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_context_accessors() {
        let data = crate::util::to_data_map(&json!({"user": "ada"})).unwrap();
        let mut sections = Sections::new();
        sections.replace("title", "Welcome");

        let ctx = CallContext::new("main::home", &data, &sections);
        assert_eq!(ctx.template_name(), "main::home");
        assert_eq!(ctx.get("user"), Some(&json!("ada")));
        assert_eq!(ctx.get("missing"), None);
        assert_eq!(ctx.section("title"), Some("Welcome"));
        assert_eq!(ctx.data().len(), 1);
    }
}
