//! Template resolution and the per-render execution context.
//!
//! A [`Template`] is created by [`Engine::make`](crate::Engine::make) for one
//! logical name. It owns the data assigned to that render, the sections written
//! so far and the layout designated by the template body.
//!
//! ## Rendering
//!
//! [`Template::render`] resolves the name to a file, executes it with MiniJinja
//! and collects the output. Inside the template, these functions are available
//! next to the data bindings:
//!
//! | Function | Effect |
//! |----------|--------|
//! | `layout(name, data?)` | Wrap the output in another template |
//! | `start(name)` / `push(name)` | Begin capturing into a section (replace / append) |
//! | `stop()` / `end()` | Finish the capture |
//! | `section(name, default?)` | Read a section |
//! | `fetch(name, data?)` / `insert(...)` | Render another template inline |
//! | `batch(value, "trim\|upper")` | Thread a value through functions |
//! | `escape(value, pipeline?)` / `e(...)` | HTML-escape, optionally after a batch |
//! | `call(name, args...)` | Call a registered function by name |
//!
//! Registered functions are also bound under their own names; the names in
//! the table are reserved and cannot be registered.
//!
//! ## Layouts and sections
//!
//! ```jinja
//! {# profile.phtml #}
//! {{ layout("template", {"title": "User Profile"}) }}
//! {{ start("sidebar") }}<a href="/">home</a>{{ stop() }}
//! <h1>{{ name | upper }}</h1>
//! ```
//!
//! ```jinja
//! {# template.phtml #}
//! <title>{{ title }}</title>
//! <aside>{{ section("sidebar", "nothing here") }}</aside>
//! {{ section("content") }}
//! ```
//!
//! When the body of `profile` designates a layout, the layout is rendered as a
//! new template that receives every section of `profile` plus a `content`
//! section holding the output of `profile`.

mod capture;
pub mod folders;
pub mod name;
mod runtime;
mod section;

use std::path::PathBuf;
use std::sync::Arc;

use minijinja::Value;
use serde::Serialize;
use tracing::{debug, debug_span};

use crate::context::CallContext;
use crate::engine::Engine;
use crate::error::{RenderError, Result};
use crate::util::{escape_html, merge_data, to_data_map, DataMap};

pub use folders::Folders;
pub use name::{TemplateName, DEFAULT_NAMESPACE, NAMESPACE_SEPARATOR};
pub use section::{SectionState, Sections, CONTENT_SECTION};

/// A layout designated by a template, with the data it is rendered with.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Template reference of the layout.
    pub name: String,
    /// Data passed to the layout's render.
    pub data: DataMap,
}

/// The chain of renders leading to a template.
///
/// Layouts are tracked by qualified name to detect cycles; `fetch` starts a new
/// chain, since a fetched template may legitimately use a layout its caller
/// is also using.
#[derive(Debug, Clone, Default)]
pub(crate) struct Lineage {
    layouts: Vec<String>,
    depth: usize,
}

impl Lineage {
    pub(crate) fn root(name: &TemplateName) -> Self {
        Self {
            layouts: vec![name.qualified()],
            depth: 0,
        }
    }

    /// Lineage of a template fetched from this one.
    pub(crate) fn fetch(&self, name: &TemplateName, limit: usize) -> Result<Self> {
        Ok(Self {
            layouts: vec![name.qualified()],
            depth: self.deeper(name, limit)?,
        })
    }

    /// Lineage of a layout wrapping this one.
    pub(crate) fn layout(&self, name: &TemplateName, limit: usize) -> Result<Self> {
        let qualified = name.qualified();
        if self.layouts.contains(&qualified) {
            let mut chain = self.layouts.clone();
            chain.push(qualified);
            return Err(RenderError::LayoutCycle { chain });
        }
        let depth = self.deeper(name, limit)?;
        let mut layouts = self.layouts.clone();
        layouts.push(qualified);
        Ok(Self { layouts, depth })
    }

    fn deeper(&self, name: &TemplateName, limit: usize) -> Result<usize> {
        let depth = self.depth + 1;
        if depth > limit {
            return Err(RenderError::DepthExceeded {
                name: name.reference().to_string(),
                limit,
            });
        }
        Ok(depth)
    }
}

/// One render of one template.
///
/// A `Template` is cheap to create; make a new one per render. Rendering the
/// same `Template` twice reuses its assigned data and the sections left behind
/// by the previous render.
#[derive(Debug, Clone)]
pub struct Template {
    engine: Engine,
    name: TemplateName,
    data: DataMap,
    sections: Sections,
    layout: Option<Layout>,
    lineage: Lineage,
}

impl Template {
    pub(crate) fn build(engine: Engine, name: TemplateName, lineage: Lineage) -> Self {
        let data = engine.data(Some(name.reference()));
        Self {
            engine,
            name,
            data,
            sections: Sections::new(),
            layout: None,
            lineage,
        }
    }

    /// The engine this template renders with.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The parsed template name.
    pub fn name(&self) -> &TemplateName {
        &self.name
    }

    /// Data assigned so far, starting with the engine data for this name.
    pub fn data(&self) -> &DataMap {
        &self.data
    }

    /// Merges `data` into the assigned data and returns the result.
    ///
    /// Later keys overwrite earlier ones; `()` leaves the data unchanged.
    pub fn assign<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<&DataMap> {
        merge_data(&mut self.data, to_data_map(data)?);
        Ok(&self.data)
    }

    /// All sections written so far.
    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    /// Content of a section.
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name)
    }

    /// Content of a section, or `default` if it has not been written.
    pub fn section_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.sections.get_or(name, default)
    }

    /// Sets a section, replacing any previous content.
    pub fn section_replace(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.sections.replace(name, content);
    }

    /// Appends to a section.
    pub fn section_append(&mut self, name: impl Into<String>, content: &str) {
        self.sections.append(name, content);
    }

    /// Designates a layout, as `layout()` does inside the template.
    ///
    /// A `layout()` call in the template body overrides it.
    pub fn layout<T: Serialize + ?Sized>(&mut self, name: &str, data: &T) -> Result<()> {
        self.layout = Some(Layout {
            name: name.to_string(),
            data: to_data_map(data)?,
        });
        Ok(())
    }

    /// The layout that will wrap the next render's output, if any.
    pub fn pending_layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Resolves the template file.
    pub fn path(&self) -> Result<PathBuf> {
        self.name
            .resolve(self.engine.folders(), self.engine.file_extension())
    }

    /// Returns true if the template file can be resolved.
    pub fn exists(&self) -> bool {
        self.path().is_ok()
    }

    /// Renders another template with `data` and returns its output.
    ///
    /// The sections of this template are not affected.
    pub fn fetch<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<String> {
        self.engine
            .render_nested(name, to_data_map(data)?, &self.lineage)
    }

    /// Threads `value` through a `|`-separated list of functions.
    ///
    /// Each step is a registered function or a built-in MiniJinja filter
    /// (`upper`, `lower`, `trim`, `title`, ...), applied left to right.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownFunction`] naming the first step that is
    /// neither.
    pub fn batch(&self, value: impl Into<Value>, pipeline: &str) -> Result<Value> {
        let ctx = CallContext::new(self.name.reference(), &self.data, &self.sections);
        let value = value.into();
        runtime::with_builtins(|state| {
            runtime::run_pipeline(self.engine.functions(), &ctx, state, value, pipeline)
        })
    }

    /// HTML-escapes `value`, after running it through `pipeline` if given.
    pub fn escape(&self, value: &str, pipeline: Option<&str>) -> Result<String> {
        let text = match pipeline {
            Some(pipeline) => runtime::display(&self.batch(value, pipeline)?),
            None => value.to_string(),
        };
        Ok(escape_html(&text))
    }

    /// Renders the template with `data` merged into its assigned data.
    ///
    /// If the template designates a layout, the layout is rendered with this
    /// template's sections plus a `content` section holding this template's
    /// output, and its output is returned instead.
    ///
    /// On error, sections captured by the failed execution are discarded and
    /// the template is left as it was before the call (apart from the merged
    /// data).
    pub fn render<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<String> {
        self.assign(data)?;

        let span = debug_span!("render", template = %self.name, depth = self.lineage.depth);
        let _guard = span.enter();

        let path = self.path()?;
        let source = std::fs::read_to_string(&path).map_err(|source| RenderError::Io {
            path: path.clone(),
            source: Arc::new(source),
        })?;

        let executed = runtime::execute(self, &source)?;
        self.sections = executed.sections;
        self.layout = executed.layout;

        let Some(layout) = self.layout.take() else {
            debug!(bytes = executed.output.len(), "rendered template");
            return Ok(executed.output);
        };

        let name = self.engine.parse_name(&layout.name)?;
        let lineage = self
            .lineage
            .layout(&name, self.engine.config().max_depth)?;
        debug!(layout = %name, "rendering layout");

        let mut parent = Template::build(self.engine.clone(), name, lineage);
        parent.sections = self.sections.clone();
        parent
            .sections
            .replace(CONTENT_SECTION, executed.output);
        parent.render(&layout.data)
    }

    pub(crate) fn lineage(&self) -> &Lineage {
        &self.lineage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn engine_with(files: &[(&str, &str)]) -> (TempDir, Engine) {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        let mut engine = Engine::new();
        engine.add_path(dir.path()).unwrap();
        (dir, engine)
    }

    // =========================================================================
    // Lineage
    // =========================================================================

    #[test]
    fn test_lineage_detects_layout_cycle() {
        let a = TemplateName::parse("a", false).unwrap();
        let b = TemplateName::parse("main::b", false).unwrap();

        let root = Lineage::root(&a);
        let first = root.layout(&b, 10).unwrap();
        let err = first.layout(&a, 10).unwrap_err();
        assert!(matches!(
            err,
            RenderError::LayoutCycle { ref chain }
                if chain == &["main::a", "main::b", "main::a"]
        ));
    }

    #[test]
    fn test_lineage_fetch_starts_new_chain() {
        let a = TemplateName::parse("a", false).unwrap();
        let root = Lineage::root(&a);
        let fetched = root.fetch(&a, 10).unwrap();
        assert_eq!(fetched.depth, 1);
        assert!(fetched.layout(&TemplateName::parse("b", false).unwrap(), 10).is_ok());
    }

    #[test]
    fn test_lineage_depth_limit() {
        let a = TemplateName::parse("a", false).unwrap();
        let mut lineage = Lineage::root(&a);
        for _ in 0..2 {
            lineage = lineage.fetch(&a, 2).unwrap();
        }
        assert!(matches!(
            lineage.fetch(&a, 2),
            Err(RenderError::DepthExceeded { limit: 2, .. })
        ));
    }

    // =========================================================================
    // Template
    // =========================================================================

    #[test]
    fn test_preassigned_engine_data() {
        let (_dir, mut engine) = engine_with(&[("home.phtml", "{{ name }}")]);
        engine
            .add_data_for(&serde_json::json!({"name": "Jonathan"}), ["home"])
            .unwrap();
        let template = engine.make("home").unwrap();
        assert_eq!(template.data()["name"], "Jonathan");
    }

    #[test]
    fn test_assign_merges() {
        let (_dir, engine) = engine_with(&[]);
        let mut template = engine.make("any").unwrap();
        template.assign(&serde_json::json!({"a": 1, "b": 1})).unwrap();
        let data = template.assign(&serde_json::json!({"b": 2})).unwrap();
        assert_eq!(data["a"], 1);
        assert_eq!(data["b"], 2);
        template.assign(&()).unwrap();
        assert_eq!(template.data().len(), 2);
    }

    #[test]
    fn test_programmatic_sections() {
        let (_dir, engine) = engine_with(&[]);
        let mut template = engine.make("any").unwrap();
        template.section_replace("title", "Hello");
        template.section_append("title", " World");
        assert_eq!(template.section("title"), Some("Hello World"));
        assert_eq!(template.section_or("missing", "fallback"), "fallback");
    }

    #[test]
    fn test_render_sections_survive_for_inspection() {
        let (_dir, engine) = engine_with(&[(
            "page.phtml",
            "{{ start('title') }}Welcome{{ stop() }}body",
        )]);
        let mut template = engine.make("page").unwrap();
        assert_eq!(template.render(&()).unwrap(), "body");
        assert_eq!(template.section("title"), Some("Welcome"));
    }

    #[test]
    fn test_failed_render_keeps_previous_sections() {
        let (_dir, engine) = engine_with(&[(
            "broken.phtml",
            "{{ start('title') }}Partial{{ stop() }}{{ stop() }}",
        )]);
        let mut template = engine.make("broken").unwrap();
        template.section_replace("title", "Before");
        let err = template.render(&()).unwrap_err();
        assert!(matches!(err, RenderError::SectionNotStarted));
        assert_eq!(template.section("title"), Some("Before"));
    }

    #[test]
    fn test_programmatic_layout() {
        let (_dir, engine) = engine_with(&[
            ("body.phtml", "inner"),
            ("frame.phtml", "[{{ section('content') }}|{{ tag }}]"),
        ]);
        let mut template = engine.make("body").unwrap();
        template
            .layout("frame", &serde_json::json!({"tag": "x"}))
            .unwrap();
        assert_eq!(template.render(&()).unwrap(), "[inner|x]");
        assert!(template.pending_layout().is_none());
    }

    #[test]
    fn test_escape_with_pipeline() {
        let (_dir, engine) = engine_with(&[]);
        let template = engine.make("any").unwrap();
        assert_eq!(
            template.escape("<b>", Some("upper")).unwrap(),
            "&lt;B&gt;"
        );
        assert_eq!(template.escape("a & b", None).unwrap(), "a &amp; b");
    }

    #[test]
    fn test_batch_unknown_step() {
        let (_dir, engine) = engine_with(&[]);
        let template = engine.make("any").unwrap();
        let err = template.batch("x", "upper|nope").unwrap_err();
        assert_eq!(
            err.to_string(),
            "the batch function could not find the \"nope\" function"
        );
    }
}
