//! MiniJinja execution of a resolved template file.
//!
//! Every execution builds a fresh [`Environment`] bound to one [`Template`]:
//! the template's data becomes the render context, and the context API
//! (`layout`, `start`, `push`, `stop`, `section`, `fetch`, `batch`, `escape`,
//! `call`, plus every registered function) is installed as global functions
//! sharing a per-execution [`Scope`].
//!
//! Output is written straight into the scope's [`Capture`] buffer, so a
//! section captured earlier in the same execution reads back as its text.
//!
//! Nothing is cached between executions; the template source is compiled each
//! time it is rendered.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use minijinja::value::Rest;
use minijinja::{escape_formatter, AutoEscape, Environment, Error, ErrorKind, State, Value};

use super::capture::{sanitize, Capture};
use super::section::{SectionState, Sections};
use super::{Layout, Template};
use crate::context::CallContext;
use crate::engine::Engine;
use crate::error::{RenderError, Result};
use crate::functions::Functions;
use crate::util::{escape_html, to_data_map, DataMap};

/// Mutable state shared by the functions of one execution.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    sections: Sections,
    state: SectionState,
    layout: Option<Layout>,
    capture: Capture,
}

/// What an execution leaves behind for the template to commit.
#[derive(Debug)]
pub(crate) struct Executed {
    pub(crate) output: String,
    pub(crate) sections: Sections,
    pub(crate) layout: Option<Layout>,
}

/// Executes `source` as the body of `template`.
///
/// The template itself is not modified; on error every capture opened by this
/// execution is simply dropped with the scope.
pub(crate) fn execute(template: &Template, source: &str) -> Result<Executed> {
    let scope = Arc::new(Mutex::new(Scope {
        sections: template.sections().clone(),
        layout: template.pending_layout().cloned(),
        ..Scope::default()
    }));

    {
        let env = environment(template, &scope);
        let compiled = env
            .template_from_named_str(template.name().reference(), source)
            .map_err(RenderError::from_engine)?;
        compiled
            .render_to_write(
                Value::from_serialize(template.data()),
                Sink(Arc::clone(&scope)),
            )
            .map_err(RenderError::from_engine)?;
    }

    let scope = std::mem::take(&mut *lock(&scope));
    if let Some(name) = scope.state.active() {
        return Err(RenderError::UnclosedSection(name.to_string()));
    }

    Ok(Executed {
        output: scope.capture.into_output(),
        sections: scope.sections,
        layout: scope.layout,
    })
}

fn lock(scope: &Mutex<Scope>) -> MutexGuard<'_, Scope> {
    scope.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer handed to MiniJinja; appends to the scope's capture buffer.
struct Sink(Arc<Mutex<Scope>>);

impl io::Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.0).capture.write(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Registered functions plus what they need to build a [`CallContext`].
#[derive(Clone)]
struct Caller {
    engine: Engine,
    name: Arc<str>,
    data: Arc<DataMap>,
    scope: Arc<Mutex<Scope>>,
}

impl Caller {
    fn call(&self, name: &str, args: &[Value]) -> std::result::Result<Value, Error> {
        let function = self.engine.functions().get(name)?;
        let scope = lock(&self.scope);
        function.call(&CallContext::new(&self.name, &self.data, &scope.sections), args)
    }

    fn batch(&self, state: &State, value: Value, pipeline: &str) -> Result<Value> {
        let scope = lock(&self.scope);
        let ctx = CallContext::new(&self.name, &self.data, &scope.sections);
        run_pipeline(self.engine.functions(), &ctx, state, value, pipeline)
    }
}

fn environment<'source>(template: &Template, scope: &Arc<Mutex<Scope>>) -> Environment<'source> {
    let engine = template.engine().clone();
    let config = engine.config();

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    let auto_escape = config.auto_escape;
    env.set_auto_escape_callback(move |_| {
        if auto_escape {
            AutoEscape::Html
        } else {
            AutoEscape::None
        }
    });

    env.set_formatter(|out, state, value| match sanitize(value) {
        Some(clean) => escape_formatter(out, state, &clean),
        None => escape_formatter(out, state, value),
    });

    // {% include %} and {% import %} resolve through the same search roots.
    let loader = engine.clone();
    env.set_loader(move |name| loader.source(name).map(Some).map_err(Error::from));

    let caller = Caller {
        engine: engine.clone(),
        name: Arc::from(template.name().reference()),
        data: Arc::new(template.data().clone()),
        scope: Arc::clone(scope),
    };

    // Registered functions go in first; a built-in of the same name replaces them.
    for function in engine.functions().iter() {
        let c = caller.clone();
        let name = function.name().to_string();
        env.add_function(
            name.clone(),
            move |args: Rest<Value>| -> std::result::Result<Value, Error> { c.call(&name, &args.0) },
        );
    }

    let s = Arc::clone(scope);
    env.add_function(
        "layout",
        move |name: String, data: Option<Value>| -> std::result::Result<String, Error> {
            let data = value_to_data(data)?;
            lock(&s).layout = Some(Layout { name, data });
            Ok(String::new())
        },
    );

    for (function, append) in [("start", false), ("push", true)] {
        let s = Arc::clone(scope);
        env.add_function(
            function,
            move |name: String| -> std::result::Result<Value, Error> {
                let mut scope = lock(&s);
                scope.state.begin(&name, append)?;
                Ok(scope.capture.begin())
            },
        );
    }

    for function in ["stop", "end"] {
        let s = Arc::clone(scope);
        env.add_function(function, move || -> std::result::Result<String, Error> {
            let mut scope = lock(&s);
            let (name, append) = scope.state.end()?;
            let captured = scope.capture.end(&name)?;
            if append {
                scope.sections.append(name, &captured);
            } else {
                scope.sections.replace(name, captured);
            }
            Ok(String::new())
        });
    }

    let s = Arc::clone(scope);
    env.add_function("section", move |name: String, default: Option<Value>| -> Value {
        let scope = lock(&s);
        match scope.sections.get(&name) {
            Some(content) => Value::from_safe_string(content.to_string()),
            None => default.unwrap_or(Value::UNDEFINED),
        }
    });

    for function in ["fetch", "insert"] {
        let engine = engine.clone();
        let lineage = template.lineage().clone();
        env.add_function(
            function,
            move |name: String, data: Option<Value>| -> std::result::Result<Value, Error> {
                let data = value_to_data(data)?;
                let output = engine.render_nested(&name, data, &lineage)?;
                Ok(Value::from_safe_string(output))
            },
        );
    }

    let c = caller.clone();
    env.add_function(
        "batch",
        move |state: &State, value: Value, pipeline: String| -> std::result::Result<Value, Error> {
            Ok(c.batch(state, value, &pipeline)?)
        },
    );

    for function in ["escape", "e"] {
        let c = caller.clone();
        env.add_function(
            function,
            move |state: &State,
                  value: Value,
                  pipeline: Option<String>|
                  -> std::result::Result<Value, Error> {
                let value = match pipeline {
                    Some(pipeline) => c.batch(state, value, &pipeline)?,
                    None => value,
                };
                Ok(Value::from_safe_string(escape_html(&display(&value))))
            },
        );
    }

    let c = caller.clone();
    env.add_function(
        "call",
        move |name: String, args: Rest<Value>| -> std::result::Result<Value, Error> {
            c.call(&name, &args.0)
        },
    );

    env
}

/// Runs `value` through a `|`-separated list of functions.
///
/// Each step is looked up among the registered functions first, then among
/// MiniJinja's built-in filters.
pub(crate) fn run_pipeline(
    functions: &Functions,
    ctx: &CallContext<'_>,
    state: &State,
    mut value: Value,
    pipeline: &str,
) -> Result<Value> {
    for step in pipeline.split('|').map(str::trim) {
        value = match functions.get(step) {
            Ok(function) => function
                .call(ctx, &[value])
                .map_err(RenderError::from_engine)?,
            Err(_) => match state.apply_filter(step, &[value]) {
                Ok(value) => value,
                Err(err) if err.kind() == ErrorKind::UnknownFilter => {
                    return Err(RenderError::UnknownFunction(step.to_string()));
                }
                Err(err) => return Err(RenderError::from_engine(err)),
            },
        };
    }
    Ok(value)
}

/// Runs `f` with a bare MiniJinja state, for pipelines evaluated outside of a
/// template execution.
pub(crate) fn with_builtins<R>(f: impl FnOnce(&State<'_, '_>) -> Result<R>) -> Result<R> {
    let env = Environment::new();
    let empty = env.template_from_str("").map_err(RenderError::from_engine)?;
    let state = empty
        .render_to_write((), io::sink())
        .map_err(RenderError::from_engine)?;
    f(&state)
}

/// Text of a value as the template would print it; none and undefined print
/// as nothing.
pub(crate) fn display(value: &Value) -> String {
    if is_present(value) {
        value.to_string()
    } else {
        String::new()
    }
}

fn is_present(value: &Value) -> bool {
    !value.is_undefined() && !value.is_none()
}

fn value_to_data(value: Option<Value>) -> Result<DataMap> {
    match value {
        Some(value) if is_present(&value) => to_data_map(&value),
        _ => Ok(DataMap::new()),
    }
}
