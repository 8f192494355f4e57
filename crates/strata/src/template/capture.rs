//! Output capture for `start`/`push`/`stop` sections.
//!
//! Templates render straight into a [`Capture`] buffer, so output written so
//! far is visible while functions run. `start` and `push` remember the current
//! offset and return a [`Sentinel`]; printing it stamps the buffer at that
//! offset. `stop` checks that the stamp is still there, cuts everything after
//! it out of the buffer and hands it back as the captured section.
//!
//! A capture whose sentinel was never written at its offset (for instance one
//! opened inside `{% set %}`) cannot be cut out and is reported as detached.
//!
//! Printed values never carry the sentinel delimiters: [`sanitize`] strips them
//! from anything that is not a real sentinel.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr, ValueKind};
use minijinja::Value;

use crate::error::{RenderError, Result};

const MARK_OPEN: char = '\u{F8F0}';
const MARK_CLOSE: char = '\u{F8F1}';

static NEXT_SENTINEL: AtomicU64 = AtomicU64::new(1);

/// The value `start` and `push` return.
#[derive(Debug)]
pub(crate) struct Sentinel {
    text: String,
}

impl Sentinel {
    fn next() -> Self {
        let id = NEXT_SENTINEL.fetch_add(1, Ordering::Relaxed);
        Self {
            text: format!("{MARK_OPEN}{id}{MARK_CLOSE}"),
        }
    }
}

impl Object for Sentinel {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug)]
struct Open {
    offset: usize,
    sentinel: String,
}

/// Output of one execution plus the capture currently open in it.
#[derive(Debug, Default)]
pub(crate) struct Capture {
    output: Vec<u8>,
    open: Option<Open>,
}

impl Capture {
    pub(crate) fn write(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    /// Opens a capture at the current end of the output.
    pub(crate) fn begin(&mut self) -> Value {
        let sentinel = Sentinel::next();
        self.open = Some(Open {
            offset: self.output.len(),
            sentinel: sentinel.text.clone(),
        });
        Value::from_object(sentinel)
    }

    /// Closes the open capture of section `name` and returns its text.
    pub(crate) fn end(&mut self, name: &str) -> Result<String> {
        let open = self.open.take().ok_or(RenderError::SectionNotStarted)?;
        let captured = self
            .output
            .get(open.offset..)
            .and_then(|tail| tail.strip_prefix(open.sentinel.as_bytes()))
            .ok_or_else(|| RenderError::DetachedSection(name.to_string()))?;
        let captured = String::from_utf8_lossy(captured).into_owned();
        self.output.truncate(open.offset);
        Ok(captured)
    }

    pub(crate) fn into_output(self) -> String {
        match String::from_utf8(self.output) {
            Ok(output) => output,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}

/// Returns a copy of `value` without sentinel delimiters, or `None` when the
/// value can be printed as is.
pub(crate) fn sanitize(value: &Value) -> Option<Value> {
    if value.downcast_object_ref::<Sentinel>().is_some()
        || value.is_undefined()
        || value.is_none()
        || value.is_number()
        || value.kind() == ValueKind::Bool
    {
        return None;
    }
    let text = match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    };
    if !text.contains(is_mark) {
        return None;
    }
    let clean: String = text.chars().filter(|c| !is_mark(*c)).collect();
    Some(if value.is_safe() {
        Value::from_safe_string(clean)
    } else {
        Value::from(clean)
    })
}

fn is_mark(c: char) -> bool {
    c == MARK_OPEN || c == MARK_CLOSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print(capture: &mut Capture, value: &Value) {
        capture.write(value.to_string().as_bytes());
    }

    #[test]
    fn test_capture_cuts_section_out() {
        let mut capture = Capture::default();
        capture.write(b"before ");
        let sentinel = capture.begin();
        print(&mut capture, &sentinel);
        capture.write(b"Hello");

        assert_eq!(capture.end("title").unwrap(), "Hello");
        capture.write(b" after");
        assert_eq!(capture.into_output(), "before  after");
    }

    #[test]
    fn test_empty_capture() {
        let mut capture = Capture::default();
        let sentinel = capture.begin();
        print(&mut capture, &sentinel);
        assert_eq!(capture.end("s").unwrap(), "");
        assert_eq!(capture.into_output(), "");
    }

    #[test]
    fn test_unprinted_sentinel_is_detached() {
        let mut capture = Capture::default();
        let _sentinel = capture.begin();
        capture.write(b"no sentinel here");
        let err = capture.end("s").unwrap_err();
        assert!(matches!(err, RenderError::DetachedSection(ref n) if n == "s"));
    }

    #[test]
    fn test_end_without_begin() {
        let mut capture = Capture::default();
        assert!(matches!(
            capture.end("s"),
            Err(RenderError::SectionNotStarted)
        ));
    }

    #[test]
    fn test_stale_sentinel_does_not_match() {
        let mut capture = Capture::default();
        let stale = capture.begin();
        let _fresh = capture.begin();
        print(&mut capture, &stale);
        assert!(matches!(
            capture.end("s"),
            Err(RenderError::DetachedSection(_))
        ));
    }

    #[test]
    fn test_sentinels_are_unique() {
        let mut capture = Capture::default();
        let a = capture.begin().to_string();
        let b = capture.begin().to_string();
        assert_ne!(a, b);
    }

    // ========================================================================
    // sanitize
    // ========================================================================

    #[test]
    fn test_sanitize_leaves_plain_values() {
        assert!(sanitize(&Value::from("plain")).is_none());
        assert!(sanitize(&Value::from(42)).is_none());
        assert!(sanitize(&Value::from(true)).is_none());
        assert!(sanitize(&Value::UNDEFINED).is_none());
    }

    #[test]
    fn test_sanitize_keeps_sentinels() {
        let mut capture = Capture::default();
        assert!(sanitize(&capture.begin()).is_none());
    }

    #[test]
    fn test_sanitize_strips_delimiters() {
        let forged = Value::from(format!("a{MARK_OPEN}1{MARK_CLOSE}b"));
        assert_eq!(sanitize(&forged).unwrap().as_str(), Some("a1b"));

        let safe = Value::from_safe_string(format!("<i>{MARK_CLOSE}</i>"));
        let clean = sanitize(&safe).unwrap();
        assert!(clean.is_safe());
        assert_eq!(clean.as_str(), Some("<i></i>"));
    }

    #[test]
    fn test_sanitize_nested_values() {
        let list = Value::from(vec![format!("{MARK_OPEN}x")]);
        let printed = sanitize(&list).unwrap_or(list);
        assert!(!printed.to_string().contains(MARK_OPEN));
    }
}
