//! Utility functions for data conversion and HTML escaping.

use serde::Serialize;
use serde_json::Value;

use crate::error::{RenderError, Result};

/// A map of template variables.
///
/// Each key becomes a variable visible to the template being rendered.
pub type DataMap = serde_json::Map<String, Value>;

/// Serializes `data` into a variable map.
///
/// Anything that serializes to a JSON object is accepted. Unit values (`()`,
/// `None`, `null`) yield an empty map so callers can render without data.
///
/// # Example
///
/// ```rust
/// use strata::to_data_map;
/// use serde_json::json;
///
/// let map = to_data_map(&json!({"title": "Home"})).unwrap();
/// assert_eq!(map["title"], "Home");
///
/// assert!(to_data_map(&()).unwrap().is_empty());
/// assert!(to_data_map(&42).is_err());
/// ```
pub fn to_data_map<T: Serialize + ?Sized>(data: &T) -> Result<DataMap> {
    match serde_json::to_value(data)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(DataMap::new()),
        other => Err(RenderError::Data(format!(
            "template data must serialize to a map, got {}",
            json_kind(&other)
        ))),
    }
}

/// Merges `from` into `into`; keys in `from` win.
pub(crate) fn merge_data(into: &mut DataMap, from: DataMap) {
    for (key, value) in from {
        into.insert(key, value);
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}

/// HTML-escapes a string for use in element content or quoted attributes.
///
/// `&`, `<`, `>`, `"` and `'` are replaced with entities. Input is treated as
/// UTF-8; nothing else is altered.
///
/// # Example
///
/// ```rust
/// use strata::escape_html;
///
/// assert_eq!(escape_html("<a>"), "&lt;a&gt;");
/// assert_eq!(escape_html("Tom & \"Jerry\""), "Tom &amp; &quot;Jerry&quot;");
/// ```
pub fn escape_html(input: &str) -> String {
    html_escape::encode_quoted_attribute(input).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Page {
        title: String,
        count: usize,
    }

    #[test]
    fn test_struct_to_data_map() {
        let map = to_data_map(&Page {
            title: "Home".into(),
            count: 3,
        })
        .unwrap();
        assert_eq!(map["title"], json!("Home"));
        assert_eq!(map["count"], json!(3));
    }

    #[test]
    fn test_non_map_data_rejected() {
        let err = to_data_map(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, RenderError::Data(ref msg) if msg.contains("an array")));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut base = to_data_map(&json!({"a": 1, "b": 2})).unwrap();
        merge_data(&mut base, to_data_map(&json!({"b": 3, "c": 4})).unwrap());
        assert_eq!(base["a"], json!(1));
        assert_eq!(base["b"], json!(3));
        assert_eq!(base["c"], json!(4));
    }

    #[test]
    fn test_escape_html_special_characters() {
        let escaped = escape_html("&\"'<>");
        assert!(escaped.starts_with("&amp;&quot;"));
        assert!(escaped.ends_with("&lt;&gt;"));
        assert!(!escaped.contains('\''));
    }

    #[test]
    fn test_escape_html_passes_plain_text() {
        assert_eq!(escape_html("plain text"), "plain text");
        assert_eq!(escape_html("héllo wörld"), "héllo wörld");
    }
}
