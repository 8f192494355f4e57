//! Preassigned template data.
//!
//! [`TemplateData`] keeps two tiers of variables: a shared map applied to every
//! render, and per-template maps keyed by the logical template name exactly as
//! it is passed to [`Engine::render`](crate::Engine::render). Reading the data
//! for a template overlays its specific entries on top of the shared ones.

use std::collections::HashMap;

use crate::util::{merge_data, DataMap};

/// Shared and per-template variable maps.
#[derive(Debug, Clone, Default)]
pub struct TemplateData {
    shared: DataMap,
    templates: HashMap<String, DataMap>,
}

impl TemplateData {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds data for the given templates, or for every template when
    /// `templates` is empty.
    pub fn add<I, S>(&mut self, data: DataMap, templates: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let templates: Vec<String> = templates.into_iter().map(Into::into).collect();
        if templates.is_empty() {
            self.share_with_all(data);
        } else {
            self.share_with_some(data, templates);
        }
    }

    /// Merges `data` into the shared tier.
    pub fn share_with_all(&mut self, data: DataMap) {
        merge_data(&mut self.shared, data);
    }

    /// Merges `data` into the tier of each named template.
    pub fn share_with_some<I, S>(&mut self, data: DataMap, templates: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for template in templates {
            let entry = self.templates.entry(template.into()).or_default();
            merge_data(entry, data.clone());
        }
    }

    /// Returns the data visible to `template`.
    ///
    /// With `None`, only the shared tier is returned.
    pub fn get(&self, template: Option<&str>) -> DataMap {
        let mut data = self.shared.clone();
        if let Some(specific) = template.and_then(|name| self.templates.get(name)) {
            merge_data(&mut data, specific.clone());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::to_data_map;
    use serde_json::json;

    fn map(value: serde_json::Value) -> DataMap {
        to_data_map(&value).unwrap()
    }

    const NONE: [&str; 0] = [];

    #[test]
    fn test_add_data_to_all_templates() {
        let mut data = TemplateData::new();
        data.add(map(json!({"name": "Jonathan"})), NONE);
        assert_eq!(data.get(None)["name"], json!("Jonathan"));
        assert_eq!(data.get(Some("anything"))["name"], json!("Jonathan"));
    }

    #[test]
    fn test_add_data_to_one_template() {
        let mut data = TemplateData::new();
        data.add(map(json!({"name": "Jonathan"})), ["template"]);
        assert_eq!(data.get(Some("template"))["name"], json!("Jonathan"));
        assert!(data.get(None).get("name").is_none());
        assert!(data.get(Some("other")).get("name").is_none());
    }

    #[test]
    fn test_add_data_to_one_template_again() {
        let mut data = TemplateData::new();
        data.add(map(json!({"firstname": "Jonathan"})), ["template"]);
        data.add(map(json!({"lastname": "Reinink"})), ["template"]);
        let got = data.get(Some("template"));
        assert_eq!(got["firstname"], json!("Jonathan"));
        assert_eq!(got["lastname"], json!("Reinink"));
    }

    #[test]
    fn test_add_data_to_some_templates() {
        let mut data = TemplateData::new();
        data.add(map(json!({"name": "Jonathan"})), ["template1", "template2"]);
        assert_eq!(data.get(Some("template1"))["name"], json!("Jonathan"));
        assert_eq!(data.get(Some("template2"))["name"], json!("Jonathan"));
    }

    #[test]
    fn test_specific_overrides_shared() {
        let mut data = TemplateData::new();
        data.add(map(json!({"n": "A", "shared": true})), NONE);
        data.add(map(json!({"n": "B"})), ["t1"]);

        let t1 = data.get(Some("t1"));
        assert_eq!(t1["n"], json!("B"));
        assert_eq!(t1["shared"], json!(true));
        assert_eq!(data.get(Some("other"))["n"], json!("A"));
    }

    #[test]
    fn test_later_shared_data_overwrites() {
        let mut data = TemplateData::new();
        data.share_with_all(map(json!({"n": 1})));
        data.share_with_all(map(json!({"n": 2})));
        assert_eq!(data.get(None)["n"], json!(2));
    }
}
