use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::compile::{CompiledForm, id_to_key_from_ui};
use crate::spec::clause::ClauseList;
use crate::visibility::{is_disabled, is_visible};

/// Widget name the renderer treats as "do not draw".
pub const HIDDEN_WIDGET: &str = "hidden";

/// Per-render-pass view of a compiled form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveForm {
    pub schema: Value,
    #[serde(rename = "uiSchema")]
    pub ui_schema: Value,
    pub hidden: BTreeSet<String>,
    pub disabled: BTreeSet<String>,
}

impl EffectiveForm {
    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.contains(key)
    }

    pub fn is_disabled(&self, key: &str) -> bool {
        self.disabled.contains(key)
    }

    /// Keys the effective schema still requires at the top level.
    pub fn required(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        json!({
            "schema": self.schema,
            "uiSchema": self.ui_schema,
            "hidden": self.hidden,
            "disabled": self.disabled,
        })
    }
}

/// Convenience over [`compute_effective`] for a [`CompiledForm`].
pub fn effective_for(compiled: &CompiledForm, data: &Value) -> EffectiveForm {
    compute_effective(&compiled.schema, &compiled.ui_schema, data)
}

/// Derives the effective schema and uiSchema for the current data.
///
/// Hidden fields get the hidden widget and are dropped from every `required`
/// list (top level and `allOf[].then`), disabled fields get `ui:disabled`.
/// Recomputed from scratch on every call; the inputs are not modified and
/// malformed hints read as "no constraint".
pub fn compute_effective(schema: &Value, ui_schema: &Value, data: &Value) -> EffectiveForm {
    let mut effective_schema = schema.clone();
    let mut effective_ui = match ui_schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    let id_to_key = id_to_key_from_ui(ui_schema);
    let mut hidden = BTreeSet::new();
    let mut disabled = BTreeSet::new();

    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    for (key, property) in &properties {
        let ui_entry = ui_schema.get(key);

        let visible_when = hint(property, ui_entry, "visibleWhen").map(ClauseList::from_value);
        if !is_visible(data, visible_when.as_ref(), &id_to_key) {
            mark(
                &mut effective_ui,
                key,
                "ui:widget",
                Value::String(HIDDEN_WIDGET.into()),
            );
            hidden.insert(key.clone());
        }

        let disabled_when = hint(property, ui_entry, "disabledWhen").map(ClauseList::from_value);
        if is_disabled(data, disabled_when.as_ref(), &id_to_key) {
            mark(&mut effective_ui, key, "ui:disabled", Value::Bool(true));
            disabled.insert(key.clone());
        }
    }

    if !hidden.is_empty()
        && let Value::Object(root) = &mut effective_schema
    {
        strip_required(root, &hidden);
        if let Some(Value::Array(blocks)) = root.get_mut("allOf") {
            for block in blocks {
                if let Some(Value::Object(then)) = block.get_mut("then") {
                    strip_required(then, &hidden);
                }
            }
        }
    }

    EffectiveForm {
        schema: effective_schema,
        ui_schema: Value::Object(effective_ui),
        hidden,
        disabled,
    }
}

/// First non-null hint: the schema property wins over the uiSchema entry.
fn hint<'a>(property: &'a Value, ui_entry: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    let ui_name = format!("ui:{name}");
    [
        property.get("ui:options").and_then(|options| options.get(name)),
        property.get(name),
        ui_entry.and_then(|entry| entry.get("ui:options")).and_then(|options| options.get(name)),
        ui_entry.and_then(|entry| entry.get(name)),
        ui_entry.and_then(|entry| entry.get(&ui_name)),
    ]
    .into_iter()
    .flatten()
    .find(|value| !value.is_null())
}

fn mark(ui: &mut Map<String, Value>, key: &str, flag: &str, value: Value) {
    let entry = ui
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    match entry {
        Value::Object(map) => {
            map.insert(flag.into(), value);
        }
        other => {
            let mut map = Map::new();
            map.insert(flag.into(), value);
            *other = Value::Object(map);
        }
    }
}

/// Removes hidden keys from `required`; an emptied list is removed entirely.
fn strip_required(block: &mut Map<String, Value>, hidden: &BTreeSet<String>) {
    let Some(Value::Array(required)) = block.get_mut("required") else {
        return;
    };
    required.retain(|key| key.as_str().is_none_or(|key| !hidden.contains(key)));
    if required.is_empty() {
        block.remove("required");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_required_field_is_pruned_and_list_removed() {
        let schema = json!({
            "type": "object",
            "properties": {
                "x": { "type": "string", "visibleWhen": [{ "all": [{ "field": "y", "eq": "show" }] }] },
                "y": { "type": "string" }
            },
            "required": ["x"]
        });
        let ui = json!({ "ui:order": ["y", "x"] });

        let effective = compute_effective(&schema, &ui, &json!({ "y": "nope" }));
        assert!(effective.is_hidden("x"));
        assert!(effective.schema.get("required").is_none());
        assert_eq!(effective.ui_schema["x"]["ui:widget"], HIDDEN_WIDGET);
        // inputs untouched
        assert_eq!(schema["required"], json!(["x"]));

        let effective = compute_effective(&schema, &ui, &json!({ "y": "show" }));
        assert!(!effective.is_hidden("x"));
        assert_eq!(effective.required(), vec!["x"]);
    }

    #[test]
    fn ui_hint_is_the_fallback() {
        let schema = json!({ "properties": { "x": { "type": "string" } }, "required": ["x"] });
        let ui = json!({ "x": { "ui:options": { "visibleWhen": [{ "all": [{ "field": "y", "eq": 1 }] }] } } });
        let effective = compute_effective(&schema, &ui, &json!({}));
        assert!(effective.is_hidden("x"));
    }

    #[test]
    fn then_required_is_scrubbed() {
        let schema = json!({
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "string", "visibleWhen": { "all": [{ "field": "a", "eq": "x" }] } }
            },
            "allOf": [{ "if": { "properties": { "a": { "const": "y" } } }, "then": { "required": ["b"] } }]
        });
        let effective = compute_effective(&schema, &json!({}), &json!({ "a": "y" }));
        assert_eq!(effective.schema["allOf"][0]["then"], json!({}));
    }

    #[test]
    fn disabled_fields_are_flagged_separately() {
        let schema = json!({
            "properties": {
                "a": { "type": "boolean" },
                "b": { "type": "string", "disabledWhen": [{ "all": [{ "field": "a", "eq": true }] }] }
            }
        });
        let effective = compute_effective(&schema, &json!({}), &json!({ "a": true }));
        assert!(effective.is_disabled("b"));
        assert!(!effective.is_hidden("b"));
        assert_eq!(effective.ui_schema["b"]["ui:disabled"], true);

        let effective = compute_effective(&schema, &json!({}), &json!({ "a": false }));
        assert!(effective.disabled.is_empty());
    }

    #[test]
    fn garbage_inputs_do_not_panic() {
        let effective = compute_effective(
            &json!({ "properties": { "a": { "visibleWhen": 7 } }, "required": "a" }),
            &json!("not an object"),
            &json!(null),
        );
        assert!(effective.hidden.is_empty());
        assert_eq!(effective.schema["required"], "a");
    }
}
