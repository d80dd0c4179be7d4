use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FormSpecError, Result};
use crate::keys::ensure_keys;
use crate::spec::clause::{Clause, Comparator, Condition};
use crate::spec::form::{FORMSPEC_VERSION, FormSpec, Page, Section, UiHints};
use crate::spec::question::{Question, QuestionOption, QuestionType};
use crate::spec::rule::{Rule, RuleAction};
use crate::validate::validate_spec;

/// Shape of an uploaded JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Format {
    FormSpec,
    JsonSchema,
    Unknown,
}

/// Import result. Warnings describe schema features that were dropped or
/// approximated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Imported {
    pub spec: FormSpec,
    pub warnings: Vec<String>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn detect_format(json: &Value) -> Format {
    let Some(object) = json.as_object() else {
        return Format::Unknown;
    };
    if object.get("version").and_then(Value::as_str) == Some(FORMSPEC_VERSION)
        && object.get("pages").is_some_and(Value::is_array)
    {
        return Format::FormSpec;
    }
    if object.contains_key("$schema")
        || (object.get("type").and_then(Value::as_str) == Some("object")
            && object.get("properties").is_some_and(|p| !p.is_null()))
    {
        return Format::JsonSchema;
    }
    Format::Unknown
}

/// Accepts either a FormSpec or a JSON Schema document, normalises keys and
/// refuses anything the validator rejects.
pub fn import_json(json: &Value) -> Result<Imported> {
    let imported = match detect_format(json) {
        Format::FormSpec => Imported {
            spec: serde_json::from_value(json.clone())?,
            warnings: Vec::new(),
        },
        Format::JsonSchema => schema_to_form_spec(json)?,
        Format::Unknown => return Err(FormSpecError::UnknownFormat),
    };
    let Imported { mut spec, warnings } = imported;

    let before: BTreeMap<String, String> = key_table(&spec);
    ensure_keys(&mut spec);
    let renamed: BTreeMap<String, String> = key_table(&spec)
        .into_iter()
        .filter_map(|(id, key)| {
            let old = before.get(&id)?;
            (old != &key).then(|| (old.clone(), key))
        })
        .collect();
    if !renamed.is_empty() {
        tracing::debug!(renamed = ?renamed, "rewriting rule references to normalised keys");
        for rule in &mut spec.rules {
            rule.when = rule.when.remap(&renamed);
            for action in &mut rule.then {
                if let Some(key) = renamed.get(action.field()) {
                    *action.field_mut() = key.clone();
                }
            }
        }
    }

    let report = validate_spec(&spec);
    if !report.ok {
        return Err(FormSpecError::Invalid(report));
    }
    Ok(Imported { spec, warnings })
}

fn key_table(spec: &FormSpec) -> BTreeMap<String, String> {
    spec.questions()
        .filter_map(|question| Some((question.id.clone(), question.key.clone()?)))
        .collect()
}

/// Best-effort conversion of a Draft-07 style object schema into a one-page
/// FormSpec. Only `const` conditions survive as rules.
pub fn schema_to_form_spec(schema: &Value) -> Result<Imported> {
    let root = schema.as_object().ok_or(FormSpecError::NotAnObject)?;
    let mut warnings = Vec::new();

    if let Some(kind) = root.get("type")
        && kind.as_str() != Some("object")
    {
        warnings.push(format!("Root type '{}' treated as object", display(kind)));
    }

    let empty = Map::new();
    let properties = match root.get("properties") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(properties)) => properties,
        Some(_) => return Err(FormSpecError::NoProperties),
    };
    let required: HashSet<&str> = root
        .get("required")
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let questions: Vec<Question> = properties
        .iter()
        .map(|(key, property)| {
            question_from_property(key, property, required.contains(key.as_str()), &mut warnings)
        })
        .collect();

    let known: HashSet<&str> = properties.keys().map(String::as_str).collect();
    let mut sources = Vec::new();
    if let (Some(when), Some(then)) = (root.get("if"), root.get("then")) {
        sources.push((when, then));
    }
    if let Some(Value::Array(blocks)) = root.get("allOf") {
        sources.extend(
            blocks
                .iter()
                .filter_map(|block| Some((block.get("if")?, block.get("then")?))),
        );
    }
    let rules = sources
        .into_iter()
        .filter_map(|(when, then)| rule_from_block(when, then, &known, &mut warnings))
        .collect();

    let spec = FormSpec {
        version: FORMSPEC_VERSION.to_string(),
        id: new_id(),
        title: non_empty_str(root.get("title")).unwrap_or("Imported Form").to_string(),
        description: non_empty_str(root.get("description")).map(str::to_string),
        ui: Some(UiHints {
            order: questions.iter().map(|question| question.id.clone()).collect(),
            ..UiHints::default()
        }),
        pages: vec![Page {
            id: new_id(),
            title: "Page 1".into(),
            sections: vec![Section {
                id: new_id(),
                title: "Section 1".into(),
                questions,
            }],
        }],
        rules,
        metadata: None,
    };
    Ok(Imported { spec, warnings })
}

fn question_from_property(
    key: &str,
    property: &Value,
    required: bool,
    warnings: &mut Vec<String>,
) -> Question {
    let kind = property.get("type");
    let type_name = kind.and_then(Value::as_str);
    let format = property.get("format").and_then(Value::as_str);
    let encoding = property.get("contentEncoding").and_then(Value::as_str);
    let item_enum = property
        .get("items")
        .and_then(|items| items.get("enum"))
        .and_then(Value::as_array);

    let mut options = Vec::new();
    let kind = if let Some(values) = property.get("enum").and_then(Value::as_array) {
        options = values.iter().map(option).collect();
        QuestionType::Select
    } else if let (Some("array"), Some(values)) = (type_name, item_enum) {
        options = values.iter().map(option).collect();
        QuestionType::Multiselect
    } else {
        match (type_name, format, encoding) {
            (Some("string"), Some("email"), _) => QuestionType::Email,
            (Some("string"), Some("date"), _) => QuestionType::Date,
            (Some("string"), _, Some("base64")) => QuestionType::File,
            (Some("number"), _, _) => QuestionType::Number,
            (Some("integer"), _, _) => QuestionType::Integer,
            (Some("boolean"), _, _) => QuestionType::Boolean,
            (Some("string"), _, _) => QuestionType::Text,
            _ if kind.is_none_or(Value::is_null) => QuestionType::Text,
            _ => {
                let shown = kind.map(display).unwrap_or_default();
                warnings.push(format!("Unsupported type for '{key}': {shown}"));
                QuestionType::Text
            }
        }
    };

    Question {
        id: new_id(),
        key: Some(key.to_string()),
        kind,
        label: non_empty_str(property.get("title")).unwrap_or(key).to_string(),
        required,
        help: non_empty_str(property.get("description")).map(str::to_string),
        options,
        ..Question::default()
    }
}

fn rule_from_block(
    when: &Value,
    then: &Value,
    known: &HashSet<&str>,
    warnings: &mut Vec<String>,
) -> Option<Rule> {
    let mut conditions = Vec::new();
    for (field, condition) in when.get("properties").and_then(Value::as_object)?.iter() {
        if !known.contains(field.as_str()) {
            continue;
        }
        match condition.get("const") {
            Some(value) => conditions.push(Condition::new(field, Comparator::Eq(value.clone()))),
            None => warnings.push(format!(
                "Unsupported condition for '{field}' in if/then; only 'const' supported"
            )),
        }
    }
    if conditions.is_empty() {
        return None;
    }

    let mut actions = Vec::new();
    if let Some(required) = then.get("required").and_then(Value::as_array) {
        actions.extend(
            required
                .iter()
                .filter_map(Value::as_str)
                .filter(|field| known.contains(field))
                .map(|field| RuleAction::SetRequired {
                    field: field.to_string(),
                    value: true,
                }),
        );
    }
    if let Some(properties) = then.get("properties").and_then(Value::as_object) {
        for (field, definition) in properties {
            if !known.contains(field.as_str()) {
                continue;
            }
            if let Some(value) = definition.get("const") {
                actions.push(RuleAction::SetConst {
                    field: field.clone(),
                    value: value.clone(),
                });
            } else if let Some(values) = definition.get("enum").and_then(Value::as_array) {
                actions.push(RuleAction::SetEnum {
                    field: field.clone(),
                    values: values.iter().map(display).collect(),
                    labels: Vec::new(),
                });
            }
        }
    }
    if actions.is_empty() {
        return None;
    }

    Some(Rule {
        id: new_id(),
        description: None,
        when: Clause::all(conditions),
        then: actions,
    })
}

fn option(value: &Value) -> QuestionOption {
    let text = display(value);
    QuestionOption::new(text.clone(), text)
}

/// Strings verbatim, everything else in its JSON spelling.
fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_formats() {
        assert_eq!(
            detect_format(&json!({ "version": "1.0", "pages": [] })),
            Format::FormSpec
        );
        assert_eq!(
            detect_format(&json!({ "$schema": "http://json-schema.org/draft-07/schema#" })),
            Format::JsonSchema
        );
        assert_eq!(
            detect_format(&json!({ "type": "object", "properties": {} })),
            Format::JsonSchema
        );
        assert_eq!(detect_format(&json!({ "version": "2.0", "pages": [] })), Format::Unknown);
        assert_eq!(detect_format(&json!([1, 2])), Format::Unknown);
    }

    #[test]
    fn maps_property_types() {
        let schema = json!({
            "type": "object",
            "title": "Intake",
            "required": ["email"],
            "properties": {
                "email": { "type": "string", "format": "email", "title": "Email" },
                "size": { "enum": ["s", "m", 3] },
                "tags": { "type": "array", "items": { "enum": ["a", "b"] } },
                "born": { "type": "string", "format": "date" },
                "avatar": { "type": "string", "contentEncoding": "base64" },
                "age": { "type": "integer" },
                "score": { "type": "number" },
                "agree": { "type": "boolean" },
                "note": {},
                "blob": { "type": "object" }
            }
        });
        let Imported { spec, warnings } = schema_to_form_spec(&schema).expect("converts");
        assert_eq!(spec.title, "Intake");

        let kinds: Vec<_> = spec.questions().map(|q| q.kind.as_str().to_string()).collect();
        assert_eq!(
            kinds,
            vec![
                "email", "select", "multiselect", "date", "file", "integer", "number",
                "boolean", "text", "text"
            ]
        );
        let email = spec.questions().next().expect("first");
        assert!(email.required);
        assert_eq!(email.label, "Email");

        let size = spec.questions().nth(1).expect("second");
        assert_eq!(size.options[2], QuestionOption::new("3", "3"));
        assert_eq!(size.label, "size");

        assert_eq!(warnings, vec!["Unsupported type for 'blob': object"]);
        assert_eq!(spec.ui_order().len(), 10);
    }

    #[test]
    fn const_if_then_blocks_become_rules() {
        let schema = json!({
            "type": "object",
            "properties": {
                "country": { "type": "string", "enum": ["US", "CA"] },
                "province": { "type": "string" },
                "age": { "type": "integer" }
            },
            "if": { "properties": { "country": { "const": "CA" } } },
            "then": { "required": ["province", "ghost"] },
            "allOf": [
                { "if": { "properties": { "age": { "minimum": 18 } } }, "then": { "required": ["province"] } },
                { "if": { "properties": { "country": { "const": "US" } } },
                  "then": { "properties": { "province": { "enum": ["NY", "CA"] } } } }
            ]
        });
        let Imported { spec, warnings } = schema_to_form_spec(&schema).expect("converts");
        assert_eq!(spec.rules.len(), 2);
        assert_eq!(
            spec.rules[0].then,
            vec![RuleAction::SetRequired {
                field: "province".into(),
                value: true
            }]
        );
        assert!(matches!(
            &spec.rules[1].then[0],
            RuleAction::SetEnum { values, .. } if values == &["NY", "CA"]
        ));
        assert_eq!(
            warnings,
            vec!["Unsupported condition for 'age' in if/then; only 'const' supported"]
        );
    }

    #[test]
    fn rejects_non_objects_and_bad_properties() {
        assert!(matches!(
            schema_to_form_spec(&json!("nope")),
            Err(FormSpecError::NotAnObject)
        ));
        assert!(matches!(
            schema_to_form_spec(&json!({ "properties": [] })),
            Err(FormSpecError::NoProperties)
        ));
    }

    #[test]
    fn import_normalises_keys_and_rule_references() {
        let schema = json!({
            "type": "object",
            "properties": {
                "Has Pet": { "type": "boolean", "title": "Has pet" },
                "Pet Name": { "type": "string", "title": "Pet name" }
            },
            "allOf": [{
                "if": { "properties": { "Has Pet": { "const": true } } },
                "then": { "required": ["Pet Name"] }
            }]
        });
        let imported = import_json(&schema).expect("imports");
        let keys: Vec<_> = imported
            .spec
            .questions()
            .filter_map(|q| q.key.as_deref())
            .collect();
        assert_eq!(keys, vec!["has_pet", "pet_name"]);
        let rule = &imported.spec.rules[0];
        assert!(rule.references(&["has_pet"]));
        assert_eq!(rule.then[0].field(), "pet_name");
    }

    #[test]
    fn import_rejects_unknown_and_invalid_documents() {
        assert!(matches!(
            import_json(&json!({ "hello": "world" })),
            Err(FormSpecError::UnknownFormat)
        ));
        let empty = json!({ "version": "1.0", "id": "x", "title": "X", "pages": [] });
        match import_json(&empty) {
            Err(FormSpecError::Invalid(report)) => {
                assert!(report.errors.contains(&"At least one page is required".to_string()));
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }
}
