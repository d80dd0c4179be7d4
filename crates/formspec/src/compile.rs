use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::as_number;
use crate::error::{FormSpecError, Result};
use crate::keys::{IdToKey, KeyResolver};
use crate::mapper::schema_fragment;
use crate::spec::clause::{Comparator, Condition};
use crate::spec::form::FormSpec;
use crate::spec::rule::{Rule, RuleAction};
use crate::validate::validate_spec;

/// Compiled artifact: JSON-Schema-like `schema` plus the parallel `uiSchema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledForm {
    pub schema: Value,
    #[serde(rename = "uiSchema", default)]
    pub ui_schema: Value,
}

impl CompiledForm {
    /// The id to key table stored under `ui:meta.idToKey`.
    pub fn id_to_key(&self) -> IdToKey {
        id_to_key_from_ui(&self.ui_schema)
    }
}

/// Reads `ui:meta.idToKey` from a uiSchema, skipping non-string entries.
pub fn id_to_key_from_ui(ui_schema: &Value) -> IdToKey {
    ui_schema
        .pointer("/ui:meta/idToKey")
        .and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|(id, key)| Some((id.clone(), key.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Run the structural validator first and refuse invalid specs.
    pub strict: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Validates then compiles. Use this in front of anything that persists the
/// compiled artifact.
pub fn compile_checked(spec: &FormSpec) -> Result<CompiledForm> {
    compile_with(spec, CompileOptions::default())
}

pub fn compile_with(spec: &FormSpec, options: CompileOptions) -> Result<CompiledForm> {
    if options.strict {
        let report = validate_spec(spec);
        if !report.ok {
            return Err(FormSpecError::Invalid(report));
        }
    }
    Ok(compile(spec))
}

/// Compiles an authoring tree. Pure and deterministic: keys are resolved in
/// discovery order (pages, sections, questions).
pub fn compile(spec: &FormSpec) -> CompiledForm {
    let mut resolver = KeyResolver::new();
    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut ui_entries: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    let mut discovery_order = Vec::new();
    let mut sections_meta = Vec::new();
    let mut pages_meta = Vec::new();

    for page in &spec.pages {
        let mut section_ids = Vec::new();
        for section in &page.sections {
            let mut section_keys = Vec::new();
            for question in &section.questions {
                let key = resolver.resolve(question);
                properties.insert(key.clone(), schema_fragment(question));
                if question.required {
                    required.push(Value::String(key.clone()));
                }
                if let Some(help) = &question.help {
                    ui_entry(&mut ui_entries, &key)
                        .insert("ui:help".into(), Value::String(help.clone()));
                }
                if let Some(placeholder) = &question.placeholder {
                    ui_entry(&mut ui_entries, &key)
                        .insert("ui:placeholder".into(), Value::String(placeholder.clone()));
                }
                section_keys.push(Value::String(key.clone()));
                discovery_order.push(key);
            }
            section_ids.push(Value::String(section.id.clone()));
            sections_meta.push(serde_json::json!({
                "id": section.id,
                "title": section.title,
                "keys": section_keys,
            }));
        }
        pages_meta.push(serde_json::json!({
            "id": page.id,
            "title": page.title,
            "sections": section_ids,
        }));
    }

    let id_to_key = resolver.into_id_to_key();

    if let Some(ui) = &spec.ui {
        for (reference, widget) in &ui.widgets {
            match resolve_reference(reference, &id_to_key, &properties) {
                Some(key) => {
                    ui_entry(&mut ui_entries, &key)
                        .insert("ui:widget".into(), Value::String(widget.clone()));
                }
                None => {
                    tracing::debug!(reference = %reference, "dropping widget for unknown question")
                }
            }
        }
    }

    let order = emitted_order(spec.ui_order(), &discovery_order, &id_to_key, &properties);

    for question in spec.questions() {
        let Some(key) = id_to_key.get(&question.id) else {
            continue;
        };
        for (name, clauses) in [
            ("visibleWhen", &question.visible_when),
            ("disabledWhen", &question.disabled_when),
        ] {
            if clauses.is_empty() {
                continue;
            }
            let remapped = clauses.remap(&id_to_key).to_value();
            let options = ui_entry(&mut ui_entries, key)
                .entry("ui:options")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(options) = options {
                options.insert(name.into(), remapped.clone());
            }
            if let Some(Value::Object(property)) = properties.get_mut(key) {
                property.insert(name.into(), remapped);
            }
        }
    }

    let all_of: Vec<Value> = spec
        .rules
        .iter()
        .filter_map(|rule| compile_rule(rule, &id_to_key))
        .collect();

    let mut ui_schema = Map::new();
    ui_schema.insert(
        "ui:order".into(),
        Value::Array(order.into_iter().map(Value::String).collect()),
    );
    for (key, entry) in ui_entries {
        ui_schema.insert(key, Value::Object(entry));
    }
    ui_schema.insert(
        "ui:meta".into(),
        serde_json::json!({
            "idToKey": id_to_key,
            "sections": sections_meta,
            "pages": pages_meta,
        }),
    );

    tracing::debug!(
        form = %spec.id,
        properties = properties.len(),
        rules = all_of.len(),
        "compiled form spec"
    );

    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("title".into(), Value::String(spec.title.clone()));
    if let Some(description) = &spec.description {
        schema.insert("description".into(), Value::String(description.clone()));
    }
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    if !all_of.is_empty() {
        schema.insert("allOf".into(), Value::Array(all_of));
    }

    CompiledForm {
        schema: Value::Object(schema),
        ui_schema: Value::Object(ui_schema),
    }
}

fn ui_entry<'a>(
    entries: &'a mut BTreeMap<String, Map<String, Value>>,
    key: &str,
) -> &'a mut Map<String, Value> {
    entries.entry(key.to_string()).or_default()
}

/// Maps a reference (id or key) to a known key.
fn resolve_reference(
    reference: &str,
    id_to_key: &IdToKey,
    properties: &Map<String, Value>,
) -> Option<String> {
    id_to_key
        .get(reference)
        .cloned()
        .or_else(|| properties.contains_key(reference).then(|| reference.to_string()))
}

/// Explicit order (ids mapped to keys) followed by every key it missed.
fn emitted_order(
    explicit: &[String],
    discovery_order: &[String],
    id_to_key: &IdToKey,
    properties: &Map<String, Value>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut order = Vec::with_capacity(discovery_order.len());
    for reference in explicit {
        match resolve_reference(reference, id_to_key, properties) {
            Some(key) => {
                if seen.insert(key.clone()) {
                    order.push(key);
                }
            }
            None => tracing::debug!(reference = %reference, "dropping unknown ui.order entry"),
        }
    }
    for key in discovery_order {
        if seen.insert(key.clone()) {
            order.push(key.clone());
        }
    }
    order
}

fn remap_field(field: &str, id_to_key: &IdToKey) -> String {
    id_to_key
        .get(field)
        .cloned()
        .unwrap_or_else(|| field.to_string())
}

/// Schema keywords for one condition, and whether the field must also be
/// present. Negative comparators leave presence open so that an absent value
/// still counts as "not equal".
fn condition_constraint(comparator: &Comparator) -> Option<(Map<String, Value>, bool)> {
    let mut keywords = Map::new();
    let positive = match comparator {
        Comparator::Eq(value) => {
            keywords.insert("const".into(), value.clone());
            true
        }
        Comparator::Ne(value) => {
            keywords.insert("not".into(), serde_json::json!({ "const": value }));
            false
        }
        Comparator::Gt(bound) => numeric_bound(&mut keywords, "exclusiveMinimum", bound)?,
        Comparator::Gte(bound) => numeric_bound(&mut keywords, "minimum", bound)?,
        Comparator::Lt(bound) => numeric_bound(&mut keywords, "exclusiveMaximum", bound)?,
        Comparator::Lte(bound) => numeric_bound(&mut keywords, "maximum", bound)?,
        Comparator::In(values) => {
            keywords.insert("enum".into(), Value::Array(values.clone()));
            true
        }
        Comparator::Nin(values) => {
            keywords.insert("not".into(), serde_json::json!({ "enum": values }));
            false
        }
    };
    Some((keywords, positive))
}

/// JSON Schema ignores bounds on non-numbers, so the value is typed as well.
fn numeric_bound(
    keywords: &mut Map<String, Value>,
    keyword: &str,
    bound: &Value,
) -> Option<bool> {
    let bound = numeric_operand(bound)?;
    keywords.insert("type".into(), Value::String("number".into()));
    keywords.insert(keyword.into(), bound);
    Some(true)
}

fn numeric_operand(bound: &Value) -> Option<Value> {
    match bound {
        Value::Number(_) => Some(bound.clone()),
        other => as_number(other)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
    }
}

/// `{properties, required}` pair used for `if`, `anyOf` branches and `then`.
#[derive(Debug, Default)]
struct SchemaBlock {
    properties: Map<String, Value>,
    required: Vec<Value>,
}

impl SchemaBlock {
    fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.required.is_empty()
    }

    fn require(&mut self, key: &str) {
        let key = Value::String(key.to_string());
        if !self.required.contains(&key) {
            self.required.push(key);
        }
    }

    fn merge_property(&mut self, key: &str, keywords: Map<String, Value>) {
        match self
            .properties
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            Value::Object(property) => property.extend(keywords),
            other => *other = Value::Object(keywords),
        }
    }

    /// Adds one condition. Returns false when it contributes nothing.
    fn apply_condition(&mut self, condition: &Condition, id_to_key: &IdToKey) -> bool {
        let Some(comparator) = &condition.comparator else {
            return false;
        };
        let Some((keywords, positive)) = condition_constraint(comparator) else {
            tracing::debug!(
                field = %condition.field,
                comparator = comparator.name(),
                "skipping non-numeric bound in rule condition"
            );
            return false;
        };
        let key = remap_field(&condition.field, id_to_key);
        self.merge_property(&key, keywords);
        if positive {
            self.require(&key);
        }
        true
    }

    fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        if !self.properties.is_empty() {
            map.insert("properties".into(), Value::Object(self.properties));
        }
        if !self.required.is_empty() {
            map.insert("required".into(), Value::Array(self.required));
        }
        map
    }
}

/// One `allOf` entry per rule; rules with an empty `if` or `then` are
/// skipped.
fn compile_rule(rule: &Rule, id_to_key: &IdToKey) -> Option<Value> {
    let mut when = SchemaBlock::default();
    for condition in &rule.when.all {
        when.apply_condition(condition, id_to_key);
    }
    let mut condition = when.into_map();

    let branches: Vec<Value> = rule
        .when
        .any
        .iter()
        .filter_map(|any| {
            let mut branch = SchemaBlock::default();
            branch
                .apply_condition(any, id_to_key)
                .then(|| Value::Object(branch.into_map()))
        })
        .collect();
    if !branches.is_empty() {
        condition.insert("anyOf".into(), Value::Array(branches));
    }

    let mut then = SchemaBlock::default();
    for action in &rule.then {
        let key = remap_field(action.field(), id_to_key);
        match action {
            RuleAction::SetRequired { value, .. } => {
                if *value {
                    then.require(&key);
                }
            }
            RuleAction::SetConst { value, .. } => {
                then.properties.insert(key, serde_json::json!({ "const": value }));
            }
            RuleAction::SetEnum { values, labels, .. } => {
                let mut property = Map::new();
                property.insert("enum".into(), serde_json::json!(values));
                if !labels.is_empty() && labels.len() == values.len() {
                    property.insert("enumNames".into(), serde_json::json!(labels));
                }
                then.properties.insert(key, Value::Object(property));
            }
        }
    }

    if condition.is_empty() || then.is_empty() {
        tracing::debug!(rule = %rule.id, "skipping rule with empty condition or effect");
        return None;
    }

    let mut block = Map::new();
    block.insert("if".into(), Value::Object(condition));
    block.insert("then".into(), Value::Object(then.into_map()));
    Some(Value::Object(block))
}
