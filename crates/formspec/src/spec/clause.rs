use std::borrow::Cow;
use std::collections::BTreeMap;

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Comparator names in precedence order; the first one present wins.
const COMPARATORS: [&str; 8] = ["eq", "ne", "gt", "gte", "lt", "lte", "in", "nin"];

/// A single comparison carried by a [`Condition`].
#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
}

impl Comparator {
    /// Wire name of the comparator (`eq`, `gte`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Comparator::Eq(_) => "eq",
            Comparator::Ne(_) => "ne",
            Comparator::Gt(_) => "gt",
            Comparator::Gte(_) => "gte",
            Comparator::Lt(_) => "lt",
            Comparator::Lte(_) => "lte",
            Comparator::In(_) => "in",
            Comparator::Nin(_) => "nin",
        }
    }

    /// The comparand as it appears on the wire.
    pub fn operand(&self) -> Value {
        match self {
            Comparator::Eq(value)
            | Comparator::Ne(value)
            | Comparator::Gt(value)
            | Comparator::Gte(value)
            | Comparator::Lt(value)
            | Comparator::Lte(value) => value.clone(),
            Comparator::In(values) | Comparator::Nin(values) => Value::Array(values.clone()),
        }
    }

    fn from_object(object: &Map<String, Value>) -> Option<Self> {
        COMPARATORS.iter().find_map(|name| {
            let value = object.get(*name)?;
            match *name {
                "eq" => Some(Comparator::Eq(value.clone())),
                "ne" => Some(Comparator::Ne(value.clone())),
                "gt" => Some(Comparator::Gt(value.clone())),
                "gte" => Some(Comparator::Gte(value.clone())),
                "lt" => Some(Comparator::Lt(value.clone())),
                "lte" => Some(Comparator::Lte(value.clone())),
                // membership tests only count when the comparand is a list
                "in" => value.as_array().cloned().map(Comparator::In),
                "nin" => value.as_array().cloned().map(Comparator::Nin),
                _ => None,
            }
        })
    }
}

/// `{field, eq|ne|gt|gte|lt|lte|in|nin}`.
///
/// `field` holds either a question id or a resolved key. A condition without
/// a comparator carries no constraint and always passes.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub comparator: Option<Comparator>,
}

impl Condition {
    pub fn new(field: impl Into<String>, comparator: Comparator) -> Self {
        Self {
            field: field.into(),
            comparator: Some(comparator),
        }
    }

    /// Reads a condition from loose JSON. Returns `None` unless the value is
    /// an object with a string `field`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = object.get("field")?.as_str()?;
        Some(Self {
            field: field.to_string(),
            comparator: Comparator::from_object(object),
        })
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.comparator.is_some() { 2 } else { 1 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("field", &self.field)?;
        if let Some(comparator) = &self.comparator {
            map.serialize_entry(comparator.name(), &comparator.operand())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Condition::from_value(&value)
            .ok_or_else(|| D::Error::custom("condition requires a string `field`"))
    }
}

impl JsonSchema for Condition {
    fn schema_name() -> Cow<'static, str> {
        "Condition".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        schemars::json_schema!({
            "type": "object",
            "required": ["field"],
            "properties": {
                "field": { "type": "string" },
                "eq": {},
                "ne": {},
                "gt": {},
                "gte": {},
                "lt": {},
                "lte": {},
                "in": { "type": "array" },
                "nin": { "type": "array" }
            }
        })
    }
}

/// `{all?, any?}` group. `all` entries are AND'd, `any` entries OR'd; an
/// empty side is vacuously satisfied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, JsonSchema)]
pub struct Clause {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<Condition>,
}

impl Clause {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            all: conditions,
            any: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.any.is_empty()
    }

    /// Lenient reader: malformed conditions are dropped, a non-object yields
    /// `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            all: conditions_from(object.get("all")),
            any: conditions_from(object.get("any")),
        })
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.all.iter().chain(self.any.iter())
    }

    /// True when any condition points at one of `fields`.
    pub fn references(&self, fields: &[&str]) -> bool {
        self.conditions()
            .any(|condition| fields.contains(&condition.field.as_str()))
    }

    /// Rewrites every condition field through `id_to_key`; fields that are
    /// not known ids are left untouched.
    pub fn remap(&self, id_to_key: &BTreeMap<String, String>) -> Self {
        let remap = |conditions: &[Condition]| {
            conditions
                .iter()
                .map(|condition| Condition {
                    field: id_to_key
                        .get(&condition.field)
                        .cloned()
                        .unwrap_or_else(|| condition.field.clone()),
                    comparator: condition.comparator.clone(),
                })
                .collect()
        };
        Self {
            all: remap(&self.all),
            any: remap(&self.any),
        }
    }
}

impl<'de> Deserialize<'de> for Clause {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Clause::from_value(&value).unwrap_or_default())
    }
}

fn conditions_from(value: Option<&Value>) -> Vec<Condition> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let condition = Condition::from_value(item);
            if condition.is_none() {
                tracing::debug!(condition = %item, "dropping malformed condition");
            }
            condition
        })
        .collect()
}

/// Normalised `visibleWhen` / `disabledWhen`: a list of groups OR'd together.
///
/// Three input shapes are accepted and folded into this form on read:
/// a flat array of conditions (one implicit AND group), a single group
/// object, or an array of groups. Anything else reads as an empty list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClauseList(pub Vec<Clause>);

impl ClauseList {
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self(clauses)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Clause> {
        self.0.iter()
    }

    /// True when at least one group carries a condition.
    pub fn has_conditions(&self) -> bool {
        self.0.iter().any(|clause| !clause.is_empty())
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::Array(items) => {
                let Some(first) = items.first() else {
                    return Self::default();
                };
                if is_condition_shape(first) {
                    let conditions = conditions_from(Some(value));
                    Self(vec![Clause::all(conditions)])
                } else {
                    Self(items.iter().filter_map(Clause::from_value).collect())
                }
            }
            Value::Object(_) if is_condition_shape(value) => Self(
                Condition::from_value(value)
                    .map(|condition| Clause::all(vec![condition]))
                    .into_iter()
                    .collect(),
            ),
            Value::Object(_) => Self(Clause::from_value(value).into_iter().collect()),
            other => {
                tracing::debug!(clauses = %other, "ignoring malformed clause list");
                Self::default()
            }
        }
    }

    pub fn remap(&self, id_to_key: &BTreeMap<String, String>) -> Self {
        Self(self.0.iter().map(|clause| clause.remap(id_to_key)).collect())
    }

    /// Drops every group that references one of `fields`.
    pub fn without_references(&self, fields: &[&str]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|clause| !clause.references(fields))
                .cloned()
                .collect(),
        )
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Array(Vec::new()))
    }
}

fn is_condition_shape(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.contains_key("field"))
}

impl From<Vec<Clause>> for ClauseList {
    fn from(clauses: Vec<Clause>) -> Self {
        Self(clauses)
    }
}

impl Serialize for ClauseList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClauseList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(ClauseList::from_value(&value))
    }
}

impl JsonSchema for ClauseList {
    fn schema_name() -> Cow<'static, str> {
        "ClauseList".into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        <Vec<Clause>>::json_schema(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_condition_array_becomes_single_and_group() {
        let list = ClauseList::from_value(&json!([
            { "field": "a", "eq": 1 },
            { "field": "b", "ne": "x" }
        ]));
        assert_eq!(list.0.len(), 1);
        assert_eq!(list.0[0].all.len(), 2);
        assert!(list.0[0].any.is_empty());
    }

    #[test]
    fn single_group_object_is_wrapped() {
        let list = ClauseList::from_value(&json!({ "any": [{ "field": "a", "eq": 1 }] }));
        assert_eq!(list.0.len(), 1);
        assert_eq!(list.0[0].any.len(), 1);
    }

    #[test]
    fn malformed_shapes_read_as_empty() {
        assert!(ClauseList::from_value(&json!("nope")).is_empty());
        assert!(ClauseList::from_value(&json!(42)).is_empty());
        let list = ClauseList::from_value(&json!([{ "all": [{ "eq": 1 }, "x"] }]));
        assert_eq!(list.0.len(), 1);
        assert!(!list.has_conditions());
    }

    #[test]
    fn first_comparator_in_precedence_order_wins() {
        let condition =
            Condition::from_value(&json!({ "field": "a", "gt": 3, "eq": 1 })).expect("condition");
        assert_eq!(condition.comparator, Some(Comparator::Eq(json!(1))));
    }

    #[test]
    fn membership_requires_a_list() {
        let condition =
            Condition::from_value(&json!({ "field": "a", "in": "x" })).expect("condition");
        assert_eq!(condition.comparator, None);
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let list = ClauseList::new(vec![Clause::all(vec![Condition::new(
            "country",
            Comparator::In(vec![json!("CA"), json!("US")]),
        )])]);
        assert_eq!(
            serde_json::to_value(&list).expect("serialize"),
            json!([{ "all": [{ "field": "country", "in": ["CA", "US"] }] }])
        );
    }

    #[test]
    fn remap_rewrites_ids_only() {
        let map = BTreeMap::from([("q-1".to_string(), "name".to_string())]);
        let clause = Clause {
            all: vec![Condition::new("q-1", Comparator::Eq(json!("x")))],
            any: vec![Condition::new("age", Comparator::Gt(json!(3)))],
        };
        let remapped = clause.remap(&map);
        assert_eq!(remapped.all[0].field, "name");
        assert_eq!(remapped.any[0].field, "age");
    }
}
