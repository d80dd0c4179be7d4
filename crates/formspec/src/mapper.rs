use serde_json::{Map, Number, Value};

use crate::spec::question::{Question, QuestionType};

/// Numeric bound names read from `meta` for number and integer questions.
const NUMERIC_BOUNDS: [&str; 4] = [
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
];

/// Maps a question to its schema fragment. Total over the type set: unknown
/// types render as plain strings.
pub fn schema_fragment(question: &Question) -> Value {
    let mut schema = Map::new();
    match &question.kind {
        QuestionType::Text | QuestionType::Other(_) => {
            schema.insert("type".into(), Value::String("string".into()));
        }
        QuestionType::Email => {
            schema.insert("type".into(), Value::String("string".into()));
            schema.insert("format".into(), Value::String("email".into()));
        }
        QuestionType::Number | QuestionType::Integer => {
            schema.insert("type".into(), Value::String(question.kind.to_string()));
            for bound in NUMERIC_BOUNDS {
                if let Some(number) = question.meta.get(bound).and_then(numeric_bound) {
                    schema.insert(bound.into(), Value::Number(number));
                }
            }
        }
        QuestionType::Boolean => {
            schema.insert("type".into(), Value::String("boolean".into()));
        }
        QuestionType::Date => {
            schema.insert("type".into(), Value::String("string".into()));
            schema.insert("format".into(), Value::String("date".into()));
        }
        QuestionType::Select => {
            schema.insert("type".into(), Value::String("string".into()));
            schema.insert("enum".into(), option_values(question));
            schema.insert(
                "enumNames".into(),
                Value::Array(
                    question
                        .options
                        .iter()
                        .map(|option| Value::String(option.label.clone()))
                        .collect(),
                ),
            );
        }
        QuestionType::Multiselect => {
            let mut items = Map::new();
            items.insert("type".into(), Value::String("string".into()));
            if !question.options.is_empty() {
                items.insert("enum".into(), option_values(question));
            }
            schema.insert("type".into(), Value::String("array".into()));
            schema.insert("items".into(), Value::Object(items));
            schema.insert("uniqueItems".into(), Value::Bool(true));
        }
        QuestionType::File => {
            schema.insert("type".into(), Value::String("string".into()));
            schema.insert("contentEncoding".into(), Value::String("base64".into()));
        }
    }
    schema.insert("title".into(), Value::String(question.label.clone()));
    Value::Object(schema)
}

fn option_values(question: &Question) -> Value {
    Value::Array(
        question
            .options
            .iter()
            .map(|option| Value::String(option.value.clone()))
            .collect(),
    )
}

/// Accepts JSON numbers as-is and numeric strings when they parse to a finite
/// value; anything else is ignored.
fn numeric_bound(value: &Value) -> Option<Number> {
    match value {
        Value::Number(number) => Some(number.clone()),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|parsed| parsed.is_finite())
            .and_then(Number::from_f64),
        _ => None,
    }
}
