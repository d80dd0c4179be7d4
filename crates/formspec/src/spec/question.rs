use std::borrow::Cow;
use std::fmt;

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::spec::clause::ClauseList;

/// Authoring question types.
///
/// Unknown type strings are kept verbatim in [`QuestionType::Other`] and
/// render as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    #[default]
    Text,
    Email,
    Number,
    Integer,
    Boolean,
    Date,
    Select,
    Multiselect,
    File,
    Other(String),
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Email => "email",
            QuestionType::Number => "number",
            QuestionType::Integer => "integer",
            QuestionType::Boolean => "boolean",
            QuestionType::Date => "date",
            QuestionType::Select => "select",
            QuestionType::Multiselect => "multiselect",
            QuestionType::File => "file",
            QuestionType::Other(raw) => raw,
        }
    }
}

impl From<String> for QuestionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => QuestionType::Text,
            "email" => QuestionType::Email,
            "number" => QuestionType::Number,
            "integer" => QuestionType::Integer,
            "boolean" => QuestionType::Boolean,
            "date" => QuestionType::Date,
            "select" => QuestionType::Select,
            "multiselect" => QuestionType::Multiselect,
            "file" => QuestionType::File,
            _ => QuestionType::Other(value),
        }
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        match value {
            QuestionType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for QuestionType {
    fn schema_name() -> Cow<'static, str> {
        "QuestionType".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        schemars::json_schema!({
            "type": "string",
            "examples": [
                "text", "email", "number", "integer", "boolean",
                "date", "select", "multiselect", "file"
            ]
        })
    }
}

/// One choice of a select or multiselect question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionOption {
    pub value: String,
    pub label: String,
}

impl QuestionOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A single authoring question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: QuestionType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    #[serde(
        rename = "visibleWhen",
        default,
        skip_serializing_if = "ClauseList::is_empty"
    )]
    pub visible_when: ClauseList,
    #[serde(
        rename = "disabledWhen",
        default,
        skip_serializing_if = "ClauseList::is_empty"
    )]
    pub disabled_when: ClauseList,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Question {
    pub fn new(id: impl Into<String>, kind: QuestionType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
