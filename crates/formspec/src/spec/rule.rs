use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::clause::Clause;

/// Schema mutation applied when a rule's `when` clause holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum RuleAction {
    SetRequired {
        field: String,
        value: bool,
    },
    SetConst {
        field: String,
        value: Value,
    },
    SetEnum {
        field: String,
        values: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        labels: Vec<String>,
    },
}

impl RuleAction {
    pub fn field(&self) -> &str {
        match self {
            RuleAction::SetRequired { field, .. }
            | RuleAction::SetConst { field, .. }
            | RuleAction::SetEnum { field, .. } => field,
        }
    }

    pub fn field_mut(&mut self) -> &mut String {
        match self {
            RuleAction::SetRequired { field, .. }
            | RuleAction::SetConst { field, .. }
            | RuleAction::SetEnum { field, .. } => field,
        }
    }
}

/// Form-scoped conditional rule compiled into a schema `allOf` entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub when: Clause,
    #[serde(default)]
    pub then: Vec<RuleAction>,
}

impl Rule {
    /// True when the `when` clause or any action points at one of `fields`.
    pub fn references(&self, fields: &[&str]) -> bool {
        self.when.references(fields)
            || self
                .then
                .iter()
                .any(|action| fields.contains(&action.field()))
    }
}
