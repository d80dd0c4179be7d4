use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::keys::is_valid_key;
use crate::spec::form::{FORMSPEC_VERSION, FormSpec};

/// Outcome of the structural pre-flight: every problem found, never partial
/// success.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }
}

/// Checks the preconditions the compiler relies on. Callers run this before
/// persisting a compiled artifact and block publishing on any error.
pub fn validate_spec(spec: &FormSpec) -> ValidationReport {
    let mut errors = Vec::new();

    if spec.version != FORMSPEC_VERSION {
        errors.push("Unsupported FormSpec version".to_string());
    }
    if spec.pages.is_empty() {
        errors.push("At least one page is required".to_string());
    }

    let mut ids = BTreeSet::new();
    let mut keys = BTreeSet::new();
    let mut question_count = 0usize;

    for question in spec.questions() {
        question_count += 1;
        if !ids.insert(question.id.as_str()) {
            errors.push(format!("Duplicate question id: {}", question.id));
        }

        if let Some(key) = &question.key {
            let key = key.trim();
            if !is_valid_key(key) {
                errors.push(format!(
                    "Invalid key \"{}\" on \"{}\". Use a-z, 0-9, underscore; start with a letter.",
                    key, question.label
                ));
            }
            if !keys.insert(key) {
                errors.push(format!("Duplicate key \"{}\"", key));
            }
        }
    }

    if question_count == 0 {
        errors.push("Form has no questions".to_string());
    }

    ValidationReport::from_errors(errors)
}
