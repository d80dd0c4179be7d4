use serde::Serialize;
use serde_json::Value;

use crate::compile::CompiledForm;
use crate::error::{FormSpecError, Result};
use crate::render::effective_for;

/// Outcome of checking a submission against a compiled schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SubmissionReport {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Top-level data keys the schema has no property for. Reported only.
    #[serde(rename = "unknownFields", skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
}

/// Validates `data` against `schema` and collects every error.
///
/// Unknown schema keywords (`visibleWhen`, `ui:options`, ...) are ignored by
/// the validator, so a compiled schema can be passed as is.
pub fn check_submission(schema: &Value, data: &Value) -> Result<SubmissionReport> {
    let validator =
        jsonschema::validator_for(schema).map_err(|err| FormSpecError::Schema(err.to_string()))?;
    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|err| err.to_string())
        .collect();

    let unknown_fields = match (
        schema.get("properties").and_then(Value::as_object),
        data.as_object(),
    ) {
        (Some(properties), Some(data)) => data
            .keys()
            .filter(|key| !properties.contains_key(*key))
            .cloned()
            .collect(),
        _ => Vec::new(),
    };
    if !unknown_fields.is_empty() {
        tracing::debug!(fields = ?unknown_fields, "submission carries unknown fields");
    }

    Ok(SubmissionReport {
        valid: errors.is_empty(),
        errors,
        unknown_fields,
    })
}

/// Reduces the compiled form for `data` first, so required fields that are
/// currently hidden never block the submission.
pub fn check_effective(compiled: &CompiledForm, data: &Value) -> Result<SubmissionReport> {
    let effective = effective_for(compiled, data);
    check_submission(&effective.schema, data)
}
