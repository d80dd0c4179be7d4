use thiserror::Error;

use crate::validate::ValidationReport;

/// Errors raised at the fallible boundaries of the engine.
///
/// Evaluation never produces one of these: malformed clauses and dangling
/// references are absorbed where they are read.
#[derive(Debug, Error)]
pub enum FormSpecError {
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid FormSpec:\n{}", .0.errors.join("\n"))]
    Invalid(ValidationReport),
    #[error("unknown JSON format; provide a FormSpec or a JSON Schema")]
    UnknownFormat,
    #[error("invalid JSON: expected an object")]
    NotAnObject,
    #[error("schema has no properties")]
    NoProperties,
    #[error("schema could not be compiled: {0}")]
    Schema(String),
}

pub type Result<T> = std::result::Result<T, FormSpecError>;
