#![allow(missing_docs)]

pub mod compile;
pub mod condition;
pub mod editor;
pub mod error;
pub mod import;
pub mod keys;
pub mod mapper;
pub mod render;
pub mod spec;
pub mod submit;
pub mod validate;
pub mod visibility;

pub use compile::{CompileOptions, CompiledForm, compile, compile_checked, compile_with};
pub use condition::{eval_condition, lookup};
pub use editor::{QuestionPatch, SectionPatch, SpecEditor};
pub use error::{FormSpecError, Result};
pub use import::{Format, Imported, detect_format, import_json, schema_to_form_spec};
pub use keys::{IdToKey, KeyResolver, ensure_keys, is_valid_key, resolve_keys, slugify};
pub use mapper::schema_fragment;
pub use render::{EffectiveForm, HIDDEN_WIDGET, compute_effective, effective_for};
pub use spec::{
    Clause, ClauseList, Comparator, Condition, FORMSPEC_VERSION, FormSpec, Page, Question,
    QuestionOption, QuestionType, Rule, RuleAction, Section, UiHints,
};
pub use submit::{SubmissionReport, check_effective, check_submission};
pub use validate::{ValidationReport, validate_spec};
pub use visibility::{
    VisibilityMap, any_clause_passes, eval_clause, is_disabled, is_visible, resolve_visibility,
};

/// JSON Schema describing the FormSpec authoring document.
pub fn form_spec_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(FormSpec)).unwrap_or(serde_json::Value::Null)
}
