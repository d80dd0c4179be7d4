use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use formspec::{
    CompiledForm, FormSpec, FormSpecError, check_effective, compile_checked, effective_for,
    import_json, validate_spec as formspec_validate,
};

const DEFAULT_SPEC: &str = include_str!("../../formspec/tests/fixtures/contact_form.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse form spec: {0}")]
    SpecParse(#[source] serde_json::Error),
    #[error("form '{0}' is not available")]
    FormUnavailable(String),
    #[error("failed to parse input: {0}")]
    InputParse(#[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] FormSpecError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_spec_json: Option<String>,
}

fn load_form_spec(config_json: &str) -> Result<FormSpec, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let spec_json = config.form_spec_json.as_deref().unwrap_or(DEFAULT_SPEC);

    serde_json::from_str(spec_json).map_err(ComponentError::SpecParse)
}

fn ensure_form(form_id: &str, config_json: &str) -> Result<FormSpec, ComponentError> {
    let spec = load_form_spec(config_json)?;
    if spec.id != form_id {
        Err(ComponentError::FormUnavailable(form_id.to_string()))
    } else {
        Ok(spec)
    }
}

/// Form data is read leniently: anything unparsable is an empty submission.
fn parse_data(data_json: &str) -> Value {
    serde_json::from_str(data_json).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn encode<T: Serialize>(value: T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

pub fn describe(form_id: &str, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(encode))
}

pub fn validate_spec(form_id: &str, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| encode(formspec_validate(&spec))))
}

/// Publish path: refuses specs the validator rejects.
pub fn compile(form_id: &str, config_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| encode(compile_checked(&spec)?)))
}

pub fn effective(form_id: &str, config_json: &str, data_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let compiled = compile_checked(&spec)?;
        Ok(effective_for(&compiled, &parse_data(data_json)).to_value())
    }))
}

/// Fill-time entry point for hosts that only store the compiled artifact.
pub fn effective_from_compiled(compiled_json: &str, data_json: &str) -> String {
    respond(
        serde_json::from_str::<CompiledForm>(compiled_json)
            .map_err(ComponentError::InputParse)
            .map(|compiled| effective_for(&compiled, &parse_data(data_json)).to_value()),
    )
}

pub fn check_submission(form_id: &str, config_json: &str, data_json: &str) -> String {
    respond(ensure_form(form_id, config_json).and_then(|spec| {
        let compiled = compile_checked(&spec)?;
        let data: Value = serde_json::from_str(data_json).map_err(ComponentError::InputParse)?;
        encode(check_effective(&compiled, &data)?)
    }))
}

pub fn import(document_json: &str) -> String {
    respond(
        serde_json::from_str::<Value>(document_json)
            .map_err(ComponentError::InputParse)
            .and_then(|document| encode(import_json(&document)?)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).expect("valid json")
    }

    #[test]
    fn describe_returns_spec_json() {
        let spec = parse(&describe("contact-form", ""));
        assert_eq!(spec["id"], "contact-form");
    }

    #[test]
    fn unknown_form_is_reported() {
        let payload = parse(&describe("other", ""));
        assert_eq!(payload["error"], "form 'other' is not available");
    }

    #[test]
    fn bad_config_is_reported() {
        let payload = parse(&describe("contact-form", "{not json"));
        assert!(
            payload["error"]
                .as_str()
                .is_some_and(|message| message.starts_with("failed to parse config"))
        );
    }

    #[test]
    fn bad_form_spec_is_reported_apart_from_bad_config() {
        let config = json!({ "form_spec_json": "{\"id\": " });
        let payload = parse(&describe("contact-form", &config.to_string()));
        assert!(
            payload["error"]
                .as_str()
                .is_some_and(|message| message.starts_with("failed to parse form spec"))
        );
    }

    #[test]
    fn validate_spec_reports_ok_for_default_form() {
        let report = parse(&validate_spec("contact-form", ""));
        assert_eq!(report["ok"], true);
        assert_eq!(report["errors"], json!([]));
    }

    #[test]
    fn compile_emits_schema_and_ui_schema() {
        let compiled = parse(&compile("contact-form", ""));
        assert!(compiled["schema"]["properties"]["province"].is_object());
        assert_eq!(compiled["uiSchema"]["ui:order"][0], "country");
    }

    #[test]
    fn compile_refuses_invalid_specs() {
        let spec = json!({ "version": "1.0", "id": "empty", "title": "Empty", "pages": [] });
        let config = json!({ "form_spec_json": spec.to_string() });
        let payload = parse(&compile("empty", &config.to_string()));
        let message = payload["error"].as_str().expect("error message");
        assert!(message.contains("At least one page is required"));
        assert!(message.contains("Form has no questions"));
    }

    #[test]
    fn effective_hides_state_for_canada() {
        let payload = parse(&effective("contact-form", "", r#"{"country":"CA"}"#));
        assert_eq!(payload["hidden"], json!(["state"]));
        assert_eq!(payload["uiSchema"]["state"]["ui:widget"], "hidden");
    }

    #[test]
    fn effective_from_compiled_matches_the_spec_path() {
        let compiled = compile("contact-form", "");
        let data = r#"{"newsletter":false}"#;
        assert_eq!(
            parse(&effective_from_compiled(&compiled, data)),
            parse(&effective("contact-form", "", data))
        );
        let payload = parse(&effective_from_compiled("nope", data));
        assert!(payload["error"].is_string());
    }

    #[test]
    fn check_submission_enforces_the_country_rule() {
        let data = json!({ "full_name": "Ada", "email": "ada@example.com", "country": "CA" });
        let report = parse(&check_submission("contact-form", "", &data.to_string()));
        assert_eq!(report["valid"], false);

        let data = json!({ "full_name": "Ada", "email": "ada@example.com", "country": "US" });
        let report = parse(&check_submission("contact-form", "", &data.to_string()));
        assert_eq!(report["valid"], true);
    }

    #[test]
    fn import_converts_json_schema() {
        let schema = json!({
            "type": "object",
            "title": "Quick",
            "properties": { "name": { "type": "string" }, "blob": { "type": "object" } }
        });
        let payload = parse(&import(&schema.to_string()));
        assert_eq!(payload["spec"]["title"], "Quick");
        assert_eq!(payload["warnings"], json!(["Unsupported type for 'blob': object"]));

        let payload = parse(&import(r#"{"hello":"world"}"#));
        assert!(payload["error"].as_str().is_some_and(|m| m.contains("unknown JSON format")));
    }
}
