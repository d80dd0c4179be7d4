use serde_json::json;

use formspec::{FormSpec, FormSpecError, compile_checked, validate_spec};

fn fixture(name: &str) -> &'static str {
    match name {
        "contact_form" => include_str!("../tests/fixtures/contact_form.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

#[test]
fn fixture_is_valid() {
    let spec: FormSpec = serde_json::from_str(fixture("contact_form")).expect("deserialize");
    let report = validate_spec(&spec);
    assert!(report.ok, "{:?}", report.errors);
    assert!(compile_checked(&spec).is_ok());
}

#[test]
fn collects_every_problem() {
    let spec: FormSpec = serde_json::from_value(json!({
        "version": "1.0",
        "id": "bad",
        "title": "Bad",
        "pages": [{ "id": "p", "title": "P", "sections": [{ "id": "s", "title": "S", "questions": [
            { "id": "a", "key": "1abc", "type": "text", "label": "First" },
            { "id": "a", "key": "dup", "type": "text", "label": "Second" },
            { "id": "c", "key": " dup ", "type": "text", "label": "Third" }
        ]}]}]
    }))
    .expect("deserialize");

    let report = validate_spec(&spec);
    assert!(!report.ok);
    assert_eq!(
        report.errors,
        vec![
            "Invalid key \"1abc\" on \"First\". Use a-z, 0-9, underscore; start with a letter."
                .to_string(),
            "Duplicate question id: a".to_string(),
            "Duplicate key \"dup\"".to_string(),
        ]
    );
}

#[test]
fn checked_compile_refuses_invalid_specs() {
    let spec: FormSpec = serde_json::from_value(json!({ "version": "0.9", "id": "x", "title": "X" }))
        .expect("deserialize");
    match compile_checked(&spec) {
        Err(FormSpecError::Invalid(report)) => {
            assert_eq!(report.errors[0], "Unsupported FormSpec version");
        }
        other => panic!("expected invalid spec, got {other:?}"),
    }
}
