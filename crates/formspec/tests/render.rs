use serde_json::json;

use formspec::{
    FormSpec, HIDDEN_WIDGET, check_effective, check_submission, compile, compute_effective,
    effective_for, resolve_visibility,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "contact_form" => include_str!("../tests/fixtures/contact_form.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn contact_form() -> FormSpec {
    serde_json::from_str(fixture("contact_form")).expect("deserialize")
}

#[test]
fn state_is_hidden_until_country_is_us() {
    let compiled = compile(&contact_form());

    let effective = effective_for(&compiled, &json!({ "country": "CA" }));
    assert!(effective.is_hidden("state"));
    assert_eq!(effective.ui_schema["state"]["ui:widget"], HIDDEN_WIDGET);

    let effective = effective_for(&compiled, &json!({ "country": "US" }));
    assert!(!effective.is_hidden("state"));
    assert!(effective.ui_schema.get("state").is_none());
}

#[test]
fn topics_are_disabled_when_newsletter_is_off() {
    let compiled = compile(&contact_form());
    let effective = effective_for(&compiled, &json!({ "newsletter": false }));
    assert!(effective.is_disabled("topics"));
    assert_eq!(effective.ui_schema["topics"]["ui:disabled"], true);

    let effective = effective_for(&compiled, &json!({ "newsletter": true }));
    assert!(!effective.is_disabled("topics"));
}

#[test]
fn province_is_required_only_for_canada() {
    let compiled = compile(&contact_form());
    let base = json!({ "full_name": "Ada", "email": "ada@example.com" });

    let mut canada = base.clone();
    canada["country"] = json!("CA");
    let report = check_effective(&compiled, &canada).expect("schema compiles");
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("province")));

    canada["province"] = json!("ON");
    let report = check_effective(&compiled, &canada).expect("schema compiles");
    assert!(report.valid, "{:?}", report.errors);

    let mut us = base;
    us["country"] = json!("US");
    let report = check_effective(&compiled, &us).expect("schema compiles");
    assert!(report.valid, "{:?}", report.errors);
}

#[test]
fn hidden_fields_leave_the_required_list() {
    let schema = json!({
        "type": "object",
        "properties": {
            "x": {
                "type": "string",
                "visibleWhen": [{ "all": [{ "field": "toggle", "eq": true }] }]
            },
            "toggle": { "type": "boolean" }
        },
        "required": ["x"]
    });
    let effective = compute_effective(&schema, &json!({}), &json!({ "toggle": false }));
    assert!(effective.schema.get("required").is_none());
    assert!(effective.required().is_empty());

    let effective = compute_effective(&schema, &json!({}), &json!({ "toggle": true }));
    assert_eq!(effective.required(), vec!["x"]);
}

#[test]
fn reducer_is_pure() {
    let compiled = compile(&contact_form());
    let before = compiled.clone();
    let data = json!({ "country": "US", "newsletter": false });
    let first = effective_for(&compiled, &data);
    let second = effective_for(&compiled, &data);
    assert_eq!(first, second);
    assert_eq!(compiled, before);
}

#[test]
fn tree_preview_matches_the_compiled_reducer() {
    let spec = contact_form();
    let data = json!({ "country": "CA" });
    let preview = resolve_visibility(&spec, &data);
    assert_eq!(preview.get("state"), Some(&false));
    assert_eq!(preview.get("province"), Some(&true));

    let effective = effective_for(&compile(&spec), &data);
    for (key, visible) in &preview {
        assert_eq!(!effective.is_hidden(key), *visible, "{key}");
    }
}

#[test]
fn numeric_rules_ignore_non_numeric_answers() {
    let spec: FormSpec = serde_json::from_value(json!({
        "version": "1.0",
        "id": "adults",
        "title": "Adults",
        "pages": [{ "id": "p", "title": "P", "sections": [{ "id": "s", "title": "S", "questions": [
            { "id": "q-age", "key": "age", "type": "text", "label": "Age" },
            { "id": "q-notes", "key": "notes", "type": "text", "label": "Notes" }
        ]}]}],
        "rules": [{
            "id": "r-adult",
            "when": { "all": [{ "field": "q-age", "gte": 18 }] },
            "then": [{ "op": "setRequired", "field": "q-notes", "value": true }]
        }]
    }))
    .expect("deserialize");
    let compiled = compile(&spec);
    let condition = &compiled.schema["allOf"][0]["if"];
    let matches = |age: serde_json::Value| {
        check_submission(condition, &json!({ "age": age }))
            .expect("schema compiles")
            .valid
    };

    assert!(matches(json!(21)));
    assert!(!matches(json!(10)));
    assert!(!matches(json!("10")));
    assert!(!matches(json!("abc")));

    for age in ["10", "abc"] {
        let report = check_effective(&compiled, &json!({ "age": age })).expect("schema compiles");
        assert!(report.valid, "age {age}: {:?}", report.errors);
    }
}
