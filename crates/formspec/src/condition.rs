use serde_json::Value;

use crate::keys::{IdToKey, slugify};
use crate::spec::clause::{Comparator, Condition};

/// Looks up the value a condition field points at.
///
/// The field is first resolved through `id_to_key`, then looked up as an
/// exact key, as a dot path into nested objects, and finally under its slug.
pub fn lookup<'a>(data: &'a Value, field: &str, id_to_key: &IdToKey) -> Option<&'a Value> {
    if field.is_empty() {
        return None;
    }
    let key = id_to_key.get(field).map(String::as_str).unwrap_or(field);
    let object = data.as_object()?;

    if let Some(value) = object.get(key) {
        return Some(value);
    }

    if key.contains('.') {
        return key.split('.').try_fold(data, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        });
    }

    object.get(&slugify(key))
}

/// Evaluates one condition against the form data. Never panics; a condition
/// without a comparator passes.
pub fn eval_condition(data: &Value, condition: &Condition, id_to_key: &IdToKey) -> bool {
    let Some(comparator) = &condition.comparator else {
        return true;
    };
    let actual = lookup(data, &condition.field, id_to_key);

    match comparator {
        Comparator::Eq(expected) => actual.is_some_and(|value| loosely_equal(value, expected)),
        Comparator::Ne(expected) => !actual.is_some_and(|value| loosely_equal(value, expected)),
        Comparator::Gt(bound) => compare_numeric(actual, bound, |a, b| a > b),
        Comparator::Gte(bound) => compare_numeric(actual, bound, |a, b| a >= b),
        Comparator::Lt(bound) => compare_numeric(actual, bound, |a, b| a < b),
        Comparator::Lte(bound) => compare_numeric(actual, bound, |a, b| a <= b),
        Comparator::In(set) => actual.is_some_and(|value| contains(set, value)),
        Comparator::Nin(set) => !actual.is_some_and(|value| contains(set, value)),
    }
}

/// Numbers as-is; strings that are non-blank and parse to a finite number.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
        }
        _ => None,
    }
}

/// Post-coercion equality: numeric-looking operands compare as numbers,
/// everything else needs an exact type and value match.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => a == b,
        (None, None) => actual == expected,
        _ => false,
    }
}

fn compare_numeric(actual: Option<&Value>, bound: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.and_then(as_number), as_number(bound)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Membership without string/number coercion; numbers compare by value so
/// `1` and `1.0` are the same element.
fn contains(set: &[Value], value: &Value) -> bool {
    set.iter().any(|candidate| match (candidate, value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => candidate == value,
    })
}
