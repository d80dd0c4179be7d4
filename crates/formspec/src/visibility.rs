use std::collections::BTreeMap;

use serde_json::Value;

use crate::condition::eval_condition;
use crate::keys::{IdToKey, resolve_keys};
use crate::spec::clause::{Clause, ClauseList};
use crate::spec::form::FormSpec;

/// Resolved key to visibility flag.
pub type VisibilityMap = BTreeMap<String, bool>;

/// A group passes when every `all` condition holds and, if `any` is
/// non-empty, at least one `any` condition holds.
pub fn eval_clause(data: &Value, clause: &Clause, id_to_key: &IdToKey) -> bool {
    let all_ok = clause
        .all
        .iter()
        .all(|condition| eval_condition(data, condition, id_to_key));
    let any_ok = clause.any.is_empty()
        || clause
            .any
            .iter()
            .any(|condition| eval_condition(data, condition, id_to_key));
    all_ok && any_ok
}

/// OR across groups.
pub fn any_clause_passes(data: &Value, clauses: &ClauseList, id_to_key: &IdToKey) -> bool {
    clauses
        .iter()
        .any(|clause| eval_clause(data, clause, id_to_key))
}

/// Absent or condition-free lists mean "always visible".
pub fn is_visible(data: &Value, visible_when: Option<&ClauseList>, id_to_key: &IdToKey) -> bool {
    match visible_when {
        Some(clauses) if clauses.has_conditions() => any_clause_passes(data, clauses, id_to_key),
        _ => true,
    }
}

/// Absent or condition-free lists mean "never disabled".
pub fn is_disabled(data: &Value, disabled_when: Option<&ClauseList>, id_to_key: &IdToKey) -> bool {
    match disabled_when {
        Some(clauses) if clauses.has_conditions() => any_clause_passes(data, clauses, id_to_key),
        _ => false,
    }
}

/// Visibility of every question of an authoring tree for the given data,
/// keyed by resolved key. Used by builder previews that hold the tree rather
/// than a compiled artifact.
pub fn resolve_visibility(spec: &FormSpec, data: &Value) -> VisibilityMap {
    let id_to_key = resolve_keys(spec);
    spec.questions()
        .filter_map(|question| {
            let key = id_to_key.get(&question.id)?;
            let visible = is_visible(data, Some(&question.visible_when), &id_to_key);
            Some((key.clone(), visible))
        })
        .collect()
}
