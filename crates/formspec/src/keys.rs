use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::spec::form::FormSpec;
use crate::spec::question::Question;

/// Question id to resolved key, built once per compilation pass.
pub type IdToKey = BTreeMap<String, String>;

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("key pattern compiles"));

static NON_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]+").expect("slug pattern compiles"));

const MAX_SLUG_LEN: usize = 64;

/// `^[a-z][a-z0-9_]*$`
pub fn is_valid_key(candidate: &str) -> bool {
    KEY_PATTERN.is_match(candidate)
}

/// Lower-cases, collapses runs of non `[a-z0-9_]` into `_`, caps the result
/// at 64 characters and trims leading/trailing underscores. May return an empty or still-invalid string
/// (e.g. one starting with a digit).
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    let slug: String = NON_KEY_CHARS
        .replace_all(&lowered, "_")
        .chars()
        .take(MAX_SLUG_LEN)
        .collect();
    slug.trim_matches('_').to_string()
}

/// Candidate key for a question before collision handling.
fn base_key(question: &Question) -> String {
    if let Some(key) = question.key.as_deref().map(str::trim)
        && is_valid_key(key)
    {
        return key.to_string();
    }

    let from_label = slugify(&question.label);
    if is_valid_key(&from_label) {
        return from_label;
    }

    let prefix: String = question.id.chars().take(6).collect();
    // always starts with `q`, so the slug is a valid key
    slugify(&format!("q_{prefix}"))
}

/// Assigns unique keys within one pass and records the id to key mapping.
#[derive(Debug, Default)]
pub struct KeyResolver {
    used: HashSet<String>,
    id_to_key: IdToKey,
}

impl KeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves and reserves the key for `question`. Never fails.
    pub fn resolve(&mut self, question: &Question) -> String {
        let base = base_key(question);
        let key = if self.used.contains(&base) {
            let mut suffix = 2;
            let mut candidate = format!("{base}_{suffix}");
            while self.used.contains(&candidate) {
                suffix += 1;
                candidate = format!("{base}_{suffix}");
            }
            tracing::warn!(
                id = %question.id,
                wanted = %base,
                assigned = %candidate,
                "question key collision"
            );
            candidate
        } else {
            base
        };

        self.used.insert(key.clone());
        self.id_to_key.insert(question.id.clone(), key.clone());
        key
    }

    pub fn id_to_key(&self) -> &IdToKey {
        &self.id_to_key
    }

    pub fn into_id_to_key(self) -> IdToKey {
        self.id_to_key
    }
}

/// Resolves every question key in discovery order without mutating the form.
pub fn resolve_keys(spec: &FormSpec) -> IdToKey {
    let mut resolver = KeyResolver::new();
    for question in spec.questions() {
        resolver.resolve(question);
    }
    resolver.into_id_to_key()
}

/// Writes the resolved key back onto every question. Idempotent: a spec whose
/// keys are already valid and unique is left unchanged.
pub fn ensure_keys(spec: &mut FormSpec) {
    let mut resolver = KeyResolver::new();
    for question in spec.questions_mut() {
        let key = resolver.resolve(question);
        question.key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::question::QuestionType;

    fn question(id: &str, key: Option<&str>, label: &str) -> Question {
        Question {
            id: id.into(),
            key: key.map(Into::into),
            kind: QuestionType::Text,
            label: label.into(),
            ..Question::default()
        }
    }

    #[test]
    fn explicit_valid_key_wins() {
        let mut resolver = KeyResolver::new();
        let key = resolver.resolve(&question("abc", Some("email"), "Work Email"));
        assert_eq!(key, "email");
    }

    #[test]
    fn invalid_key_falls_back_to_label_slug() {
        let mut resolver = KeyResolver::new();
        let key = resolver.resolve(&question("abc", Some("Bad Key"), "  First Name!! "));
        assert_eq!(key, "first_name");
    }

    #[test]
    fn unusable_label_falls_back_to_id_prefix() {
        let mut resolver = KeyResolver::new();
        let key = resolver.resolve(&question("7F3A-91C2-xyz", None, "123"));
        assert_eq!(key, "q_7f3a_9");
        assert!(is_valid_key(&key));
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let mut resolver = KeyResolver::new();
        let first = resolver.resolve(&question("a", None, "Name"));
        let second = resolver.resolve(&question("b", None, "Name"));
        let third = resolver.resolve(&question("c", Some("name"), "Other"));
        assert_eq!(first, "name");
        assert_eq!(second, "name_2");
        assert_eq!(third, "name_3");
        assert_eq!(resolver.id_to_key().get("b").map(String::as_str), Some("name_2"));
    }

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("__Hello,  World__"), "hello_world");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_caps_long_labels() {
        let label = "Please describe, in as much detail as you can, why you are applying today";
        let slug = slugify(label);
        assert_eq!(slug.chars().count(), 64);
        assert!(slug.starts_with("please_describe_in_as_much_detail"));
        assert!(is_valid_key(&slug));
        // a cut that lands on a separator is trimmed
        assert_eq!(slugify(&format!("{} tail", "a".repeat(63))), "a".repeat(63));
    }
}
