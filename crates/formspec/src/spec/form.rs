use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::spec::question::Question;
use crate::spec::rule::Rule;

/// The only FormSpec version this engine understands.
pub const FORMSPEC_VERSION: &str = "1.0";

/// Rendering hints attached to a form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct UiHints {
    /// Explicit ordering override, as question ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<String>,
    /// Widget overrides keyed by question id (or key).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub widgets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// Top-level authoring tree: pages, sections, questions and global rules.
///
/// `version` and `pages` default when missing so a malformed document still
/// reaches [`crate::validate::validate_spec`] instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FormSpec {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiHints>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl FormSpec {
    /// Questions in discovery order: pages, then sections, then questions.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.pages
            .iter()
            .flat_map(|page| page.sections.iter())
            .flat_map(|section| section.questions.iter())
    }

    pub fn questions_mut(&mut self) -> impl Iterator<Item = &mut Question> {
        self.pages
            .iter_mut()
            .flat_map(|page| page.sections.iter_mut())
            .flat_map(|section| section.questions.iter_mut())
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions().find(|question| question.id == id)
    }

    /// Explicit ordering override, empty when none is set.
    pub fn ui_order(&self) -> &[String] {
        self.ui.as_ref().map(|ui| ui.order.as_slice()).unwrap_or(&[])
    }
}
