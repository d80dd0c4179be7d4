use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::compile::{CompiledForm, compile};
use crate::keys::{IdToKey, KeyResolver};
use crate::spec::clause::ClauseList;
use crate::spec::form::{FORMSPEC_VERSION, FormSpec, Page, Section, UiHints};
use crate::spec::question::{Question, QuestionOption, QuestionType};
use crate::spec::rule::Rule;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone)]
struct PageNode {
    title: String,
    sections: Vec<String>,
}

#[derive(Debug, Clone)]
struct SectionNode {
    page: String,
    title: String,
    questions: Vec<String>,
}

#[derive(Debug, Clone)]
struct QuestionNode {
    section: String,
    question: Question,
}

/// Partial update for a section. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct SectionPatch {
    pub title: Option<String>,
}

/// Partial update for a question.
///
/// Outer `None` leaves a field untouched; for the optional fields
/// `Some(None)` clears it. Clearing `key` makes the next normalisation derive
/// a fresh one from the label.
#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub key: Option<Option<String>>,
    pub kind: Option<QuestionType>,
    pub label: Option<String>,
    pub required: Option<bool>,
    pub help: Option<Option<String>>,
    pub placeholder: Option<Option<String>>,
    pub options: Option<Vec<QuestionOption>>,
    pub visible_when: Option<ClauseList>,
    pub disabled_when: Option<ClauseList>,
    pub meta: Option<Map<String, Value>>,
}

impl QuestionPatch {
    fn apply(self, question: &mut Question) {
        if let Some(key) = self.key {
            question.key = key;
        }
        if let Some(kind) = self.kind {
            question.kind = kind;
        }
        if let Some(label) = self.label {
            question.label = label;
        }
        if let Some(required) = self.required {
            question.required = required;
        }
        if let Some(help) = self.help {
            question.help = help;
        }
        if let Some(placeholder) = self.placeholder {
            question.placeholder = placeholder;
        }
        if let Some(options) = self.options {
            question.options = options;
        }
        if let Some(visible_when) = self.visible_when {
            question.visible_when = visible_when;
        }
        if let Some(disabled_when) = self.disabled_when {
            question.disabled_when = disabled_when;
        }
        if let Some(meta) = self.meta {
            question.meta = meta;
        }
    }
}

/// Mutable authoring model backed by an id-keyed arena.
///
/// Pages, sections and questions live in flat maps; parents hold ordered id
/// lists of their children. Every mutation leaves the model normalised:
/// keys are valid and unique, and clause and rule references name keys
/// rather than question ids.
#[derive(Debug, Clone)]
pub struct SpecEditor {
    shell: FormSpec,
    page_order: Vec<String>,
    pages: HashMap<String, PageNode>,
    sections: HashMap<String, SectionNode>,
    questions: HashMap<String, QuestionNode>,
    order: Vec<String>,
    rules: Vec<Rule>,
}

impl SpecEditor {
    /// One page "Page 1" with one empty section "Section 1".
    pub fn new_empty(title: impl Into<String>) -> Self {
        let mut editor = Self::from_spec(FormSpec {
            version: FORMSPEC_VERSION.to_string(),
            id: new_id(),
            title: title.into(),
            ..FormSpec::default()
        });
        let page = editor.add_page("Page 1");
        editor.add_section(&page, "Section 1");
        editor
    }

    /// Loads an authoring tree. Colliding ids are replaced with fresh ones so
    /// the arena stays consistent.
    pub fn from_spec(spec: FormSpec) -> Self {
        let mut spec = spec;
        let pages = std::mem::take(&mut spec.pages);
        let rules = std::mem::take(&mut spec.rules);
        let order = spec
            .ui
            .as_mut()
            .map(|ui| std::mem::take(&mut ui.order))
            .unwrap_or_default();

        let mut editor = Self {
            shell: spec,
            page_order: Vec::new(),
            pages: HashMap::new(),
            sections: HashMap::new(),
            questions: HashMap::new(),
            order,
            rules,
        };

        for page in pages {
            let page_id = editor.free_id(page.id, |e, id| e.pages.contains_key(id));
            let mut section_ids = Vec::with_capacity(page.sections.len());
            for section in page.sections {
                let section_id = editor.free_id(section.id, |e, id| e.sections.contains_key(id));
                let mut question_ids = Vec::with_capacity(section.questions.len());
                for mut question in section.questions {
                    question.id =
                        editor.free_id(question.id, |e, id| e.questions.contains_key(id));
                    question_ids.push(question.id.clone());
                    editor.questions.insert(
                        question.id.clone(),
                        QuestionNode {
                            section: section_id.clone(),
                            question,
                        },
                    );
                }
                editor.sections.insert(
                    section_id.clone(),
                    SectionNode {
                        page: page_id.clone(),
                        title: section.title,
                        questions: question_ids,
                    },
                );
                section_ids.push(section_id);
            }
            editor.pages.insert(
                page_id.clone(),
                PageNode {
                    title: page.title,
                    sections: section_ids,
                },
            );
            editor.page_order.push(page_id);
        }

        editor.normalize();
        editor
    }

    fn free_id(&self, id: String, taken: impl Fn(&Self, &str) -> bool) -> String {
        if !id.is_empty() && !taken(self, &id) {
            return id;
        }
        let fresh = new_id();
        tracing::warn!(id = %id, replacement = %fresh, "replacing missing or duplicate id");
        fresh
    }

    /// Rebuilds the nested authoring tree.
    pub fn to_spec(&self) -> FormSpec {
        let mut spec = self.shell.clone();
        spec.pages = self
            .page_order
            .iter()
            .filter_map(|page_id| {
                let node = self.pages.get(page_id)?;
                Some(Page {
                    id: page_id.clone(),
                    title: node.title.clone(),
                    sections: node
                        .sections
                        .iter()
                        .filter_map(|section_id| self.section(section_id))
                        .collect(),
                })
            })
            .collect();
        spec.rules = self.rules.clone();

        let widgets = spec.ui.take().map(|ui| ui.widgets).unwrap_or_default();
        if !self.order.is_empty() || !widgets.is_empty() {
            spec.ui = Some(UiHints {
                order: self.order.clone(),
                widgets,
            });
        }
        spec
    }

    fn section(&self, section_id: &str) -> Option<Section> {
        let node = self.sections.get(section_id)?;
        Some(Section {
            id: section_id.to_string(),
            title: node.title.clone(),
            questions: node
                .questions
                .iter()
                .filter_map(|id| self.questions.get(id))
                .map(|node| node.question.clone())
                .collect(),
        })
    }

    pub fn compile(&self) -> CompiledForm {
        compile(&self.to_spec())
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.get(id).map(|node| &node.question)
    }

    /// Section currently holding the question.
    pub fn section_of(&self, question_id: &str) -> Option<&str> {
        self.questions
            .get(question_id)
            .map(|node| node.section.as_str())
    }

    pub fn page_of(&self, section_id: &str) -> Option<&str> {
        self.sections.get(section_id).map(|node| node.page.as_str())
    }

    pub fn page_ids(&self) -> &[String] {
        &self.page_order
    }

    pub fn section_ids(&self, page_id: &str) -> &[String] {
        self.pages
            .get(page_id)
            .map(|node| node.sections.as_slice())
            .unwrap_or(&[])
    }

    pub fn question_ids(&self, section_id: &str) -> &[String] {
        self.sections
            .get(section_id)
            .map(|node| node.questions.as_slice())
            .unwrap_or(&[])
    }

    /// The `ui.order` list as question ids.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn add_page(&mut self, title: impl Into<String>) -> String {
        let id = new_id();
        self.pages.insert(
            id.clone(),
            PageNode {
                title: title.into(),
                sections: Vec::new(),
            },
        );
        self.page_order.push(id.clone());
        id
    }

    /// Returns `None` when the page does not exist.
    pub fn add_section(&mut self, page_id: &str, title: impl Into<String>) -> Option<String> {
        let page = self.pages.get_mut(page_id)?;
        let id = new_id();
        page.sections.push(id.clone());
        self.sections.insert(
            id.clone(),
            SectionNode {
                page: page_id.to_string(),
                title: title.into(),
                questions: Vec::new(),
            },
        );
        Some(id)
    }

    pub fn update_section(&mut self, section_id: &str, patch: SectionPatch) -> bool {
        let Some(section) = self.sections.get_mut(section_id) else {
            return false;
        };
        if let Some(title) = patch.title {
            section.title = title;
        }
        true
    }

    /// Appends a question to a section and to `ui.order`. A missing or
    /// already used id is replaced. Returns the question id, or `None` when
    /// the section does not exist.
    pub fn add_question(&mut self, section_id: &str, question: Question) -> Option<String> {
        if !self.sections.contains_key(section_id) {
            return None;
        }
        let mut question = question;
        question.id = self.free_id(question.id, |e, id| e.questions.contains_key(id));
        let id = question.id.clone();

        if let Some(section) = self.sections.get_mut(section_id) {
            section.questions.push(id.clone());
        }
        self.questions.insert(
            id.clone(),
            QuestionNode {
                section: section_id.to_string(),
                question,
            },
        );
        self.order.push(id.clone());
        self.normalize();
        Some(id)
    }

    pub fn update_question(&mut self, id: &str, patch: QuestionPatch) -> bool {
        let Some(node) = self.questions.get_mut(id) else {
            return false;
        };
        patch.apply(&mut node.question);
        self.normalize();
        true
    }

    /// Moves a question into `to_section` at `index` (clamped to the section
    /// length) and rebuilds `ui.order` from tree order. A missing question or
    /// target section leaves the model untouched.
    pub fn move_question(&mut self, id: &str, to_section: &str, index: usize) -> bool {
        if !self.sections.contains_key(to_section) {
            return false;
        }
        let Some(node) = self.questions.get_mut(id) else {
            return false;
        };
        let from_section = std::mem::replace(&mut node.section, to_section.to_string());

        if let Some(section) = self.sections.get_mut(&from_section) {
            section.questions.retain(|question| question != id);
        }
        if let Some(section) = self.sections.get_mut(to_section) {
            let index = index.min(section.questions.len());
            section.questions.insert(index, id.to_string());
        }
        self.order = self.tree_order();
        true
    }

    /// Removes a question along with every clause group and rule that refers
    /// to it, then rebuilds `ui.order`. Returns the removed question.
    pub fn delete_question(&mut self, id: &str) -> Option<Question> {
        let node = self.questions.remove(id)?;
        if let Some(section) = self.sections.get_mut(&node.section) {
            section.questions.retain(|question| question != id);
        }

        let mut references = vec![id];
        if let Some(key) = node.question.key.as_deref() {
            references.push(key);
        }
        for other in self.questions.values_mut() {
            let question = &mut other.question;
            question.visible_when = question.visible_when.without_references(&references);
            question.disabled_when = question.disabled_when.without_references(&references);
        }
        self.rules.retain(|rule| {
            let keep = !rule.references(&references);
            if !keep {
                tracing::debug!(rule = %rule.id, question = %id, "dropping rule of deleted question");
            }
            keep
        });

        self.order = self.tree_order();
        Some(node.question)
    }

    fn tree_order(&self) -> Vec<String> {
        self.page_order
            .iter()
            .filter_map(|page_id| self.pages.get(page_id))
            .flat_map(|page| page.sections.iter())
            .filter_map(|section_id| self.sections.get(section_id))
            .flat_map(|section| section.questions.iter().cloned())
            .collect()
    }

    /// Assigns keys in tree order and rewrites id references to keys.
    fn normalize(&mut self) {
        let mut resolver = KeyResolver::new();
        for id in self.tree_order() {
            if let Some(node) = self.questions.get_mut(&id) {
                let key = resolver.resolve(&node.question);
                node.question.key = Some(key);
            }
        }
        let id_to_key: IdToKey = resolver.into_id_to_key();

        for node in self.questions.values_mut() {
            let question = &mut node.question;
            question.visible_when = question.visible_when.remap(&id_to_key);
            question.disabled_when = question.disabled_when.remap(&id_to_key);
        }
        for rule in &mut self.rules {
            rule.when = rule.when.remap(&id_to_key);
            for action in &mut rule.then {
                if let Some(key) = id_to_key.get(action.field()) {
                    *action.field_mut() = key.clone();
                }
            }
        }
    }
}
