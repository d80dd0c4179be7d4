pub mod clause;
pub mod form;
pub mod question;
pub mod rule;

pub use clause::{Clause, ClauseList, Comparator, Condition};
pub use form::{FORMSPEC_VERSION, FormSpec, Page, Section, UiHints};
pub use question::{Question, QuestionOption, QuestionType};
pub use rule::{Rule, RuleAction};
