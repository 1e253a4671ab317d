//! Declarative form model: fields with conditional validation rules, steps,
//! sections, and the whole-form validation/progress/pagination engine.

pub mod definitions;
pub mod field;
pub mod form;
pub mod rules;
pub mod section;
pub mod step;

#[cfg(test)]
mod tests;

pub use field::{FieldDefinition, FieldKind, FieldMessage, FieldOutcome};
pub use form::{
    ConsistencyIssue, Form, FormDefinition, FormId, FormRegistry, Page, Pagination, Progress,
    StepErrors, ValidationMessage, ValidationOutcome,
};
pub use rules::{AnswerSet, ErrorKind, Rule};
pub use section::SectionDefinition;
pub use step::{StepCondition, StepDefinition};

use serde::{Deserialize, Serialize};

/// Locales the platform renders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Cy,
}

impl Locale {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "cy" | "cymraeg" | "welsh" => Self::Cy,
            _ => Self::En,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Cy => "cy",
        }
    }
}

/// Programmer errors in a form definition. Raised at build time, never while
/// validating user input.
#[derive(Debug, thiserror::Error)]
pub enum FormDefinitionError {
    #[error("field is missing a name")]
    MissingFieldName,
    #[error("field '{field}' is missing a label")]
    MissingFieldLabel { field: String },
    #[error("choice field '{field}' has no options")]
    EmptyOptions { field: String },
    #[error("field name '{field}' is used more than once")]
    DuplicateFieldName { field: String },
    #[error("slug '{slug}' is used more than once")]
    DuplicateSlug { slug: String },
    #[error("step '{slug}' contains no fields")]
    EmptyStep { slug: String },
    #[error("section '{slug}' contains no steps")]
    EmptySection { slug: String },
    #[error("form contains no sections")]
    EmptyForm,
}
