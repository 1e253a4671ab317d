use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::error;

use super::field::{FieldDefinition, FieldOutcome};
use super::rules::{resolve, AnswerSet, ErrorKind, Resolution};
use super::section::SectionDefinition;
use super::step::StepDefinition;
use super::{FormDefinitionError, Locale};

/// Identifier for a registered form definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FormId(pub String);

impl FormId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A complete multi-section application definition. Built once at startup;
/// construction fails fast on programmer errors (duplicate names, empty
/// choice options, empty sections).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    pub id: FormId,
    pub title: String,
    pub schema_version: u32,
    pub sections: Vec<SectionDefinition>,
}

impl FormDefinition {
    pub fn new(
        id: &str,
        title: &str,
        schema_version: u32,
        sections: Vec<SectionDefinition>,
    ) -> Result<Self, FormDefinitionError> {
        if sections.is_empty() {
            return Err(FormDefinitionError::EmptyForm);
        }

        let mut slugs = BTreeSet::new();
        let mut names = BTreeSet::new();
        for section in &sections {
            if !slugs.insert(section.slug.clone()) {
                return Err(FormDefinitionError::DuplicateSlug {
                    slug: section.slug.clone(),
                });
            }
            if section.steps.is_empty() {
                return Err(FormDefinitionError::EmptySection {
                    slug: section.slug.clone(),
                });
            }
            for step in &section.steps {
                if !slugs.insert(format!("{}/{}", section.slug, step.slug)) {
                    return Err(FormDefinitionError::DuplicateSlug {
                        slug: step.slug.clone(),
                    });
                }
                if step.fields.is_empty() {
                    return Err(FormDefinitionError::EmptyStep {
                        slug: step.slug.clone(),
                    });
                }
                for field in &step.fields {
                    field.check()?;
                    if !names.insert(field.name.clone()) {
                        return Err(FormDefinitionError::DuplicateFieldName {
                            field: field.name.clone(),
                        });
                    }
                }
            }
        }

        Ok(Self {
            id: FormId::new(id),
            title: title.to_string(),
            schema_version,
            sections,
        })
    }

    /// Bind an answer-set and locale to this definition. Cheap; done per
    /// request so conditional state always reflects the latest answers.
    pub fn instantiate(&self, data: AnswerSet, locale: Locale) -> Form<'_> {
        Form {
            definition: self,
            data,
            locale,
        }
    }

    pub fn section(&self, slug: &str) -> Option<&SectionDefinition> {
        self.sections.iter().find(|section| section.slug == slug)
    }

    pub fn step(&self, section_slug: &str, index: usize) -> Option<&StepDefinition> {
        self.section(section_slug)?.steps.get(index)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().find(|field| field.name == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.sections
            .iter()
            .flat_map(|section| section.steps.iter())
            .flat_map(|step| step.fields.iter())
    }

    pub fn file_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields()
            .filter(|field| matches!(field.kind, super::FieldKind::File))
    }

    /// The step owning a field, together with its section.
    pub fn step_for_field(&self, name: &str) -> Option<(&SectionDefinition, &StepDefinition)> {
        for section in &self.sections {
            for step in &section.steps {
                if step.fields.iter().any(|field| field.name == name) {
                    return Some((section, step));
                }
            }
        }
        None
    }

    /// Definition-time lint: a step that can be skipped must not contain a
    /// field whose rule still requires data under the same answers. Run from
    /// tests when a definition changes; a violation is a config bug.
    pub fn check_consistency(&self) -> Vec<ConsistencyIssue> {
        let mut issues = Vec::new();
        for section in &self.sections {
            for step in &section.steps {
                let Some(skipped_answers) = step.condition.counterexample() else {
                    continue;
                };
                for field in &step.fields {
                    if !field.is_required {
                        continue;
                    }
                    if let Resolution::Applicable(_) = resolve(&field.rule, &skipped_answers) {
                        issues.push(ConsistencyIssue {
                            section: section.slug.clone(),
                            step: step.slug.clone(),
                            field: field.name.clone(),
                            detail: "field remains required while its step is skipped".to_string(),
                        });
                    }
                }
            }
        }
        issues
    }
}

/// A skippable step whose field rules do not strip in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyIssue {
    pub section: String,
    pub step: String,
    pub field: String,
    pub detail: String,
}

/// Registry of form definitions keyed by id, shared by the service layer.
#[derive(Debug, Default)]
pub struct FormRegistry {
    forms: BTreeMap<FormId, FormDefinition>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, definition: FormDefinition) -> Self {
        self.forms.insert(definition.id.clone(), definition);
        self
    }

    pub fn get(&self, id: &FormId) -> Option<&FormDefinition> {
        self.forms.get(id)
    }
}

/// One failing field check with its localized message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationMessage {
    pub field: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of full-form validation: the answer-set with inapplicable fields
/// stripped and applicable values normalized, plus every failing check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub value: AnswerSet,
    pub messages: Vec<ValidationMessage>,
}

/// Validation messages partitioned by owning step. `unmapped` holds messages
/// whose field belongs to no currently-reachable step, a definition drift
/// logged and surfaced instead of dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct StepErrors {
    pub by_step: BTreeMap<String, Vec<ValidationMessage>>,
    pub unmapped: Vec<ValidationMessage>,
}

/// Derived completion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub is_complete: bool,
    pub applicable_steps: usize,
    pub complete_steps: usize,
}

/// A position in the form, or the review/summary screen past its end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum Page {
    Step { section: String, index: usize },
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub previous: Option<Page>,
    pub next: Page,
}

/// A form definition bound to the current answer-set.
#[derive(Debug, Clone)]
pub struct Form<'a> {
    pub definition: &'a FormDefinition,
    pub data: AnswerSet,
    pub locale: Locale,
}

impl Form<'_> {
    /// Deterministic and total: every field whose conditional rule applies
    /// under the current answers is checked; stripped fields never appear in
    /// the output value.
    pub fn validate(&self) -> ValidationOutcome {
        let mut value = AnswerSet::new();
        let mut messages = Vec::new();

        for field in self.definition.fields() {
            match field.evaluate(&self.data) {
                FieldOutcome::Stripped | FieldOutcome::Empty => {}
                FieldOutcome::Value(normalized) => {
                    value.insert(field.name.clone(), normalized);
                }
                FieldOutcome::Errors(kinds) => {
                    for kind in kinds {
                        messages.push(ValidationMessage {
                            field: field.name.clone(),
                            kind,
                            message: field.message_for(kind, self.locale),
                        });
                    }
                }
            }
        }

        ValidationOutcome { value, messages }
    }

    /// Partition full-form validation failures by the step that owns each
    /// failing field, for the review screen.
    pub fn errors_by_step(&self) -> StepErrors {
        let outcome = self.validate();
        let mut by_step: BTreeMap<String, Vec<ValidationMessage>> = BTreeMap::new();
        let mut unmapped = Vec::new();

        for message in outcome.messages {
            match self.definition.step_for_field(&message.field) {
                Some((_, step)) if step.is_required(&self.data) => {
                    by_step.entry(step.slug.clone()).or_default().push(message);
                }
                _ => {
                    error!(
                        field = %message.field,
                        kind = message.kind.label(),
                        form = %self.definition.id,
                        "validation failure does not map to a reachable step"
                    );
                    unmapped.push(message);
                }
            }
        }

        StepErrors { by_step, unmapped }
    }

    pub fn progress(&self) -> Progress {
        let outcome = self.validate();
        let failing: BTreeSet<&str> = outcome
            .messages
            .iter()
            .map(|message| message.field.as_str())
            .collect();

        let mut applicable_steps = 0;
        let mut complete_steps = 0;
        for section in &self.definition.sections {
            for step in &section.steps {
                if !step.is_required(&self.data) {
                    continue;
                }
                applicable_steps += 1;
                if step.field_names().all(|name| !failing.contains(name)) {
                    complete_steps += 1;
                }
            }
        }

        Progress {
            is_complete: outcome.messages.is_empty(),
            applicable_steps,
            complete_steps,
        }
    }

    /// Previous/next pages from the given position, skipping any step whose
    /// condition is false under the current answers. Falls through section
    /// boundaries; lands on the summary when nothing applicable remains.
    pub fn pagination(&self, section_slug: &str, step_index: usize) -> Option<Pagination> {
        let flat = self.flatten();
        let position = flat
            .iter()
            .position(|(section, index, _)| *section == section_slug && *index == step_index)?;

        let next = flat[position + 1..]
            .iter()
            .find(|(_, _, step)| step.is_required(&self.data))
            .map(|(section, index, _)| Page::Step {
                section: section.to_string(),
                index: *index,
            })
            .unwrap_or(Page::Summary);

        let previous = flat[..position]
            .iter()
            .rev()
            .find(|(_, _, step)| step.is_required(&self.data))
            .map(|(section, index, _)| Page::Step {
                section: section.to_string(),
                index: *index,
            });

        Some(Pagination { previous, next })
    }

    /// First applicable step of the whole form, or the summary for a form
    /// where nothing applies.
    pub fn first_page(&self) -> Page {
        self.flatten()
            .into_iter()
            .find(|(_, _, step)| step.is_required(&self.data))
            .map(|(section, index, _)| Page::Step {
                section: section.to_string(),
                index,
            })
            .unwrap_or(Page::Summary)
    }

    fn flatten(&self) -> Vec<(&str, usize, &StepDefinition)> {
        self.definition
            .sections
            .iter()
            .flat_map(|section| {
                section
                    .steps
                    .iter()
                    .enumerate()
                    .map(move |(index, step)| (section.slug.as_str(), index, step))
            })
            .collect()
    }
}
