use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::field::FieldDefinition;
use super::rules::{gate_matches, AnswerSet};

/// Predicate deciding whether a step currently applies. A step whose
/// condition is false is transparently skipped by pagination, and its
/// fields' rules must strip under the same gate (enforced by the
/// definition-time consistency check).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepCondition {
    Always,
    Equals { field: String, value: Value },
    NotEquals { field: String, value: Value },
    AnyOf(Vec<StepCondition>),
}

impl StepCondition {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        StepCondition::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn not_equals(field: &str, value: impl Into<Value>) -> Self {
        StepCondition::NotEquals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn is_met(&self, answers: &AnswerSet) -> bool {
        match self {
            StepCondition::Always => true,
            StepCondition::Equals { field, value } => gate_matches(answers.get(field), value),
            StepCondition::NotEquals { field, value } => !gate_matches(answers.get(field), value),
            StepCondition::AnyOf(conditions) => {
                conditions.iter().any(|condition| condition.is_met(answers))
            }
        }
    }

    /// An answer-set under which this condition is false, used by the
    /// consistency lint. `None` means the condition is always met.
    pub(crate) fn counterexample(&self) -> Option<AnswerSet> {
        match self {
            StepCondition::Always => None,
            // gate unmet when the answer is absent
            StepCondition::Equals { .. } => Some(AnswerSet::new()),
            StepCondition::NotEquals { field, value } => {
                let mut answers = AnswerSet::new();
                answers.insert(field.clone(), value.clone());
                Some(answers)
            }
            StepCondition::AnyOf(conditions) => {
                let mut merged = AnswerSet::new();
                for condition in conditions {
                    merged.extend(condition.counterexample()?);
                }
                Some(merged)
            }
        }
    }
}

/// One page-sized group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub slug: String,
    pub title: String,
    pub condition: StepCondition,
    /// Tag naming an out-of-band check run after schema validation passes
    /// and before the step is persisted.
    pub pre_flight: Option<String>,
    pub fields: Vec<FieldDefinition>,
}

impl StepDefinition {
    pub fn new(slug: &str, title: &str, fields: Vec<FieldDefinition>) -> Self {
        Self {
            slug: slug.to_string(),
            title: title.to_string(),
            condition: StepCondition::Always,
            pre_flight: None,
            fields,
        }
    }

    pub fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_pre_flight(mut self, tag: &str) -> Self {
        self.pre_flight = Some(tag.to_string());
        self
    }

    pub fn is_required(&self, answers: &AnswerSet) -> bool {
        self.condition.is_met(answers)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }
}
