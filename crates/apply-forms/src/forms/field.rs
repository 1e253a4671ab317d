use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::rules::{
    is_empty_value, normalize_amount, parse_date_value, resolve, word_count, AnswerSet, ErrorKind,
    Resolution, Rule,
};
use super::{FormDefinitionError, Locale};

/// One field kind per input widget; behavior is selected by tag, not by a
/// type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Phone,
    Currency,
    Number,
    Date,
    Address,
    Radio,
    Checkbox,
    File,
}

impl FieldKind {
    pub const fn label(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Currency => "currency",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Address => "address",
            FieldKind::Radio => "radio",
            FieldKind::Checkbox => "checkbox",
            FieldKind::File => "file",
        }
    }

    const fn is_choice(self) -> bool {
        matches!(self, FieldKind::Radio | FieldKind::Checkbox)
    }
}

/// Localized copy for one error kind; first matching kind wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMessage {
    pub kind: ErrorKind,
    pub en: String,
    pub cy: Option<String>,
}

/// Declarative description of one answerable unit. Validation is a pure
/// function of `(definition, answer-set, locale)`; definitions are never
/// mutated after the form is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub is_required: bool,
    pub hint: Option<String>,
    pub options: Vec<String>,
    pub rule: Rule,
    pub messages: Vec<FieldMessage>,
}

impl FieldDefinition {
    /// Fails fast for programmer errors; user input never reaches here.
    pub fn new(name: &str, label: &str, kind: FieldKind) -> Result<Self, FormDefinitionError> {
        if name.trim().is_empty() {
            return Err(FormDefinitionError::MissingFieldName);
        }
        if label.trim().is_empty() {
            return Err(FormDefinitionError::MissingFieldLabel {
                field: name.to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            is_required: false,
            hint: None,
            options: Vec::new(),
            rule: Rule::Any,
            messages: Vec::new(),
        })
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|option| option.to_string()).collect();
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_message(mut self, kind: ErrorKind, en: &str, cy: Option<&str>) -> Self {
        self.messages.push(FieldMessage {
            kind,
            en: en.to_string(),
            cy: cy.map(str::to_string),
        });
        self
    }

    /// Definition-time check run when the form is assembled.
    pub(crate) fn check(&self) -> Result<(), FormDefinitionError> {
        if self.kind.is_choice() && self.options.is_empty() {
            return Err(FormDefinitionError::EmptyOptions {
                field: self.name.clone(),
            });
        }
        Ok(())
    }

    pub fn message_for(&self, kind: ErrorKind, locale: Locale) -> String {
        for message in &self.messages {
            if message.kind == kind {
                return match locale {
                    Locale::Cy => message.cy.clone().unwrap_or_else(|| message.en.clone()),
                    Locale::En => message.en.clone(),
                };
            }
        }
        kind.fallback(locale).to_string()
    }

    /// Validate this field against the whole answer-set. Never panics on
    /// user input; bad values come back as `Errors`.
    pub fn evaluate(&self, answers: &AnswerSet) -> FieldOutcome {
        let leaves = match resolve(&self.rule, answers) {
            Resolution::Strip => return FieldOutcome::Stripped,
            Resolution::Applicable(leaves) => leaves,
        };

        let current = answers.get(&self.name);
        if is_empty_value(current) {
            return if self.is_required {
                FieldOutcome::Errors(vec![ErrorKind::Required])
            } else {
                FieldOutcome::Empty
            };
        }
        let Some(value) = current else {
            return FieldOutcome::Empty;
        };

        let mut errors = Vec::new();
        let normalized = self.check_kind(value, &mut errors);
        for leaf in &leaves {
            self.check_leaf(leaf, value, answers, &mut errors);
        }

        if errors.is_empty() {
            FieldOutcome::Value(normalized.unwrap_or_else(|| value.clone()))
        } else {
            errors.dedup();
            FieldOutcome::Errors(errors)
        }
    }

    /// Kind-level shape check; returns the normalized value when one applies.
    fn check_kind(&self, value: &Value, errors: &mut Vec<ErrorKind>) -> Option<Value> {
        match self.kind {
            FieldKind::Text | FieldKind::Textarea => match value.as_str() {
                Some(raw) => Some(Value::String(raw.trim().to_string())),
                None => {
                    errors.push(ErrorKind::InvalidValue);
                    None
                }
            },
            FieldKind::Email => match value.as_str() {
                Some(raw) if looks_like_email(raw) => Some(Value::String(raw.trim().to_string())),
                _ => {
                    errors.push(ErrorKind::InvalidEmail);
                    None
                }
            },
            FieldKind::Phone => match value.as_str() {
                Some(raw) if looks_like_phone(raw) => Some(Value::String(raw.trim().to_string())),
                _ => {
                    errors.push(ErrorKind::InvalidPhone);
                    None
                }
            },
            FieldKind::Currency | FieldKind::Number => match normalize_amount(value) {
                Some(amount) => Some(Value::Number(amount.into())),
                None => {
                    errors.push(ErrorKind::NotANumber);
                    None
                }
            },
            FieldKind::Date => match parse_date_value(value) {
                Some(date) => Some(Value::String(date.format("%Y-%m-%d").to_string())),
                None => {
                    errors.push(ErrorKind::InvalidDate);
                    None
                }
            },
            FieldKind::Address => {
                let complete = value.as_object().is_some_and(|map| {
                    ["line1", "townCity", "postcode"].iter().all(|key| {
                        map.get(*key)
                            .and_then(Value::as_str)
                            .is_some_and(|part| !part.trim().is_empty())
                    })
                });
                if complete {
                    Some(value.clone())
                } else {
                    errors.push(ErrorKind::IncompleteAddress);
                    None
                }
            }
            FieldKind::Radio => match value.as_str() {
                Some(raw) if self.options.iter().any(|option| option == raw) => {
                    Some(Value::String(raw.to_string()))
                }
                _ => {
                    errors.push(ErrorKind::NotAnOption);
                    None
                }
            },
            FieldKind::Checkbox => {
                let valid = value.as_array().is_some_and(|items| {
                    items.iter().all(|item| {
                        item.as_str()
                            .is_some_and(|raw| self.options.iter().any(|option| option == raw))
                    })
                });
                if valid {
                    Some(value.clone())
                } else {
                    errors.push(ErrorKind::NotAnOption);
                    None
                }
            }
            FieldKind::File => {
                let named = value.as_object().is_some_and(|map| {
                    map.get("filename")
                        .and_then(Value::as_str)
                        .is_some_and(|name| !name.trim().is_empty())
                });
                if named {
                    Some(value.clone())
                } else {
                    errors.push(ErrorKind::MissingFile);
                    None
                }
            }
        }
    }

    fn check_leaf(&self, leaf: &Rule, value: &Value, answers: &AnswerSet, errors: &mut Vec<ErrorKind>) {
        match leaf {
            Rule::MinWords(min) => {
                if value.as_str().is_some_and(|raw| word_count(raw) < *min) {
                    errors.push(ErrorKind::TooFewWords);
                }
            }
            Rule::MaxWords(max) => {
                if value.as_str().is_some_and(|raw| word_count(raw) > *max) {
                    errors.push(ErrorKind::TooManyWords);
                }
            }
            Rule::MaxLength(max) => {
                if value.as_str().is_some_and(|raw| raw.chars().count() > *max) {
                    errors.push(ErrorKind::TooLong);
                }
            }
            Rule::MinAmount(min) => {
                if normalize_amount(value).is_some_and(|amount| amount < *min) {
                    errors.push(ErrorKind::BelowMinimum);
                }
            }
            Rule::MaxAmount(max) => {
                if normalize_amount(value).is_some_and(|amount| amount > *max) {
                    errors.push(ErrorKind::AboveMaximum);
                }
            }
            Rule::DiffersFrom(other) => {
                if let Some(other_value) = answers.get(other) {
                    if values_match(value, other_value) {
                        errors.push(ErrorKind::MatchesOtherField);
                    }
                }
            }
            Rule::SubsetOfField(other) => {
                let allowed = answers.get(other).and_then(Value::as_array);
                let Some(allowed) = allowed else {
                    errors.push(ErrorKind::NotInField);
                    return;
                };
                let selected: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    single => vec![single],
                };
                if !selected.iter().all(|item| allowed.contains(item)) {
                    errors.push(ErrorKind::NotInField);
                }
            }
            Rule::WithinDaysOf { field, days } => {
                let this_date = parse_date_value(value);
                let other_date = answers.get(field).and_then(parse_date_value);
                if let (Some(this_date), Some(other_date)) = (this_date, other_date) {
                    if (this_date - other_date).num_days().abs() > *days {
                        errors.push(ErrorKind::OutsideDateWindow);
                    }
                }
                // a missing or malformed sibling date fails on its own field
            }
            // containers and Any/Strip never survive resolution as leaves
            Rule::Any | Rule::Strip | Rule::All(_) | Rule::When { .. } => {}
        }
    }
}

/// Outcome of evaluating one field under an answer-set.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Conditional rule made the field inapplicable; value discarded.
    Stripped,
    /// Applicable but optional and unanswered.
    Empty,
    /// Applicable and valid; carries the normalized value.
    Value(Value),
    Errors(Vec<ErrorKind>),
}

fn looks_like_email(raw: &str) -> bool {
    let raw = raw.trim();
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

fn looks_like_phone(raw: &str) -> bool {
    let digits = raw.chars().filter(char::is_ascii_digit).count();
    let allowed = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    allowed && digits >= 9
}

fn values_match(left: &Value, right: &Value) -> bool {
    match (left.as_str(), right.as_str()) {
        (Some(left), Some(right)) => left.trim().eq_ignore_ascii_case(right.trim()),
        _ => left == right,
    }
}
