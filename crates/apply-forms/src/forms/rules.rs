//! Conditional validation rules as data.
//!
//! A field's rule is a tree evaluated against the *entire* current
//! answer-set. `When` branches on a sibling answer and commonly falls back to
//! `Strip`, which marks the field inapplicable: its value is discarded from
//! validated output even when present. Keeping the rules as data means the
//! strip-when-inapplicable invariant is enforced in one interpreter rather
//! than in per-field branching code.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Locale;

/// The raw answer mapping: field name to current value. Values may be
/// strings, numbers, arrays (checkboxes) or objects (date/address/file).
pub type AnswerSet = BTreeMap<String, Value>;

/// Validation rule tree for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rule {
    /// No constraint beyond the field kind's own checks.
    Any,
    /// Field does not apply; any present value is discarded.
    Strip,
    MinWords(usize),
    MaxWords(usize),
    MaxLength(usize),
    MinAmount(i64),
    MaxAmount(i64),
    /// Value must differ from another field's value (case-insensitive for strings).
    DiffersFrom(String),
    /// Every selected value must be among another field's selected options.
    SubsetOfField(String),
    /// Date value must fall within `days` of another field's date value.
    WithinDaysOf { field: String, days: i64 },
    All(Vec<Rule>),
    When {
        field: String,
        is: Value,
        then: Box<Rule>,
        otherwise: Box<Rule>,
    },
}

impl Rule {
    /// `when(field == is, then)`, stripping the field otherwise.
    pub fn when(field: &str, is: impl Into<Value>, then: Rule) -> Rule {
        Rule::when_else(field, is, then, Rule::Strip)
    }

    pub fn when_else(field: &str, is: impl Into<Value>, then: Rule, otherwise: Rule) -> Rule {
        Rule::When {
            field: field.to_string(),
            is: is.into(),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }
}

/// Outcome of resolving a rule tree against an answer-set: either the flat
/// list of applicable leaf constraints, or "strip this field".
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Applicable(Vec<Rule>),
    Strip,
}

pub fn resolve(rule: &Rule, answers: &AnswerSet) -> Resolution {
    let mut leaves = Vec::new();
    if collect(rule, answers, &mut leaves) {
        Resolution::Applicable(leaves)
    } else {
        Resolution::Strip
    }
}

fn collect(rule: &Rule, answers: &AnswerSet, out: &mut Vec<Rule>) -> bool {
    match rule {
        Rule::Strip => false,
        Rule::Any => true,
        Rule::All(rules) => {
            for nested in rules {
                if !collect(nested, answers, out) {
                    return false;
                }
            }
            true
        }
        Rule::When {
            field,
            is,
            then,
            otherwise,
        } => {
            if gate_matches(answers.get(field.as_str()), is) {
                collect(then, answers, out)
            } else {
                collect(otherwise, answers, out)
            }
        }
        leaf => {
            out.push(leaf.clone());
            true
        }
    }
}

/// A gate matches when the stored answer equals the expected value, or, for
/// checkbox-style array answers, contains it.
pub(crate) fn gate_matches(current: Option<&Value>, expected: &Value) -> bool {
    match current {
        None => false,
        Some(Value::Array(items)) => items.iter().any(|item| item == expected),
        Some(value) => value == expected,
    }
}

/// Error kinds a field validation can produce. Localized copy is looked up
/// on the field's message table; these are the stable keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Required,
    InvalidValue,
    InvalidEmail,
    InvalidPhone,
    NotANumber,
    BelowMinimum,
    AboveMaximum,
    TooFewWords,
    TooManyWords,
    TooLong,
    NotAnOption,
    NotInField,
    MatchesOtherField,
    InvalidDate,
    OutsideDateWindow,
    IncompleteAddress,
    MissingFile,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Required => "required",
            ErrorKind::InvalidValue => "invalid_value",
            ErrorKind::InvalidEmail => "invalid_email",
            ErrorKind::InvalidPhone => "invalid_phone",
            ErrorKind::NotANumber => "not_a_number",
            ErrorKind::BelowMinimum => "below_minimum",
            ErrorKind::AboveMaximum => "above_maximum",
            ErrorKind::TooFewWords => "too_few_words",
            ErrorKind::TooManyWords => "too_many_words",
            ErrorKind::TooLong => "too_long",
            ErrorKind::NotAnOption => "not_an_option",
            ErrorKind::NotInField => "not_in_field",
            ErrorKind::MatchesOtherField => "matches_other_field",
            ErrorKind::InvalidDate => "invalid_date",
            ErrorKind::OutsideDateWindow => "outside_date_window",
            ErrorKind::IncompleteAddress => "incomplete_address",
            ErrorKind::MissingFile => "missing_file",
        }
    }

    /// Generic copy used when a field defines no message for this kind.
    pub const fn fallback(self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => "Enter a value",
            Locale::Cy => "Rhowch werth",
        }
    }
}

/// Whitespace-delimited token count, not characters.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalize "friendly" numeric input (thousands separators, currency signs,
/// surrounding whitespace) before range checks.
pub fn normalize_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => {
            let cleaned: String = raw
                .chars()
                .filter(|c| !matches!(c, ',' | ' ' | '£'))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse::<i64>().ok()
            }
        }
        _ => None,
    }
}

/// Accepts ISO `YYYY-MM-DD` strings or composite `{day, month, year}` objects.
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok(),
        Value::Object(map) => {
            let year = map.get("year")?.as_i64()?;
            let month = map.get("month")?.as_i64()?;
            let day = map.get("day")?.as_i64()?;
            NaiveDate::from_ymd_opt(
                i32::try_from(year).ok()?,
                u32::try_from(month).ok()?,
                u32::try_from(day).ok()?,
            )
        }
        _ => None,
    }
}

/// Missing, null, blank-string and empty-array answers all count as empty.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(raw)) => raw.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}
