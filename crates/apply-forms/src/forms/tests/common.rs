use serde_json::{json, Value};

use crate::forms::definitions::awards_for_all;
use crate::forms::form::FormDefinition;
use crate::forms::AnswerSet;

pub(super) fn form() -> FormDefinition {
    awards_for_all().expect("definition is well formed")
}

pub(super) fn project_idea() -> String {
    "community ".repeat(60).trim_end().to_string()
}

/// A fully valid answer-set for an English unregistered group, which skips
/// both conditional steps.
pub(super) fn complete_answers() -> AnswerSet {
    let mut answers = AnswerSet::new();
    set(&mut answers, "projectName", json!("Community Garden"));
    set(&mut answers, "projectCountry", json!("england"));
    set(&mut answers, "projectStartDate", json!("2026-10-01"));
    set(&mut answers, "projectEndDate", json!("2027-03-01"));
    set(&mut answers, "yourIdeaProject", json!(project_idea()));
    set(&mut answers, "projectTotalCost", json!(5000));
    set(&mut answers, "organisationType", json!("unregistered-vco"));
    set(
        &mut answers,
        "organisationAddress",
        json!({
            "line1": "1 Plough Lane",
            "townCity": "Sheffield",
            "postcode": "S1 2AB",
        }),
    );
    set(&mut answers, "seniorContactName", json!("Sam Price"));
    set(&mut answers, "seniorContactRole", json!("chair"));
    set(&mut answers, "mainContactName", json!("Alex Morgan"));
    set(&mut answers, "mainContactEmail", json!("alex@example.org"));
    set(&mut answers, "mainContactPhone", json!("0161 496 0000"));
    set(
        &mut answers,
        "bankStatement",
        json!({ "filename": "statement.pdf", "contentType": "application/pdf" }),
    );
    answers
}

/// The English answer-set rebased to Wales, with the extra applicable fields
/// filled in.
pub(super) fn welsh_answers() -> AnswerSet {
    let mut answers = complete_answers();
    set(&mut answers, "projectCountry", json!("wales"));
    set(&mut answers, "projectLanguage", json!("both"));
    answers
}

pub(super) fn set(answers: &mut AnswerSet, field: &str, value: Value) {
    answers.insert(field.to_string(), value);
}
