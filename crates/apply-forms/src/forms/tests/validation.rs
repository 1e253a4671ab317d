use serde_json::json;

use super::common::*;
use crate::forms::field::{FieldDefinition, FieldKind};
use crate::forms::form::FormDefinition;
use crate::forms::rules::{ErrorKind, Rule};
use crate::forms::section::SectionDefinition;
use crate::forms::step::StepDefinition;
use crate::forms::{FormDefinitionError, Locale};

#[test]
fn complete_answers_validate_cleanly() {
    let definition = form();
    let outcome = definition
        .instantiate(complete_answers(), Locale::En)
        .validate();
    assert!(outcome.messages.is_empty(), "unexpected: {:?}", outcome.messages);
}

#[test]
fn inapplicable_answer_is_stripped_not_validated() {
    let definition = form();
    // English project carrying a stale Welsh-language answer from before the
    // country was changed.
    let mut answers = complete_answers();
    set(&mut answers, "projectLanguage", json!("welsh"));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    assert!(outcome.messages.is_empty());
    assert!(!outcome.value.contains_key("projectLanguage"));
}

#[test]
fn applicable_conditional_field_is_required() {
    let definition = form();
    let mut answers = welsh_answers();
    answers.remove("projectLanguage");

    let outcome = definition.instantiate(answers, Locale::En).validate();
    let message = outcome
        .messages
        .iter()
        .find(|message| message.field == "projectLanguage")
        .expect("language becomes required for wales");
    assert_eq!(message.kind, ErrorKind::Required);
    assert_eq!(message.message, "Select a language");
}

#[test]
fn charity_number_applies_to_both_registered_types() {
    let definition = form();
    for organisation_type in ["registered-charity", "cio"] {
        let mut answers = complete_answers();
        set(&mut answers, "organisationType", json!(organisation_type));

        let outcome = definition.instantiate(answers, Locale::En).validate();
        assert!(
            outcome
                .messages
                .iter()
                .any(|message| message.field == "charityNumber"
                    && message.kind == ErrorKind::Required),
            "charity number should be required for {organisation_type}"
        );
    }
}

#[test]
fn word_count_bounds_are_enforced() {
    let definition = form();
    let mut answers = complete_answers();
    set(&mut answers, "yourIdeaProject", json!("too short"));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    let message = outcome
        .messages
        .iter()
        .find(|message| message.field == "yourIdeaProject")
        .expect("short answer fails");
    assert_eq!(message.kind, ErrorKind::TooFewWords);
    assert_eq!(message.message, "Answer must be at least 50 words");
}

#[test]
fn currency_answers_are_normalized_to_numbers() {
    let definition = form();
    let mut answers = complete_answers();
    set(&mut answers, "projectTotalCost", json!("£5,000"));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    assert!(outcome.messages.is_empty());
    assert_eq!(outcome.value.get("projectTotalCost"), Some(&json!(5000)));
}

#[test]
fn currency_bounds_use_the_normalized_amount() {
    let definition = form();
    let mut answers = complete_answers();
    set(&mut answers, "projectTotalCost", json!("£250"));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    let message = outcome
        .messages
        .iter()
        .find(|message| message.field == "projectTotalCost")
        .expect("amount below the floor fails");
    assert_eq!(message.kind, ErrorKind::BelowMinimum);
}

#[test]
fn component_dates_normalize_to_iso_strings() {
    let definition = form();
    let mut answers = complete_answers();
    set(
        &mut answers,
        "projectStartDate",
        json!({ "day": 1, "month": 10, "year": 2026 }),
    );

    let outcome = definition.instantiate(answers, Locale::En).validate();
    assert!(outcome.messages.is_empty());
    assert_eq!(
        outcome.value.get("projectStartDate"),
        Some(&json!("2026-10-01"))
    );
}

#[test]
fn end_date_must_fall_within_a_year_of_start() {
    let definition = form();
    let mut answers = complete_answers();
    set(&mut answers, "projectEndDate", json!("2028-06-01"));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    let message = outcome
        .messages
        .iter()
        .find(|message| message.field == "projectEndDate")
        .expect("out-of-window date fails");
    assert_eq!(message.kind, ErrorKind::OutsideDateWindow);
    assert_eq!(
        message.message,
        "Your project must finish within 12 months of starting"
    );
}

#[test]
fn main_contact_must_differ_from_senior_contact() {
    let definition = form();
    let mut answers = complete_answers();
    set(&mut answers, "mainContactName", json!("  SAM PRICE "));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    assert!(outcome
        .messages
        .iter()
        .any(|message| message.field == "mainContactName"
            && message.kind == ErrorKind::MatchesOtherField));
}

#[test]
fn welsh_copy_is_used_when_present_and_falls_back_otherwise() {
    let definition = form();
    let mut answers = complete_answers();
    answers.remove("projectCountry");
    answers.remove("projectEndDate");

    let outcome = definition.instantiate(answers, Locale::Cy).validate();
    let country = outcome
        .messages
        .iter()
        .find(|message| message.field == "projectCountry")
        .expect("country is required");
    assert_eq!(country.message, "Dewiswch wlad");

    // No Welsh copy is registered for the end date, so the English copy wins.
    let end_date = outcome
        .messages
        .iter()
        .find(|message| message.field == "projectEndDate")
        .expect("end date is required");
    assert_eq!(end_date.message, "Enter a project end date");
}

#[test]
fn text_answers_are_trimmed_on_output() {
    let definition = form();
    let mut answers = complete_answers();
    set(&mut answers, "projectName", json!("  Community Garden  "));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    assert_eq!(
        outcome.value.get("projectName"),
        Some(&json!("Community Garden"))
    );
}

#[test]
fn building_a_field_without_a_name_fails() {
    match FieldDefinition::new(" ", "A label", FieldKind::Text) {
        Err(FormDefinitionError::MissingFieldName) => {}
        other => panic!("expected missing-name error, got {other:?}"),
    }
}

#[test]
fn building_a_choice_field_without_options_fails() {
    let field = FieldDefinition::new("colour", "Pick a colour", FieldKind::Radio)
        .expect("name and label are present");
    let result = FormDefinition::new(
        "test-form",
        "Test form",
        1,
        vec![SectionDefinition::new(
            "only",
            "Only section",
            vec![StepDefinition::new("only", "Only step", vec![field])],
        )],
    );
    match result {
        Err(FormDefinitionError::EmptyOptions { field }) => assert_eq!(field, "colour"),
        other => panic!("expected empty-options error, got {other:?}"),
    }
}

#[test]
fn duplicate_field_names_are_rejected() {
    let first = FieldDefinition::new("amount", "Amount", FieldKind::Number).expect("valid");
    let second = FieldDefinition::new("amount", "Amount again", FieldKind::Number).expect("valid");
    let result = FormDefinition::new(
        "test-form",
        "Test form",
        1,
        vec![SectionDefinition::new(
            "only",
            "Only section",
            vec![
                StepDefinition::new("one", "Step one", vec![first]),
                StepDefinition::new("two", "Step two", vec![second]),
            ],
        )],
    );
    match result {
        Err(FormDefinitionError::DuplicateFieldName { field }) => assert_eq!(field, "amount"),
        other => panic!("expected duplicate-name error, got {other:?}"),
    }
}

#[test]
fn unknown_radio_answer_is_rejected() {
    let definition = form();
    let mut answers = complete_answers();
    set(&mut answers, "organisationType", json!("plc"));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    assert!(outcome
        .messages
        .iter()
        .any(|message| message.field == "organisationType"
            && message.kind == ErrorKind::NotAnOption));
}

fn aims_form() -> FormDefinition {
    let aims = FieldDefinition::new("projectAims", "Project aims", FieldKind::Checkbox)
        .expect("valid")
        .with_options(&["community", "environment", "heritage"])
        .required();
    let priorities = FieldDefinition::new("priorityAims", "Priority aims", FieldKind::Checkbox)
        .expect("valid")
        .with_options(&["community", "environment", "heritage"])
        .with_rule(Rule::SubsetOfField("projectAims".to_string()));
    let headline = FieldDefinition::new("headlineAim", "Headline aim", FieldKind::Text)
        .expect("valid")
        .with_rule(Rule::SubsetOfField("projectAims".to_string()));
    FormDefinition::new(
        "test-form",
        "Test form",
        1,
        vec![SectionDefinition::new(
            "only",
            "Only section",
            vec![StepDefinition::new(
                "only",
                "Only step",
                vec![aims, priorities, headline],
            )],
        )],
    )
    .expect("valid definition")
}

#[test]
fn selected_values_must_come_from_the_sibling_field() {
    let definition = aims_form();
    let mut answers = crate::forms::AnswerSet::new();
    set(&mut answers, "projectAims", json!(["community", "heritage"]));
    set(&mut answers, "priorityAims", json!(["heritage"]));
    set(&mut answers, "headlineAim", json!("community"));

    let outcome = definition.instantiate(answers.clone(), Locale::En).validate();
    assert!(outcome.messages.is_empty(), "unexpected: {:?}", outcome.messages);

    // "environment" is an option on the field, but the applicant never chose it
    set(&mut answers, "priorityAims", json!(["heritage", "environment"]));
    set(&mut answers, "headlineAim", json!("environment"));
    let outcome = definition.instantiate(answers, Locale::En).validate();
    for field in ["priorityAims", "headlineAim"] {
        assert!(
            outcome
                .messages
                .iter()
                .any(|message| message.field == field && message.kind == ErrorKind::NotInField),
            "{field} should be rejected"
        );
    }
}

#[test]
fn a_subset_rule_fails_when_the_sibling_list_is_unanswered() {
    let definition = aims_form();
    let mut answers = crate::forms::AnswerSet::new();
    set(&mut answers, "headlineAim", json!("community"));

    let outcome = definition.instantiate(answers, Locale::En).validate();
    assert!(outcome
        .messages
        .iter()
        .any(|message| message.field == "headlineAim" && message.kind == ErrorKind::NotInField));
}

#[test]
fn optional_rule_is_exercised_only_when_answered() {
    let optional = FieldDefinition::new("nickname", "Nickname", FieldKind::Text)
        .expect("valid")
        .with_rule(Rule::MaxLength(5));
    let definition = FormDefinition::new(
        "test-form",
        "Test form",
        1,
        vec![SectionDefinition::new(
            "only",
            "Only section",
            vec![StepDefinition::new("only", "Only step", vec![optional])],
        )],
    )
    .expect("valid definition");

    let empty = definition
        .instantiate(crate::forms::AnswerSet::new(), Locale::En)
        .validate();
    assert!(empty.messages.is_empty());

    let mut answers = crate::forms::AnswerSet::new();
    set(&mut answers, "nickname", json!("far too long"));
    let answered = definition.instantiate(answers, Locale::En).validate();
    assert!(answered
        .messages
        .iter()
        .any(|message| message.kind == ErrorKind::TooLong));
}
