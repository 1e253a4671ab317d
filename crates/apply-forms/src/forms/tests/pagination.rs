use super::common::*;
use crate::forms::{Locale, Page};

fn step(section: &str, index: usize) -> Page {
    Page::Step {
        section: section.to_string(),
        index,
    }
}

#[test]
fn next_skips_a_step_whose_condition_is_unmet() {
    let definition = form();
    let bound = definition.instantiate(complete_answers(), Locale::En);

    let pagination = bound
        .pagination("your-project", 1)
        .expect("project-country exists");
    // welsh-language (index 2) is skipped for an English project
    assert_eq!(pagination.next, step("your-project", 3));
}

#[test]
fn next_lands_on_a_conditional_step_once_its_condition_holds() {
    let definition = form();
    let bound = definition.instantiate(welsh_answers(), Locale::En);

    let pagination = bound
        .pagination("your-project", 1)
        .expect("project-country exists");
    assert_eq!(pagination.next, step("your-project", 2));
}

#[test]
fn previous_skips_backwards_over_unmet_steps() {
    let definition = form();
    let bound = definition.instantiate(complete_answers(), Locale::En);

    let pagination = bound
        .pagination("your-project", 3)
        .expect("project-dates exists");
    assert_eq!(pagination.previous, Some(step("your-project", 1)));
}

#[test]
fn next_crosses_section_boundaries() {
    let definition = form();
    let bound = definition.instantiate(complete_answers(), Locale::En);

    let pagination = bound
        .pagination("your-project", 4)
        .expect("your-idea exists");
    assert_eq!(pagination.next, step("your-money", 0));
}

#[test]
fn registration_numbers_appear_only_for_registered_types() {
    let definition = form();

    let unregistered = definition.instantiate(complete_answers(), Locale::En);
    let pagination = unregistered
        .pagination("your-organisation", 0)
        .expect("organisation-type exists");
    assert_eq!(pagination.next, step("your-organisation", 2));

    let mut answers = complete_answers();
    set(
        &mut answers,
        "organisationType",
        serde_json::json!("registered-charity"),
    );
    let registered = definition.instantiate(answers, Locale::En);
    let pagination = registered
        .pagination("your-organisation", 0)
        .expect("organisation-type exists");
    assert_eq!(pagination.next, step("your-organisation", 1));
}

#[test]
fn last_step_pages_forward_to_the_summary() {
    let definition = form();
    let bound = definition.instantiate(complete_answers(), Locale::En);

    let pagination = bound
        .pagination("your-details", 2)
        .expect("bank-statement exists");
    assert_eq!(pagination.next, Page::Summary);
}

#[test]
fn first_step_has_no_previous_page() {
    let definition = form();
    let bound = definition.instantiate(complete_answers(), Locale::En);

    let pagination = bound
        .pagination("your-project", 0)
        .expect("project-name exists");
    assert_eq!(pagination.previous, None);
}

#[test]
fn first_page_is_the_first_applicable_step() {
    let definition = form();
    let bound = definition.instantiate(complete_answers(), Locale::En);
    assert_eq!(bound.first_page(), step("your-project", 0));
}

#[test]
fn unknown_positions_yield_no_pagination() {
    let definition = form();
    let bound = definition.instantiate(complete_answers(), Locale::En);
    assert!(bound.pagination("your-project", 99).is_none());
    assert!(bound.pagination("no-such-section", 0).is_none());
}
