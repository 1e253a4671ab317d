//! Small-grants application ("Awards for All" style): four sections, with a
//! Welsh-language step that only applies to projects in Wales and
//! registration numbers that only apply to registered organisation types.

use crate::forms::field::{FieldDefinition, FieldKind};
use crate::forms::form::FormDefinition;
use crate::forms::rules::{ErrorKind, Rule};
use crate::forms::section::SectionDefinition;
use crate::forms::step::{StepCondition, StepDefinition};
use crate::forms::FormDefinitionError;

pub const AWARDS_FOR_ALL_FORM_ID: &str = "awards-for-all";

pub fn awards_for_all() -> Result<FormDefinition, FormDefinitionError> {
    FormDefinition::new(
        AWARDS_FOR_ALL_FORM_ID,
        "National Lottery Awards for All",
        3,
        vec![
            your_project()?,
            your_money()?,
            your_organisation()?,
            your_details()?,
        ],
    )
}

fn your_project() -> Result<SectionDefinition, FormDefinitionError> {
    let project_name = FieldDefinition::new("projectName", "What is the name of your project?", FieldKind::Text)?
        .required()
        .with_hint("The project name should be simple and to the point")
        .with_rule(Rule::MaxLength(80))
        .with_message(ErrorKind::Required, "Enter a project name", Some("Rhowch enw eich prosiect"))
        .with_message(ErrorKind::TooLong, "Project name must be 80 characters or less", None);

    let project_country = FieldDefinition::new(
        "projectCountry",
        "What country will your project be based in?",
        FieldKind::Radio,
    )?
    .required()
    .with_options(&["england", "northern-ireland", "scotland", "wales"])
    .with_message(ErrorKind::Required, "Select a country", Some("Dewiswch wlad"))
    .with_message(ErrorKind::NotAnOption, "Select a country from the list", None);

    let project_language = FieldDefinition::new(
        "projectLanguage",
        "In which language will your project run?",
        FieldKind::Radio,
    )?
    .required()
    .with_options(&["english", "welsh", "both"])
    .with_rule(Rule::when("projectCountry", "wales", Rule::Any))
    .with_message(ErrorKind::Required, "Select a language", Some("Dewiswch iaith"));

    let start_date = FieldDefinition::new(
        "projectStartDate",
        "When would you like to start your project?",
        FieldKind::Date,
    )?
    .required()
    .with_message(ErrorKind::Required, "Enter a project start date", None)
    .with_message(ErrorKind::InvalidDate, "Enter a real date", None);

    let end_date = FieldDefinition::new(
        "projectEndDate",
        "When would you like to finish your project?",
        FieldKind::Date,
    )?
    .required()
    .with_rule(Rule::WithinDaysOf {
        field: "projectStartDate".to_string(),
        days: 365,
    })
    .with_message(ErrorKind::Required, "Enter a project end date", None)
    .with_message(
        ErrorKind::OutsideDateWindow,
        "Your project must finish within 12 months of starting",
        None,
    );

    let your_idea = FieldDefinition::new(
        "yourIdeaProject",
        "What would you like to do?",
        FieldKind::Textarea,
    )?
    .required()
    .with_hint("Tell us about your project and who will benefit from it")
    .with_rule(Rule::All(vec![Rule::MinWords(50), Rule::MaxWords(300)]))
    .with_message(ErrorKind::Required, "Tell us about your project", None)
    .with_message(ErrorKind::TooFewWords, "Answer must be at least 50 words", None)
    .with_message(ErrorKind::TooManyWords, "Answer must be no more than 300 words", None);

    Ok(SectionDefinition::new(
        "your-project",
        "Your project",
        vec![
            StepDefinition::new("project-name", "Project name", vec![project_name]),
            StepDefinition::new("project-country", "Project country", vec![project_country]),
            StepDefinition::new("welsh-language", "Welsh language", vec![project_language])
                .with_condition(StepCondition::equals("projectCountry", "wales")),
            StepDefinition::new("project-dates", "Project dates", vec![start_date, end_date]),
            StepDefinition::new("your-idea", "Your idea", vec![your_idea]),
        ],
    ))
}

fn your_money() -> Result<SectionDefinition, FormDefinitionError> {
    let total_cost = FieldDefinition::new(
        "projectTotalCost",
        "How much money are you asking for?",
        FieldKind::Currency,
    )?
    .required()
    .with_hint("You can ask for between £300 and £10,000")
    .with_rule(Rule::All(vec![Rule::MinAmount(300), Rule::MaxAmount(10_000)]))
    .with_message(ErrorKind::Required, "Enter the amount you are asking for", None)
    .with_message(ErrorKind::NotANumber, "Enter an amount using numbers only", None)
    .with_message(ErrorKind::BelowMinimum, "The amount must be at least £300", None)
    .with_message(ErrorKind::AboveMaximum, "The amount must be no more than £10,000", None);

    Ok(SectionDefinition::new(
        "your-money",
        "Your money",
        vec![StepDefinition::new(
            "project-costs",
            "Project costs",
            vec![total_cost],
        )],
    ))
}

fn your_organisation() -> Result<SectionDefinition, FormDefinitionError> {
    let organisation_type = FieldDefinition::new(
        "organisationType",
        "What type of organisation are you?",
        FieldKind::Radio,
    )?
    .required()
    .with_options(&[
        "unregistered-vco",
        "registered-charity",
        "cio",
        "school",
        "statutory-body",
    ])
    .with_message(ErrorKind::Required, "Select an organisation type", None);

    // Applies to both registered-charity and CIO; strips for everyone else,
    // in lockstep with the step condition below.
    let charity_number = FieldDefinition::new(
        "charityNumber",
        "What is your charity registration number?",
        FieldKind::Text,
    )?
    .required()
    .with_rule(Rule::when_else(
        "organisationType",
        "registered-charity",
        Rule::MaxLength(10),
        Rule::when("organisationType", "cio", Rule::MaxLength(10)),
    ))
    .with_message(ErrorKind::Required, "Enter your charity number", None);

    let organisation_address = FieldDefinition::new(
        "organisationAddress",
        "What is the main address of your organisation?",
        FieldKind::Address,
    )?
    .required()
    .with_message(ErrorKind::Required, "Enter your organisation's address", None)
    .with_message(
        ErrorKind::IncompleteAddress,
        "Enter a full address including postcode",
        None,
    );

    Ok(SectionDefinition::new(
        "your-organisation",
        "Your organisation",
        vec![
            StepDefinition::new(
                "organisation-type",
                "Organisation type",
                vec![organisation_type],
            ),
            StepDefinition::new(
                "registration-numbers",
                "Registration numbers",
                vec![charity_number],
            )
            .with_condition(StepCondition::AnyOf(vec![
                StepCondition::equals("organisationType", "registered-charity"),
                StepCondition::equals("organisationType", "cio"),
            ])),
            StepDefinition::new(
                "organisation-address",
                "Organisation address",
                vec![organisation_address],
            ),
        ],
    ))
}

fn your_details() -> Result<SectionDefinition, FormDefinitionError> {
    let senior_name = FieldDefinition::new(
        "seniorContactName",
        "Senior contact full name",
        FieldKind::Text,
    )?
    .required()
    .with_message(ErrorKind::Required, "Enter the senior contact's name", None);

    let senior_role = FieldDefinition::new(
        "seniorContactRole",
        "Senior contact role",
        FieldKind::Radio,
    )?
    .required()
    .with_options(&["trustee", "chair", "vice-chair", "treasurer", "secretary"])
    .with_message(ErrorKind::Required, "Select the senior contact's role", None);

    let main_name = FieldDefinition::new(
        "mainContactName",
        "Main contact full name",
        FieldKind::Text,
    )?
    .required()
    .with_rule(Rule::DiffersFrom("seniorContactName".to_string()))
    .with_message(ErrorKind::Required, "Enter the main contact's name", None)
    .with_message(
        ErrorKind::MatchesOtherField,
        "The main contact must be a different person from the senior contact",
        None,
    );

    let main_email = FieldDefinition::new(
        "mainContactEmail",
        "Main contact email address",
        FieldKind::Email,
    )?
    .required()
    .with_message(ErrorKind::Required, "Enter the main contact's email address", None)
    .with_message(ErrorKind::InvalidEmail, "Enter an email address in the correct format", None);

    let main_phone = FieldDefinition::new(
        "mainContactPhone",
        "Main contact telephone number",
        FieldKind::Phone,
    )?
    .required()
    .with_message(ErrorKind::Required, "Enter the main contact's phone number", None)
    .with_message(ErrorKind::InvalidPhone, "Enter a real telephone number", None);

    let bank_statement = FieldDefinition::new(
        "bankStatement",
        "Upload a recent bank statement",
        FieldKind::File,
    )?
    .required()
    .with_message(ErrorKind::Required, "Upload a bank statement", None)
    .with_message(ErrorKind::MissingFile, "Upload a bank statement", None);

    Ok(SectionDefinition::new(
        "your-details",
        "Your details",
        vec![
            StepDefinition::new(
                "senior-contact",
                "Senior contact",
                vec![senior_name, senior_role],
            )
            .with_pre_flight("senior-contact-role"),
            StepDefinition::new(
                "main-contact",
                "Main contact",
                vec![main_name, main_email, main_phone],
            ),
            StepDefinition::new("bank-statement", "Bank statement", vec![bank_statement]),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_builds() {
        let form = awards_for_all().expect("definition is well formed");
        assert_eq!(form.id.0, AWARDS_FOR_ALL_FORM_ID);
        assert_eq!(form.sections.len(), 4);
    }

    #[test]
    fn skippable_steps_strip_in_lockstep_with_their_fields() {
        let form = awards_for_all().expect("definition is well formed");
        let issues = form.check_consistency();
        assert!(issues.is_empty(), "definition drift: {issues:?}");
    }
}
