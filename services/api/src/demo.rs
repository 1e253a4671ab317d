//! Console walk-through of one application: start it, answer every step,
//! trigger a reminder tick, then submit twice to show the replayed receipt.

use std::sync::Arc;

use apply_forms::applications::{
    ApplicationService, InMemoryEmailQueue, InMemoryPendingStore, InMemorySubmittedStore, UserId,
};
use apply_forms::error::AppError;
use apply_forms::expiry::{ExpiryScheduler, JwtTokenSigner};
use apply_forms::forms::definitions::{registry, AWARDS_FOR_ALL_FORM_ID};
use apply_forms::forms::{AnswerSet, FormId, Locale, Page};
use apply_forms::submission::SubmissionPipeline;
use chrono::{Duration, Utc};
use clap::Args;
use serde_json::{json, Value};

use crate::infra::{
    ConsoleEmailTransport, InMemoryFileStorage, LocalCrmClient, PassthroughScanner,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Base the demo application in Wales to show the bilingual path
    #[arg(long)]
    pub(crate) wales: bool,
}

fn answers(pairs: &[(&str, Value)]) -> AnswerSet {
    pairs
        .iter()
        .map(|(field, value)| (field.to_string(), value.clone()))
        .collect()
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let registry = Arc::new(registry().map_err(|err| {
        AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?);
    let pending = Arc::new(InMemoryPendingStore::new());
    let submitted = Arc::new(InMemorySubmittedStore::new());
    let queue = Arc::new(InMemoryEmailQueue::new());
    let signer = Arc::new(JwtTokenSigner::new("demo-secret"));

    let service = ApplicationService::new(pending.clone(), registry.clone(), 90);
    let pipeline = SubmissionPipeline::new(
        pending.clone(),
        submitted,
        Arc::new(LocalCrmClient::default()),
        Arc::new(InMemoryFileStorage::default()),
        Arc::new(PassthroughScanner),
        registry,
        "demo",
    );
    let scheduler = ExpiryScheduler::new(
        pending,
        queue,
        Arc::new(ConsoleEmailTransport),
        signer,
        30,
        "http://localhost:3000",
    );

    let user = UserId::new("demo-user");
    let now = Utc::now();
    let country = if args.wales { "wales" } else { "england" };

    println!("Grant application demo ({country})");
    let application = service
        .start(user.clone(), FormId::new(AWARDS_FOR_ALL_FORM_ID), now)
        .map_err(demo_failure)?;
    println!("- started application {}", application.id);

    let mut steps: Vec<(&str, usize, AnswerSet)> = vec![
        (
            "your-project",
            0,
            answers(&[("projectName", json!("Riverbank Tidy-Up"))]),
        ),
        (
            "your-project",
            1,
            answers(&[("projectCountry", json!(country))]),
        ),
        (
            "your-project",
            3,
            answers(&[
                ("projectStartDate", json!("2026-10-01")),
                ("projectEndDate", json!("2027-03-01")),
            ]),
        ),
        (
            "your-project",
            4,
            answers(&[("yourIdeaProject", json!("tidy ".repeat(60).trim_end()))]),
        ),
        (
            "your-money",
            0,
            answers(&[("projectTotalCost", json!("£9,500"))]),
        ),
        (
            "your-organisation",
            0,
            answers(&[("organisationType", json!("unregistered-vco"))]),
        ),
        (
            "your-organisation",
            2,
            answers(&[(
                "organisationAddress",
                json!({ "line1": "12 Mill Road", "townCity": "Leeds", "postcode": "LS1 4AB" }),
            )]),
        ),
        (
            "your-details",
            0,
            answers(&[
                ("seniorContactName", json!("Sam Price")),
                ("seniorContactRole", json!("trustee")),
            ]),
        ),
        (
            "your-details",
            1,
            answers(&[
                ("mainContactName", json!("Alex Morgan")),
                ("mainContactEmail", json!("alex@example.org")),
                ("mainContactPhone", json!("0161 496 0000")),
            ]),
        ),
        (
            "your-details",
            2,
            answers(&[(
                "bankStatement",
                json!({ "filename": "statement.pdf", "contentType": "application/pdf" }),
            )]),
        ),
    ];
    if args.wales {
        steps.insert(
            2,
            (
                "your-project",
                2,
                answers(&[("projectLanguage", json!("both"))]),
            ),
        );
    }

    for (section, index, step_answers) in steps {
        let outcome = service
            .save_step(
                &user,
                &application.id,
                section,
                index,
                &step_answers,
                Locale::En,
                Utc::now(),
            )
            .map_err(demo_failure)?;
        let next = match &outcome.next {
            Page::Step { section, index } => format!("{section}/{index}"),
            Page::Summary => "summary".to_string(),
        };
        println!(
            "- saved {section}/{index}: {}/{} steps complete, next {next}",
            outcome.progress.complete_steps, outcome.progress.applicable_steps
        );
    }

    // a tick close to expiry queues and delivers one reminder
    let tick = scheduler
        .tick(now + Duration::days(85))
        .map_err(demo_failure)?;
    for entry in &tick.email_queue {
        println!("- reminder {} is {}", entry.email_type, entry.status);
    }

    let receipt = pipeline
        .submit(&user, &application.id, Utc::now())
        .map_err(demo_failure)?;
    println!(
        "- submitted, reference {}",
        receipt.crm_reference.as_deref().unwrap_or("none")
    );
    let replay = pipeline
        .submit(&user, &application.id, Utc::now())
        .map_err(demo_failure)?;
    println!(
        "- second submit replayed the receipt (already_submitted = {})",
        replay.already_submitted
    );

    Ok(())
}

fn demo_failure(err: impl std::error::Error + Send + Sync + 'static) -> AppError {
    AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
}
