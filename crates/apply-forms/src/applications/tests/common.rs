use std::sync::{Arc, Mutex};

use axum::Router;
use serde_json::{json, Value};

use crate::applications::domain::UserId;
use crate::applications::memory::{
    InMemoryEmailQueue, InMemoryPendingStore, InMemorySubmittedStore,
};
use crate::applications::router::{application_router, ApplicationRouterState};
use crate::applications::service::ApplicationService;
use crate::forms::definitions::registry;
use crate::forms::{AnswerSet, FormRegistry};
use crate::submission::{
    CrmAttachment, CrmClient, CrmError, CrmHealth, CrmReference, ExportedApplication, FileStorage,
    ScanError, ScanVerdict, StorageError, SubmissionPipeline, VirusScanner,
};

pub(super) const LIFETIME_DAYS: i64 = 90;

pub(super) fn shared_registry() -> Arc<FormRegistry> {
    Arc::new(registry().expect("bundled definitions are well formed"))
}

pub(super) fn user() -> UserId {
    UserId::new("user-1")
}

pub(super) fn other_user() -> UserId {
    UserId::new("user-2")
}

pub(super) fn build_service() -> (
    Arc<ApplicationService<InMemoryPendingStore>>,
    Arc<InMemoryPendingStore>,
) {
    let store = Arc::new(InMemoryPendingStore::new());
    let service = Arc::new(ApplicationService::new(
        store.clone(),
        shared_registry(),
        LIFETIME_DAYS,
    ));
    (service, store)
}

/// CRM stub counting submit calls, so idempotency tests can assert the
/// external system was contacted exactly once.
#[derive(Default)]
pub(super) struct RecordingCrm {
    pub submits: Mutex<u32>,
    pub fail_submit: bool,
}

impl CrmClient for RecordingCrm {
    fn authorize(&self) -> Result<String, CrmError> {
        Ok("token".to_string())
    }

    fn submit(
        &self,
        _token: &str,
        _record: &ExportedApplication,
    ) -> Result<CrmReference, CrmError> {
        let mut submits = self.submits.lock().expect("crm mutex poisoned");
        *submits += 1;
        if self.fail_submit {
            return Err(CrmError::Unavailable("down for maintenance".to_string()));
        }
        Ok(CrmReference(format!("CRM-{submits}")))
    }

    fn attach(
        &self,
        _token: &str,
        _reference: &CrmReference,
        _attachment: &CrmAttachment,
    ) -> Result<(), CrmError> {
        Ok(())
    }

    fn health_status(&self) -> Result<CrmHealth, CrmError> {
        Ok(CrmHealth {
            status: "ok".to_string(),
        })
    }
}

pub(super) struct StubFiles;

impl FileStorage for StubFiles {
    fn upload(&self, _key: &str, _bytes: &[u8], _content_type: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn get(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
        Ok(b"statement bytes".to_vec())
    }
}

pub(super) struct CleanScanner;

impl VirusScanner for CleanScanner {
    fn scan(&self, _key: &str, _bytes: &[u8]) -> Result<ScanVerdict, ScanError> {
        Ok(ScanVerdict { is_infected: false })
    }
}

#[allow(dead_code)]
pub(super) struct TestHarness {
    pub router: Router,
    pub service: Arc<ApplicationService<InMemoryPendingStore>>,
    pub store: Arc<InMemoryPendingStore>,
    pub submitted: Arc<InMemorySubmittedStore>,
    pub crm: Arc<RecordingCrm>,
    pub queue: Arc<InMemoryEmailQueue>,
}

pub(super) fn harness() -> TestHarness {
    let registry = shared_registry();
    let store = Arc::new(InMemoryPendingStore::new());
    let submitted = Arc::new(InMemorySubmittedStore::new());
    let crm = Arc::new(RecordingCrm::default());
    let queue = Arc::new(InMemoryEmailQueue::new());

    let service = Arc::new(ApplicationService::new(
        store.clone(),
        registry.clone(),
        LIFETIME_DAYS,
    ));
    let pipeline = Arc::new(SubmissionPipeline::new(
        store.clone(),
        submitted.clone(),
        crm.clone(),
        Arc::new(StubFiles),
        Arc::new(CleanScanner),
        registry,
        "test",
    ));

    let router = application_router(ApplicationRouterState {
        service: service.clone(),
        pipeline,
    });

    TestHarness {
        router,
        service,
        store,
        submitted,
        crm,
        queue,
    }
}

pub(super) fn set(answers: &mut AnswerSet, field: &str, value: Value) {
    answers.insert(field.to_string(), value);
}

/// A fully valid answer-set for an English unregistered group.
pub(super) fn complete_answers() -> AnswerSet {
    let mut answers = AnswerSet::new();
    set(&mut answers, "projectName", json!("Community Garden"));
    set(&mut answers, "projectCountry", json!("england"));
    set(&mut answers, "projectStartDate", json!("2026-10-01"));
    set(&mut answers, "projectEndDate", json!("2027-03-01"));
    set(
        &mut answers,
        "yourIdeaProject",
        json!("community ".repeat(60).trim_end()),
    );
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
