use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::router::{scheduler_router, SchedulerRouterState};
use super::unsubscribe::{cancel_reminders, JwtTokenSigner, TokenError, UnsubscribeError};
use super::{
    email_type_for, expiry_state, Delivery, EmailMessage, EmailTransport, ExpiryScheduler,
    ExpiryState, ReminderOffset, TokenSigner, TransportError, UNSUBSCRIBE_ACTION,
};
use crate::applications::domain::{EmailStatus, PendingApplication, UserId};
use crate::applications::memory::{InMemoryEmailQueue, InMemoryPendingStore};
use crate::applications::store::{EmailQueueStore, PendingApplicationStore};
use crate::forms::{AnswerSet, FormId};

const SECRET: &str = "scheduler-secret";

struct RecordingTransport {
    sent: Mutex<Vec<EmailMessage>>,
    deliver: Mutex<bool>,
}

impl RecordingTransport {
    fn new(deliver: bool) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            deliver: Mutex::new(deliver),
        }
    }

    fn set_delivering(&self, deliver: bool) {
        *self.deliver.lock().expect("transport mutex poisoned") = deliver;
    }

    fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("transport mutex poisoned").clone()
    }
}

impl EmailTransport for RecordingTransport {
    fn send(&self, message: &EmailMessage) -> Result<Delivery, TransportError> {
        let delivered = *self.deliver.lock().expect("transport mutex poisoned");
        if delivered {
            self.sent
                .lock()
                .expect("transport mutex poisoned")
                .push(message.clone());
        }
        Ok(Delivery { delivered })
    }
}

struct Fixture {
    pending: Arc<InMemoryPendingStore>,
    queue: Arc<InMemoryEmailQueue>,
    transport: Arc<RecordingTransport>,
    signer: Arc<JwtTokenSigner>,
    scheduler: Arc<ExpiryScheduler<InMemoryPendingStore>>,
}

fn fixture() -> Fixture {
    let pending = Arc::new(InMemoryPendingStore::new());
    let queue = Arc::new(InMemoryEmailQueue::new());
    let transport = Arc::new(RecordingTransport::new(true));
    let signer = Arc::new(JwtTokenSigner::new("unsubscribe-secret"));
    let scheduler = Arc::new(ExpiryScheduler::new(
        pending.clone(),
        queue.clone(),
        transport.clone(),
        signer.clone(),
        30,
        "https://apply.example.org/",
    ));
    Fixture {
        pending,
        queue,
        transport,
        signer,
        scheduler,
    }
}

fn application_expiring_in(
    pending: &InMemoryPendingStore,
    days: i64,
    country: &str,
) -> PendingApplication {
    let now = Utc::now();
    let mut application = PendingApplication::new(
        UserId::new("user-1"),
        FormId::new("awards-for-all"),
        now,
        now + Duration::days(days),
    );
    let mut answers = AnswerSet::new();
    answers.insert("mainContactEmail".to_string(), json!("alex@example.org"));
    answers.insert("projectCountry".to_string(), json!(country));
    application.application_data = answers;
    pending.create(application).expect("seed created")
}

#[test]
fn expiry_takes_precedence_over_reminders() {
    let now = Utc::now();
    assert_eq!(expiry_state(now, now), ExpiryState::Expired);
    assert_eq!(
        expiry_state(now, now - Duration::days(2)),
        ExpiryState::Expired
    );
}

#[test]
fn the_nearest_crossed_offset_wins() {
    let now = Utc::now();
    assert_eq!(
        expiry_state(now, now + Duration::hours(12)),
        ExpiryState::ReminderDue(ReminderOffset::OneDay)
    );
    assert_eq!(
        expiry_state(now, now + Duration::days(5)),
        ExpiryState::ReminderDue(ReminderOffset::OneWeek)
    );
    assert_eq!(
        expiry_state(now, now + Duration::days(20)),
        ExpiryState::ReminderDue(ReminderOffset::OneMonth)
    );
    assert_eq!(
        expiry_state(now, now + Duration::days(40)),
        ExpiryState::Active
    );
}

#[test]
fn email_types_are_derived_from_the_form_and_offset() {
    assert_eq!(
        email_type_for(&FormId::new("awards-for-all"), ReminderOffset::OneMonth),
        "AFA_ONE_MONTH"
    );
    assert_eq!(
        email_type_for(&FormId::new("heritage-fund"), ReminderOffset::OneDay),
        "HERITAGE_FUND_ONE_DAY"
    );
}

#[test]
fn a_due_reminder_is_queued_and_sent_exactly_once() {
    let fixture = fixture();
    let application = application_expiring_in(&fixture.pending, 20, "england");

    let summary = fixture.scheduler.tick(Utc::now()).expect("tick succeeds");
    assert_eq!(summary.email_queue.len(), 1);
    assert_eq!(summary.email_queue[0].email_type, "AFA_ONE_MONTH");
    assert_eq!(summary.email_queue[0].status, "SENT");

    // a second tick neither re-queues nor re-sends
    fixture.scheduler.tick(Utc::now()).expect("tick succeeds");
    assert_eq!(fixture.transport.messages().len(), 1);
    let entries = fixture
        .queue
        .find_by_application(&application.id)
        .expect("query works");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, EmailStatus::Sent);
}

#[test]
fn a_failed_send_is_retried_on_the_next_tick() {
    let fixture = fixture();
    application_expiring_in(&fixture.pending, 20, "england");
    fixture.transport.set_delivering(false);

    let summary = fixture.scheduler.tick(Utc::now()).expect("tick succeeds");
    assert_eq!(summary.email_queue[0].status, "QUEUED");
    assert!(fixture.transport.messages().is_empty());

    fixture.transport.set_delivering(true);
    let summary = fixture.scheduler.tick(Utc::now()).expect("tick succeeds");
    assert_eq!(summary.email_queue[0].status, "SENT");
    assert_eq!(fixture.transport.messages().len(), 1);
}

#[test]
fn expired_applications_are_swept_before_reminders_go_out() {
    let fixture = fixture();
    let expired = application_expiring_in(&fixture.pending, 20, "england");

    // queue the reminder, then let the application lapse
    fixture.transport.set_delivering(false);
    fixture.scheduler.tick(Utc::now()).expect("tick succeeds");

    let summary = fixture
        .scheduler
        .tick(Utc::now() + Duration::days(21))
        .expect("tick succeeds");
    assert_eq!(summary.expired, vec![expired.id]);
    assert!(summary.email_queue.is_empty());
    assert!(fixture
        .pending
        .fetch(&expired.id)
        .expect("fetch works")
        .is_none());
    assert!(fixture
        .queue
        .find_by_application(&expired.id)
        .expect("query works")
        .is_empty());
}

#[test]
fn welsh_projects_get_a_bilingual_subject() {
    let fixture = fixture();
    application_expiring_in(&fixture.pending, 20, "wales");

    fixture.scheduler.tick(Utc::now()).expect("tick succeeds");
    let messages = fixture.transport.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].subject,
        "You have one month to finish your application / Mae gennych fis i orffen eich cais"
    );
    assert!(messages[0].body.contains("/api/v1/unsubscribe?token="));
}

#[test]
fn english_projects_get_an_english_subject() {
    let fixture = fixture();
    application_expiring_in(&fixture.pending, 6, "england");

    fixture.scheduler.tick(Utc::now()).expect("tick succeeds");
    let messages = fixture.transport.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].subject,
        "You have one week to finish your application"
    );
}

#[test]
fn reminders_wait_for_a_contact_email() {
    let fixture = fixture();
    let now = Utc::now();
    let application = PendingApplication::new(
        UserId::new("user-1"),
        FormId::new("awards-for-all"),
        now,
        now + Duration::days(20),
    );
    fixture.pending.create(application).expect("seed created");

    let summary = fixture.scheduler.tick(now).expect("tick succeeds");
    assert!(summary.email_queue.is_empty());
    assert!(fixture.transport.messages().is_empty());
}

#[test]
fn an_unsubscribe_token_cancels_future_reminders() {
    let fixture = fixture();
    let application = application_expiring_in(&fixture.pending, 20, "england");
    fixture.transport.set_delivering(false);
    fixture.scheduler.tick(Utc::now()).expect("tick succeeds");

    let token = fixture
        .signer
        .sign(&application.id, UNSUBSCRIBE_ACTION, Duration::days(30))
        .expect("token signs");
    let removed = cancel_reminders(fixture.queue.as_ref(), fixture.signer.as_ref(), &token)
        .expect("token verifies");
    assert_eq!(removed, 1);
    assert!(fixture
        .queue
        .find_by_application(&application.id)
        .expect("query works")
        .is_empty());
    assert!(fixture.transport.messages().is_empty());
}

#[test]
fn tokens_with_the_wrong_action_are_rejected() {
    let fixture = fixture();
    let application = application_expiring_in(&fixture.pending, 20, "england");

    let token = fixture
        .signer
        .sign(&application.id, "delete-account", Duration::days(30))
        .expect("token signs");
    match cancel_reminders(fixture.queue.as_ref(), fixture.signer.as_ref(), &token) {
        Err(UnsubscribeError::WrongAction(action)) => assert_eq!(action, "delete-account"),
        other => panic!("expected wrong-action error, got {other:?}"),
    }
}

#[test]
fn tampered_tokens_are_rejected() {
    let fixture = fixture();
    match cancel_reminders(
        fixture.queue.as_ref(),
        fixture.signer.as_ref(),
        "not-a-token",
    ) {
        Err(UnsubscribeError::Token(TokenError::Invalid)) => {}
        other => panic!("expected invalid-token error, got {other:?}"),
    }
}

#[test]
fn tokens_signed_with_another_secret_are_rejected() {
    let fixture = fixture();
    let application = application_expiring_in(&fixture.pending, 20, "england");

    let foreign = JwtTokenSigner::new("some-other-secret");
    let token = foreign
        .sign(&application.id, UNSUBSCRIBE_ACTION, Duration::days(30))
        .expect("token signs");
    match cancel_reminders(fixture.queue.as_ref(), fixture.signer.as_ref(), &token) {
        Err(UnsubscribeError::Token(TokenError::Invalid)) => {}
        other => panic!("expected invalid-token error, got {other:?}"),
    }
}

fn router_fixture() -> (Fixture, axum::Router) {
    let fixture = fixture();
    let router = scheduler_router(SchedulerRouterState {
        scheduler: fixture.scheduler.clone(),
        queue: fixture.queue.clone(),
        signer: fixture.signer.clone(),
        secret: SECRET.to_string(),
    });
    (fixture, router)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable");
    serde_json::from_slice(&bytes).expect("body is json")
}

#[tokio::test]
async fn the_tick_endpoint_requires_the_shared_secret() {
    let (_fixture, router) = router_fixture();

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/scheduler/tick")
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(
            Request::post("/api/v1/scheduler/tick")
                .header("x-scheduler-secret", "wrong")
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn the_tick_endpoint_returns_a_summary() {
    let (fixture, router) = router_fixture();
    application_expiring_in(&fixture.pending, 20, "england");

    let response = router
        .oneshot(
            Request::post("/api/v1/scheduler/tick")
                .header("x-scheduler-secret", SECRET)
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["emailQueue"][0]["emailType"], json!("AFA_ONE_MONTH"));
    assert_eq!(body["emailQueue"][0]["status"], json!("SENT"));
    assert!(body["emailQueue"][0]["applicationId"].is_string());
    assert_eq!(body["expired"], json!([]));
}

#[tokio::test]
async fn unsubscribing_with_a_valid_token_reports_the_cancellations() {
    let (fixture, router) = router_fixture();
    let application = application_expiring_in(&fixture.pending, 20, "england");
    fixture.transport.set_delivering(false);
    fixture.scheduler.tick(Utc::now()).expect("tick succeeds");

    let token = fixture
        .signer
        .sign(&application.id, UNSUBSCRIBE_ACTION, Duration::days(30))
        .expect("token signs");
    let response = router
        .oneshot(
            Request::get(format!("/api/v1/unsubscribe?token={token}"))
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["unsubscribed"], json!(true));
    assert_eq!(body["reminders_cancelled"], json!(1));
}

#[tokio::test]
async fn bad_unsubscribe_tokens_redirect_home() {
    let (_fixture, router) = router_fixture();

    let response = router
        .clone()
        .oneshot(
            Request::get("/api/v1/unsubscribe?token=garbage")
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("router responds");
    assert!(response.status().is_redirection());
    assert_eq!(
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("/")
    );

    let response = router
        .oneshot(
            Request::get("/api/v1/unsubscribe")
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("router responds");
    assert!(response.status().is_redirection());
}
