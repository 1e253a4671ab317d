use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::domain::{ApplicationId, PendingApplication, UserId};
use super::service::{ApplicationService, ApplicationServiceError};
use super::store::{PendingApplicationStore, StoreError};
use crate::forms::{AnswerSet, FormId, Locale, Page, Pagination, Progress};
use crate::submission::{SubmissionError, SubmissionPipeline};

/// Shared state for the application endpoints.
pub struct ApplicationRouterState<P> {
    pub service: Arc<ApplicationService<P>>,
    pub pipeline: Arc<SubmissionPipeline<P>>,
}

impl<P> Clone for ApplicationRouterState<P> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}

/// Router builder exposing the step, dashboard, delete and submission
/// endpoints. Caller identity comes from the `x-user-id` header; session
/// middleware lives upstream of this service.
pub fn application_router<P>(state: ApplicationRouterState<P>) -> Router
where
    P: PendingApplicationStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(start_handler::<P>).get(list_handler::<P>),
        )
        .route("/api/v1/applications/latest", get(latest_handler::<P>))
        .route(
            "/api/v1/applications/:application_id",
            delete(delete_handler::<P>),
        )
        .route(
            "/api/v1/applications/:application_id/steps/:section/:index",
            get(step_view_handler::<P>).post(save_step_handler::<P>),
        )
        .route(
            "/api/v1/applications/:application_id/submit",
            post(submit_handler::<P>),
        )
        .with_state(state)
}

/// Dashboard projection of one pending application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub form_id: FormId,
    pub progress_state: &'static str,
    pub submission_attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationView {
    fn from(application: &PendingApplication) -> Self {
        Self {
            application_id: application.id,
            form_id: application.form_id.clone(),
            progress_state: application.progress_state.label(),
            submission_attempts: application.submission_attempts,
            expires_at: application.expires_at,
            created_at: application.created_at,
            updated_at: application.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartRequest {
    pub form_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LocaleQuery {
    #[serde(default)]
    locale: Option<String>,
}

impl LocaleQuery {
    fn locale(&self) -> Locale {
        self.locale
            .as_deref()
            .map(Locale::parse)
            .unwrap_or(Locale::En)
    }
}

#[derive(Debug, Serialize)]
struct FieldView {
    name: String,
    label: String,
    kind: &'static str,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

#[derive(Debug, Serialize)]
struct StepView {
    section: String,
    index: usize,
    title: String,
    fields: Vec<FieldView>,
    pagination: Pagination,
}

#[derive(Debug, Serialize)]
struct SaveResponse {
    application: ApplicationView,
    progress: Progress,
    next: Page,
}

pub(crate) async fn start_handler<P>(
    State(state): State<ApplicationRouterState<P>>,
    headers: HeaderMap,
    Json(request): Json<StartRequest>,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthenticated();
    };
    match state
        .service
        .start(user_id, FormId::new(&request.form_id), Utc::now())
    {
        Ok(application) => {
            (StatusCode::CREATED, Json(ApplicationView::from(&application))).into_response()
        }
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn list_handler<P>(
    State(state): State<ApplicationRouterState<P>>,
    headers: HeaderMap,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthenticated();
    };
    match state.service.list(&user_id) {
        Ok(applications) => {
            let views: Vec<ApplicationView> =
                applications.iter().map(ApplicationView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn latest_handler<P>(
    State(state): State<ApplicationRouterState<P>>,
    headers: HeaderMap,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthenticated();
    };
    match state.service.latest(&user_id) {
        Ok(Some(application)) => {
            (StatusCode::OK, Json(ApplicationView::from(&application))).into_response()
        }
        Ok(None) => not_found(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn delete_handler<P>(
    State(state): State<ApplicationRouterState<P>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthenticated();
    };
    let Some(id) = parse_application_id(&application_id) else {
        return not_found();
    };
    match state.service.delete(&user_id, &id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn step_view_handler<P>(
    State(state): State<ApplicationRouterState<P>>,
    headers: HeaderMap,
    Path((application_id, section, index)): Path<(String, String, usize)>,
    Query(query): Query<LocaleQuery>,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthenticated();
    };
    let Some(id) = parse_application_id(&application_id) else {
        return not_found();
    };

    let application = match state.service.get(&user_id, &id) {
        Ok(application) => application,
        Err(err) => return service_error_response(err),
    };
    let definition = match state.service.form_for(&application) {
        Ok(definition) => definition,
        Err(err) => return service_error_response(err),
    };
    let Some(step) = definition.step(&section, index) else {
        return not_found();
    };

    let form = definition.instantiate(application.application_data.clone(), query.locale());
    let Some(pagination) = form.pagination(&section, index) else {
        return not_found();
    };

    let fields = step
        .fields
        .iter()
        .map(|field| FieldView {
            name: field.name.clone(),
            label: field.label.clone(),
            kind: field.kind.label(),
            required: field.is_required,
            hint: field.hint.clone(),
            options: field.options.clone(),
            value: application.application_data.get(&field.name).cloned(),
        })
        .collect();

    let view = StepView {
        section,
        index,
        title: step.title.clone(),
        fields,
        pagination,
    };
    (StatusCode::OK, Json(view)).into_response()
}

pub(crate) async fn save_step_handler<P>(
    State(state): State<ApplicationRouterState<P>>,
    headers: HeaderMap,
    Path((application_id, section, index)): Path<(String, String, usize)>,
    Query(query): Query<LocaleQuery>,
    Json(answers): Json<AnswerSet>,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthenticated();
    };
    let Some(id) = parse_application_id(&application_id) else {
        return not_found();
    };

    match state.service.save_step(
        &user_id,
        &id,
        &section,
        index,
        &answers,
        query.locale(),
        Utc::now(),
    ) {
        Ok(outcome) => {
            let response = SaveResponse {
                application: ApplicationView::from(&outcome.application),
                progress: outcome.progress,
                next: outcome.next,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn submit_handler<P>(
    State(state): State<ApplicationRouterState<P>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthenticated();
    };
    let Some(id) = parse_application_id(&application_id) else {
        return not_found();
    };

    match state.pipeline.submit(&user_id, &id, Utc::now()) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(SubmissionError::NotFound | SubmissionError::Store(StoreError::NotFound)) => {
            not_found()
        }
        Err(SubmissionError::Incomplete(messages)) => {
            let payload = json!({
                "error": "application is incomplete",
                "messages": messages,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(SubmissionError::Crm(_)) => {
            // retry-safe: the pending application is untouched
            let payload = json!({
                "error": "submission failed, your application has been kept. Please try again",
            });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
        Err(SubmissionError::UnknownForm(_)) => not_found(),
        Err(SubmissionError::Store(_)) => internal_error(),
    }
}

fn user_from_headers(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(UserId::new)
}

fn parse_application_id(raw: &str) -> Option<ApplicationId> {
    Uuid::parse_str(raw).map(ApplicationId).ok()
}

fn unauthenticated() -> Response {
    let payload = json!({ "error": "missing user identity" });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn not_found() -> Response {
    let payload = json!({ "error": "application not found" });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

fn internal_error() -> Response {
    let payload = json!({ "error": "internal failure" });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}

fn service_error_response(err: ApplicationServiceError) -> Response {
    match err {
        ApplicationServiceError::Store(StoreError::NotFound)
        | ApplicationServiceError::UnknownForm(_)
        | ApplicationServiceError::UnknownStep { .. } => not_found(),
        ApplicationServiceError::Store(StoreError::Conflict) => {
            let payload = json!({ "error": "application already exists" });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        ApplicationServiceError::Validation(messages) => {
            let payload = json!({ "messages": messages });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        ApplicationServiceError::PreFlight(failure) => {
            let payload = json!({
                "messages": [{
                    "field": failure.field,
                    "kind": "pre_flight",
                    "message": failure.message,
                }],
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        ApplicationServiceError::Store(StoreError::Unavailable(_)) => internal_error(),
    }
}
