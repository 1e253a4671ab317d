use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::{ExpiryScheduler, TokenSigner};
use crate::applications::store::{EmailQueueStore, PendingApplicationStore};
use crate::expiry::unsubscribe::cancel_reminders;

/// Shared state for the scheduler and unsubscribe endpoints.
pub struct SchedulerRouterState<P> {
    pub scheduler: Arc<ExpiryScheduler<P>>,
    pub queue: Arc<dyn EmailQueueStore>,
    pub signer: Arc<dyn TokenSigner>,
    pub secret: String,
}

impl<P> Clone for SchedulerRouterState<P> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            queue: self.queue.clone(),
            signer: self.signer.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// Router for the cron-invoked tick endpoint and the public unsubscribe
/// landing. The tick endpoint is shared-secret guarded; unsubscribe is
/// token-guarded and fails closed to a redirect.
pub fn scheduler_router<P>(state: SchedulerRouterState<P>) -> Router
where
    P: PendingApplicationStore + 'static,
{
    Router::new()
        .route("/api/v1/scheduler/tick", post(tick_handler::<P>))
        .route("/api/v1/unsubscribe", get(unsubscribe_handler::<P>))
        .with_state(state)
}

pub(crate) async fn tick_handler<P>(
    State(state): State<SchedulerRouterState<P>>,
    headers: HeaderMap,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let presented = headers
        .get("x-scheduler-secret")
        .and_then(|value| value.to_str().ok());
    if presented != Some(state.secret.as_str()) {
        let payload = json!({ "error": "missing or invalid scheduler secret" });
        return (StatusCode::UNAUTHORIZED, Json(payload)).into_response();
    }

    match state.scheduler.tick(Utc::now()) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => {
            warn!(error = %err, "scheduler tick failed");
            let payload = json!({ "error": "internal failure" });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnsubscribeQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Linked from reminder emails. Any bad token (expired, tampered, wrong
/// action) redirects home without revealing why.
pub(crate) async fn unsubscribe_handler<P>(
    State(state): State<SchedulerRouterState<P>>,
    Query(query): Query<UnsubscribeQuery>,
) -> Response
where
    P: PendingApplicationStore + 'static,
{
    let Some(token) = query.token.as_deref().filter(|raw| !raw.is_empty()) else {
        return Redirect::to("/").into_response();
    };

    match cancel_reminders(state.queue.as_ref(), state.signer.as_ref(), token) {
        Ok(removed) => {
            let payload = json!({
                "unsubscribed": true,
                "reminders_cancelled": removed,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => {
            warn!(error = %err, "unsubscribe rejected");
            Redirect::to("/").into_response()
        }
    }
}
