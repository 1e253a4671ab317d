use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationId, EmailQueueEntry, PendingApplication, ProgressState, SubmittedApplication,
    UserId,
};
use crate::forms::{AnswerSet, FormId};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence contract for in-progress applications.
///
/// Saves are last-write-wins on `updated_at`: two concurrent tabs editing the
/// same application race, and the later `save_state` wins in full. There is
/// no version check; this is an accepted, documented limitation.
pub trait PendingApplicationStore: Send + Sync {
    fn create(&self, application: PendingApplication) -> Result<PendingApplication, StoreError>;

    fn fetch(&self, id: &ApplicationId) -> Result<Option<PendingApplication>, StoreError>;

    /// Full replace of `application_data` plus the derived progress state;
    /// bumps `updated_at`. Succeeds or fails atomically.
    fn save_state(
        &self,
        id: &ApplicationId,
        data: AnswerSet,
        progress_state: ProgressState,
        now: DateTime<Utc>,
    ) -> Result<PendingApplication, StoreError>;

    fn increment_submission_attempts(&self, id: &ApplicationId) -> Result<u32, StoreError>;

    fn find_all_by_user(&self, user_id: &UserId) -> Result<Vec<PendingApplication>, StoreError>;

    /// Most recently updated application wins.
    fn find_latest_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PendingApplication>, StoreError>;

    fn find_by_form_and_user(
        &self,
        form_id: &FormId,
        user_id: &UserId,
    ) -> Result<Vec<PendingApplication>, StoreError>;

    /// Everything with `expires_at <= now`.
    fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<PendingApplication>, StoreError>;

    fn find_all(&self) -> Result<Vec<PendingApplication>, StoreError>;

    /// Ownership-checked delete; removes exactly one row or fails NotFound.
    fn delete(&self, id: &ApplicationId, user_id: &UserId) -> Result<(), StoreError>;

    /// Bulk delete used only by the expiry sweep.
    fn delete_many(&self, ids: &[ApplicationId]) -> Result<(), StoreError>;
}

/// Persistence contract for submitted-application snapshots. `create` must
/// enforce uniqueness on id at the storage layer; that uniqueness is the
/// idempotency guard for the submission pipeline.
pub trait SubmittedApplicationStore: Send + Sync {
    fn create(&self, application: SubmittedApplication) -> Result<(), StoreError>;

    fn fetch(&self, id: &ApplicationId) -> Result<Option<SubmittedApplication>, StoreError>;

    fn find_all_by_user(&self, user_id: &UserId)
        -> Result<Vec<SubmittedApplication>, StoreError>;
}

/// Persistence contract for the reminder email queue.
pub trait EmailQueueStore: Send + Sync {
    /// Idempotent per `(application, email_type)` across QUEUED and SENT:
    /// returns the new entry, or `None` when one already exists.
    fn enqueue(
        &self,
        application_id: &ApplicationId,
        email_type: &str,
    ) -> Result<Option<EmailQueueEntry>, StoreError>;

    fn queued(&self) -> Result<Vec<EmailQueueEntry>, StoreError>;

    fn find_by_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<EmailQueueEntry>, StoreError>;

    fn mark_sent(&self, entry_id: &uuid::Uuid) -> Result<(), StoreError>;

    /// Remove every entry for one application (expiry sweep, unsubscribe).
    fn delete_for_application(&self, application_id: &ApplicationId) -> Result<usize, StoreError>;
}
