use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::forms::{AnswerSet, FormId};

/// Opaque, globally unique application identifier, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier for the applicant, supplied by the surrounding session layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse completion state persisted alongside the raw answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressState {
    Pending,
    Complete,
}

impl ProgressState {
    pub const fn label(self) -> &'static str {
        match self {
            ProgressState::Pending => "PENDING",
            ProgressState::Complete => "COMPLETE",
        }
    }
}

/// Durable partial-answer state for one in-progress application. The raw
/// `application_data` may be momentarily invalid mid-edit; each save is a
/// full replace of the mapping, never a partial write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApplication {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub form_id: FormId,
    pub application_data: AnswerSet,
    pub progress_state: ProgressState,
    pub submission_attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingApplication {
    pub fn new(
        user_id: UserId,
        form_id: FormId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApplicationId::generate(),
            user_id,
            form_id,
            application_data: AnswerSet::new(),
            progress_state: ProgressState::Pending,
            submission_attempts: 0,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable snapshot created exactly once per pending application; shares
/// the pending application's id so submission lookups stay idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedApplication {
    pub id: ApplicationId,
    pub form_id: FormId,
    pub user_id: UserId,
    pub summary: Value,
    pub crm_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Delivery state of one reminder email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailStatus {
    Queued,
    Sent,
}

impl EmailStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EmailStatus::Queued => "QUEUED",
            EmailStatus::Sent => "SENT",
        }
    }
}

/// One queued reminder. At most one entry may ever exist per
/// `(pending_application_id, email_type)`, across both statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailQueueEntry {
    pub id: Uuid,
    pub pending_application_id: ApplicationId,
    pub email_type: String,
    pub status: EmailStatus,
}
