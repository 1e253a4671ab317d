//! Submission pipeline: validates completeness, exports to the external
//! system, uploads attachments, and transitions Pending → Submitted exactly
//! once. The submitted-application snapshot (sharing the pending id) is the
//! idempotency guard.

pub mod export;


pub use export::{export, AttachmentRef, ExportedApplication};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::applications::domain::{ApplicationId, SubmittedApplication, UserId};
use crate::applications::store::{PendingApplicationStore, StoreError, SubmittedApplicationStore};
use crate::forms::{FormId, FormRegistry, Locale, ValidationMessage};

/// External CRM failures. Timeouts are failures, never successes.
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("crm unavailable: {0}")]
    Unavailable(String),
    #[error("crm rejected the record: {0}")]
    Rejected(String),
    #[error("crm request timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrmReference(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmHealth {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Contract with the system of record. Implementations own their transport
/// and must bound their timeouts.
pub trait CrmClient: Send + Sync {
    fn authorize(&self) -> Result<String, CrmError>;
    fn submit(&self, token: &str, record: &ExportedApplication) -> Result<CrmReference, CrmError>;
    fn attach(
        &self,
        token: &str,
        reference: &CrmReference,
        attachment: &CrmAttachment,
    ) -> Result<(), CrmError>;
    fn health_status(&self) -> Result<CrmHealth, CrmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub trait FileStorage: Send + Sync {
    fn upload(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("virus scanner unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanVerdict {
    pub is_infected: bool,
}

pub trait VirusScanner: Send + Sync {
    fn scan(&self, key: &str, bytes: &[u8]) -> Result<ScanVerdict, ScanError>;
}

/// Error raised by the submission pipeline. Anything returned here leaves
/// the pending application intact so the user can retry.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("application not found")]
    NotFound,
    #[error("unknown form '{0}'")]
    UnknownForm(FormId),
    #[error("application is incomplete")]
    Incomplete(Vec<ValidationMessage>),
    #[error(transparent)]
    Crm(#[from] CrmError),
}

/// Confirmation returned to the applicant. The same receipt comes back for
/// a double submit, with `already_submitted` set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub application_id: ApplicationId,
    pub form_id: FormId,
    pub crm_reference: Option<String>,
    pub already_submitted: bool,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionReceipt {
    fn for_existing(existing: &SubmittedApplication) -> Self {
        Self {
            application_id: existing.id,
            form_id: existing.form_id.clone(),
            crm_reference: existing.crm_reference.clone(),
            already_submitted: true,
            submitted_at: existing.created_at,
        }
    }
}

/// Pipeline composing the two application stores and the external
/// collaborators behind their trait seams.
pub struct SubmissionPipeline<P> {
    pending: Arc<P>,
    submitted: Arc<dyn SubmittedApplicationStore>,
    crm: Arc<dyn CrmClient>,
    files: Arc<dyn FileStorage>,
    scanner: Arc<dyn VirusScanner>,
    registry: Arc<FormRegistry>,
    environment: String,
}

impl<P> SubmissionPipeline<P>
where
    P: PendingApplicationStore + 'static,
{
    pub fn new(
        pending: Arc<P>,
        submitted: Arc<dyn SubmittedApplicationStore>,
        crm: Arc<dyn CrmClient>,
        files: Arc<dyn FileStorage>,
        scanner: Arc<dyn VirusScanner>,
        registry: Arc<FormRegistry>,
        environment: &str,
    ) -> Self {
        Self {
            pending,
            submitted,
            crm,
            files,
            scanner,
            registry,
            environment: environment.to_string(),
        }
    }

    /// Submit a completed application exactly once.
    pub fn submit(
        &self,
        user_id: &UserId,
        id: &ApplicationId,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let application = match self.pending.fetch(id)? {
            Some(application) if application.user_id == *user_id => application,
            _ => {
                // the pending row is gone after a successful submission; a
                // double submit lands here and gets the original receipt
                if let Some(existing) = self.submitted.fetch(id)? {
                    if existing.user_id == *user_id {
                        return Ok(SubmissionReceipt::for_existing(&existing));
                    }
                }
                return Err(SubmissionError::NotFound);
            }
        };

        // idempotency guard before any external work
        if let Some(existing) = self.submitted.fetch(id)? {
            info!(application_id = %id, "submission already recorded, returning existing receipt");
            return Ok(SubmissionReceipt::for_existing(&existing));
        }

        let definition = self
            .registry
            .get(&application.form_id)
            .ok_or_else(|| SubmissionError::UnknownForm(application.form_id.clone()))?;
        let form = definition.instantiate(application.application_data.clone(), Locale::En);
        let progress = form.progress();
        if !progress.is_complete {
            return Err(SubmissionError::Incomplete(form.validate().messages));
        }

        let attempts = self.pending.increment_submission_attempts(id)?;
        info!(application_id = %id, attempts, "submitting application");

        let record = export::export(&form, &application, &self.environment);
        let (reference, attached) = match self.dispatch(id, &record) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.probe_crm_health(id, attempts);
                return Err(err.into());
            }
        };

        let snapshot = SubmittedApplication {
            id: *id,
            form_id: application.form_id.clone(),
            user_id: application.user_id.clone(),
            summary: json!({
                "progress": progress,
                "answers": record.answers,
                "attachments": record.attachments,
                "attachments_uploaded": attached,
            }),
            crm_reference: Some(reference.0.clone()),
            created_at: now,
        };
        match self.submitted.create(snapshot) {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                // a concurrent submit won the check-then-act race; theirs is canonical
                if let Some(existing) = self.submitted.fetch(id)? {
                    return Ok(SubmissionReceipt::for_existing(&existing));
                }
                return Err(SubmissionError::Store(StoreError::Conflict));
            }
            Err(other) => return Err(other.into()),
        }

        if let Err(err) = self.pending.delete(id, user_id) {
            // the snapshot exists, so the submission stands; the sweep or a
            // later delete will clean the leftover row
            error!(application_id = %id, error = %err, "failed to remove pending row after submission");
        }

        Ok(SubmissionReceipt {
            application_id: *id,
            form_id: application.form_id.clone(),
            crm_reference: Some(reference.0),
            already_submitted: false,
            submitted_at: now,
        })
    }

    /// Authorize, submit, attach. Attachment failures after a successful
    /// submit are logged for manual follow-up and do not fail the overall
    /// submission: the CRM record is the durable submission.
    fn dispatch(
        &self,
        id: &ApplicationId,
        record: &ExportedApplication,
    ) -> Result<(CrmReference, usize), CrmError> {
        let token = self.crm.authorize()?;
        let reference = self.crm.submit(&token, record)?;

        let mut attached = 0;
        for attachment_ref in &record.attachments {
            match self.fetch_attachment(attachment_ref) {
                Ok(Some(attachment)) => {
                    match self.crm.attach(&token, &reference, &attachment) {
                        Ok(()) => attached += 1,
                        Err(err) => error!(
                            application_id = %id,
                            field = attachment_ref.field.as_str(),
                            error = %err,
                            "attachment upload failed, needs manual follow-up"
                        ),
                    }
                }
                Ok(None) => error!(
                    application_id = %id,
                    field = attachment_ref.field.as_str(),
                    key = attachment_ref.storage_key.as_str(),
                    "infected file rejected, needs manual follow-up"
                ),
                Err(err) => error!(
                    application_id = %id,
                    field = attachment_ref.field.as_str(),
                    error = %err,
                    "attachment fetch failed, needs manual follow-up"
                ),
            }
        }

        Ok((reference, attached))
    }

    /// Fetch and scan one stored file. `None` means the scanner rejected it.
    fn fetch_attachment(
        &self,
        attachment_ref: &AttachmentRef,
    ) -> Result<Option<CrmAttachment>, AttachmentError> {
        let bytes = self.files.get(&attachment_ref.storage_key)?;
        let verdict = self.scanner.scan(&attachment_ref.storage_key, &bytes)?;
        if verdict.is_infected {
            return Ok(None);
        }
        Ok(Some(CrmAttachment {
            filename: attachment_ref.filename.clone(),
            content_type: attachment_ref.content_type.clone(),
            bytes,
        }))
    }

    /// Operational logging only; runs on a detached thread so the caller's
    /// error response never waits on the probe.
    fn probe_crm_health(&self, id: &ApplicationId, attempts: u32) {
        let crm = Arc::clone(&self.crm);
        let id = *id;
        std::thread::spawn(move || match crm.health_status() {
            Ok(health) => warn!(
                application_id = %id,
                attempts,
                crm_status = health.status.as_str(),
                "submission failed"
            ),
            Err(err) => warn!(
                application_id = %id,
                attempts,
                error = %err,
                "submission failed and crm health probe errored"
            ),
        });
    }
}

#[derive(Debug, thiserror::Error)]
enum AttachmentError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}
