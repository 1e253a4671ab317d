//! Expiry scheduler: queues reminder emails at fixed offsets before an
//! application expires and sweeps applications past their expiry.
//!
//! The per-application state is derived from `now` vs `expires_at`, never
//! stored. Queue entries are exactly-once per `(application, email_type)`;
//! sends are at-least-once (a failed transport leaves the entry QUEUED for
//! the next tick).

pub mod router;
pub mod unsubscribe;

#[cfg(test)]
mod tests;

pub use router::{scheduler_router, SchedulerRouterState};
pub use unsubscribe::{
    cancel_reminders, JwtTokenSigner, TokenError, TokenSigner, UnsubscribeClaims,
    UnsubscribeError, UNSUBSCRIBE_ACTION,
};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::applications::domain::{ApplicationId, EmailQueueEntry, PendingApplication};
use crate::applications::store::{EmailQueueStore, PendingApplicationStore, StoreError};
use crate::forms::FormId;

/// Configured lead times before expiry at which a reminder is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReminderOffset {
    OneMonth,
    OneWeek,
    OneDay,
}

impl ReminderOffset {
    /// Ascending by lead time, so the first crossed offset is the nearest.
    pub const ALL: [ReminderOffset; 3] = [
        ReminderOffset::OneDay,
        ReminderOffset::OneWeek,
        ReminderOffset::OneMonth,
    ];

    pub const fn days_before(self) -> i64 {
        match self {
            ReminderOffset::OneMonth => 30,
            ReminderOffset::OneWeek => 7,
            ReminderOffset::OneDay => 1,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ReminderOffset::OneMonth => "ONE_MONTH",
            ReminderOffset::OneWeek => "ONE_WEEK",
            ReminderOffset::OneDay => "ONE_DAY",
        }
    }
}

/// Queue-entry type for one form/offset pair, e.g. `AFA_ONE_MONTH`.
pub fn email_type_for(form_id: &FormId, offset: ReminderOffset) -> String {
    let prefix = match form_id.0.as_str() {
        "awards-for-all" => "AFA".to_string(),
        other => other.to_ascii_uppercase().replace('-', "_"),
    };
    format!("{prefix}_{}", offset.label())
}

fn offset_for_email_type(email_type: &str) -> Option<ReminderOffset> {
    ReminderOffset::ALL
        .into_iter()
        .find(|offset| email_type.ends_with(offset.label()))
}

/// Derived state for one application at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    Active,
    ReminderDue(ReminderOffset),
    Expired,
}

pub fn expiry_state(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> ExpiryState {
    if expires_at <= now {
        return ExpiryState::Expired;
    }
    let remaining = expires_at - now;
    for offset in ReminderOffset::ALL {
        if remaining <= Duration::days(offset.days_before()) {
            return ExpiryState::ReminderDue(offset);
        }
    }
    ExpiryState::Active
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("email transport unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
}

pub trait EmailTransport: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<Delivery, TransportError>;
}

/// Error raised by the scheduler tick. Transport failures are absorbed
/// (retried next tick); only persistence failures abort a tick.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntryView {
    pub application_id: ApplicationId,
    pub email_type: String,
    pub status: &'static str,
}

/// JSON summary returned to the scheduler endpoint. Serialized camel-cased,
/// matching the answer-set key convention on the rest of the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TickSummary {
    pub email_queue: Vec<QueueEntryView>,
    pub expired: Vec<ApplicationId>,
}

/// Periodic job over the pending-application store and the email queue.
/// Assumed single-flight; the queue store's uniqueness rule keeps reminder
/// entries exactly-once even if ticks overlap.
pub struct ExpiryScheduler<P> {
    pending: Arc<P>,
    queue: Arc<dyn EmailQueueStore>,
    transport: Arc<dyn EmailTransport>,
    signer: Arc<dyn TokenSigner>,
    unsubscribe_ttl: Duration,
    base_url: String,
}

impl<P> ExpiryScheduler<P>
where
    P: PendingApplicationStore + 'static,
{
    pub fn new(
        pending: Arc<P>,
        queue: Arc<dyn EmailQueueStore>,
        transport: Arc<dyn EmailTransport>,
        signer: Arc<dyn TokenSigner>,
        unsubscribe_ttl_days: i64,
        base_url: &str,
    ) -> Self {
        Self {
            pending,
            queue,
            transport,
            signer,
            unsubscribe_ttl: Duration::days(unsubscribe_ttl_days),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One scheduler pass: sweep expired applications, queue newly due
    /// reminders, then attempt delivery of everything still queued.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary, SchedulerError> {
        let expired = self.sweep(now)?;
        self.queue_due_reminders(now)?;
        let email_queue = self.deliver_queued()?;
        Ok(TickSummary {
            email_queue,
            expired,
        })
    }

    /// Deletion wins over reminders: expired applications go first, queue
    /// entries and all.
    fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<ApplicationId>, SchedulerError> {
        let expired = self.pending.find_expired(now)?;
        if expired.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<ApplicationId> = expired.iter().map(|application| application.id).collect();
        for id in &ids {
            self.queue.delete_for_application(id)?;
        }
        self.pending.delete_many(&ids)?;
        info!(count = ids.len(), "swept expired applications");
        Ok(ids)
    }

    fn queue_due_reminders(&self, now: DateTime<Utc>) -> Result<(), SchedulerError> {
        for application in self.pending.find_all()? {
            let ExpiryState::ReminderDue(offset) = expiry_state(now, application.expires_at)
            else {
                continue;
            };
            let email_type = email_type_for(&application.form_id, offset);
            if let Some(entry) = self.queue.enqueue(&application.id, &email_type)? {
                info!(
                    application_id = %application.id,
                    email_type = entry.email_type.as_str(),
                    "queued expiry reminder"
                );
            }
        }
        Ok(())
    }

    fn deliver_queued(&self) -> Result<Vec<QueueEntryView>, SchedulerError> {
        let mut views = Vec::new();
        for entry in self.queue.queued()? {
            let Some(application) = self.pending.fetch(&entry.pending_application_id)? else {
                // application went away between queueing and sending
                self.queue
                    .delete_for_application(&entry.pending_application_id)?;
                continue;
            };

            let Some(message) = self.build_reminder(&application, &entry) else {
                warn!(
                    application_id = %application.id,
                    email_type = entry.email_type.as_str(),
                    "reminder skipped: application has no contact email yet"
                );
                continue;
            };

            let status = match self.transport.send(&message) {
                Ok(Delivery { delivered: true }) => {
                    self.queue.mark_sent(&entry.id)?;
                    crate::applications::domain::EmailStatus::Sent.label()
                }
                Ok(Delivery { delivered: false }) | Err(_) => {
                    warn!(
                        application_id = %application.id,
                        email_type = entry.email_type.as_str(),
                        "reminder not delivered, left queued for next tick"
                    );
                    crate::applications::domain::EmailStatus::Queued.label()
                }
            };
            views.push(QueueEntryView {
                application_id: entry.pending_application_id,
                email_type: entry.email_type.clone(),
                status,
            });
        }
        Ok(views)
    }

    fn build_reminder(
        &self,
        application: &PendingApplication,
        entry: &EmailQueueEntry,
    ) -> Option<EmailMessage> {
        let to = application
            .application_data
            .get("mainContactEmail")
            .and_then(Value::as_str)?
            .to_string();
        let offset = offset_for_email_type(&entry.email_type)?;
        let subject = reminder_subject(offset, wants_bilingual(application));

        let mut body = format!(
            "Your grant application expires on {}. Sign in to finish and submit it before then.",
            application.expires_at.format("%-d %B %Y")
        );
        match self
            .signer
            .sign(&application.id, UNSUBSCRIBE_ACTION, self.unsubscribe_ttl)
        {
            Ok(token) => {
                body.push_str(&format!(
                    "\n\nTo stop these reminders: {}/api/v1/unsubscribe?token={token}",
                    self.base_url
                ));
            }
            Err(err) => {
                error!(application_id = %application.id, error = %err, "could not sign unsubscribe token");
            }
        }

        Some(EmailMessage { to, subject, body })
    }
}

/// Welsh-language audiences get the English and Welsh subjects joined by " / ".
fn wants_bilingual(application: &PendingApplication) -> bool {
    application
        .application_data
        .get("projectCountry")
        .and_then(Value::as_str)
        .is_some_and(|country| country.eq_ignore_ascii_case("wales"))
}

fn reminder_subject(offset: ReminderOffset, bilingual: bool) -> String {
    let (en, cy) = match offset {
        ReminderOffset::OneMonth => (
            "You have one month to finish your application",
            "Mae gennych fis i orffen eich cais",
        ),
        ReminderOffset::OneWeek => (
            "You have one week to finish your application",
            "Mae gennych wythnos i orffen eich cais",
        ),
        ReminderOffset::OneDay => (
            "You have one day to finish your application",
            "Mae gennych ddiwrnod i orffen eich cais",
        ),
    };
    if bilingual {
        format!("{en} / {cy}")
    } else {
        en.to_string()
    }
}
