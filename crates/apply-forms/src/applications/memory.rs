//! In-memory store implementations backing local development and tests.
//! Every operation takes the single mutex, so each call is atomic.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{
    ApplicationId, EmailQueueEntry, EmailStatus, PendingApplication, ProgressState,
    SubmittedApplication, UserId,
};
use super::store::{
    EmailQueueStore, PendingApplicationStore, StoreError, SubmittedApplicationStore,
};
use crate::forms::{AnswerSet, FormId};

#[derive(Debug, Default)]
pub struct InMemoryPendingStore {
    rows: Mutex<BTreeMap<ApplicationId, PendingApplication>>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_rows<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<ApplicationId, PendingApplication>) -> T,
    ) -> T {
        let mut rows = self.rows.lock().expect("pending store mutex poisoned");
        f(&mut rows)
    }
}

impl PendingApplicationStore for InMemoryPendingStore {
    fn create(&self, application: PendingApplication) -> Result<PendingApplication, StoreError> {
        self.with_rows(|rows| {
            if rows.contains_key(&application.id) {
                return Err(StoreError::Conflict);
            }
            rows.insert(application.id, application.clone());
            Ok(application)
        })
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<PendingApplication>, StoreError> {
        self.with_rows(|rows| Ok(rows.get(id).cloned()))
    }

    fn save_state(
        &self,
        id: &ApplicationId,
        data: AnswerSet,
        progress_state: ProgressState,
        now: DateTime<Utc>,
    ) -> Result<PendingApplication, StoreError> {
        self.with_rows(|rows| {
            let row = rows.get_mut(id).ok_or(StoreError::NotFound)?;
            row.application_data = data;
            row.progress_state = progress_state;
            row.updated_at = now;
            Ok(row.clone())
        })
    }

    fn increment_submission_attempts(&self, id: &ApplicationId) -> Result<u32, StoreError> {
        self.with_rows(|rows| {
            let row = rows.get_mut(id).ok_or(StoreError::NotFound)?;
            row.submission_attempts += 1;
            Ok(row.submission_attempts)
        })
    }

    fn find_all_by_user(&self, user_id: &UserId) -> Result<Vec<PendingApplication>, StoreError> {
        self.with_rows(|rows| {
            let mut found: Vec<PendingApplication> = rows
                .values()
                .filter(|row| row.user_id == *user_id)
                .cloned()
                .collect();
            found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(found)
        })
    }

    fn find_latest_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PendingApplication>, StoreError> {
        Ok(self.find_all_by_user(user_id)?.into_iter().next())
    }

    fn find_by_form_and_user(
        &self,
        form_id: &FormId,
        user_id: &UserId,
    ) -> Result<Vec<PendingApplication>, StoreError> {
        Ok(self
            .find_all_by_user(user_id)?
            .into_iter()
            .filter(|row| row.form_id == *form_id)
            .collect())
    }

    fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<PendingApplication>, StoreError> {
        self.with_rows(|rows| {
            Ok(rows
                .values()
                .filter(|row| row.expires_at <= now)
                .cloned()
                .collect())
        })
    }

    fn find_all(&self) -> Result<Vec<PendingApplication>, StoreError> {
        self.with_rows(|rows| Ok(rows.values().cloned().collect()))
    }

    fn delete(&self, id: &ApplicationId, user_id: &UserId) -> Result<(), StoreError> {
        self.with_rows(|rows| {
            match rows.get(id) {
                Some(row) if row.user_id == *user_id => {}
                _ => return Err(StoreError::NotFound),
            }
            rows.remove(id);
            Ok(())
        })
    }

    fn delete_many(&self, ids: &[ApplicationId]) -> Result<(), StoreError> {
        self.with_rows(|rows| {
            for id in ids {
                rows.remove(id);
            }
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemorySubmittedStore {
    rows: Mutex<BTreeMap<ApplicationId, SubmittedApplication>>,
}

impl InMemorySubmittedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubmittedApplicationStore for InMemorySubmittedStore {
    fn create(&self, application: SubmittedApplication) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().expect("submitted store mutex poisoned");
        if rows.contains_key(&application.id) {
            return Err(StoreError::Conflict);
        }
        rows.insert(application.id, application);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<SubmittedApplication>, StoreError> {
        let rows = self.rows.lock().expect("submitted store mutex poisoned");
        Ok(rows.get(id).cloned())
    }

    fn find_all_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SubmittedApplication>, StoreError> {
        let rows = self.rows.lock().expect("submitted store mutex poisoned");
        let mut found: Vec<SubmittedApplication> = rows
            .values()
            .filter(|row| row.user_id == *user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryEmailQueue {
    rows: Mutex<Vec<EmailQueueEntry>>,
}

impl InMemoryEmailQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<EmailQueueEntry> {
        self.rows.lock().expect("email queue mutex poisoned").clone()
    }
}

impl EmailQueueStore for InMemoryEmailQueue {
    fn enqueue(
        &self,
        application_id: &ApplicationId,
        email_type: &str,
    ) -> Result<Option<EmailQueueEntry>, StoreError> {
        let mut rows = self.rows.lock().expect("email queue mutex poisoned");
        let exists = rows.iter().any(|entry| {
            entry.pending_application_id == *application_id && entry.email_type == email_type
        });
        if exists {
            return Ok(None);
        }
        let entry = EmailQueueEntry {
            id: Uuid::new_v4(),
            pending_application_id: *application_id,
            email_type: email_type.to_string(),
            status: EmailStatus::Queued,
        };
        rows.push(entry.clone());
        Ok(Some(entry))
    }

    fn queued(&self) -> Result<Vec<EmailQueueEntry>, StoreError> {
        let rows = self.rows.lock().expect("email queue mutex poisoned");
        Ok(rows
            .iter()
            .filter(|entry| entry.status == EmailStatus::Queued)
            .cloned()
            .collect())
    }

    fn find_by_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<EmailQueueEntry>, StoreError> {
        let rows = self.rows.lock().expect("email queue mutex poisoned");
        Ok(rows
            .iter()
            .filter(|entry| entry.pending_application_id == *application_id)
            .cloned()
            .collect())
    }

    fn mark_sent(&self, entry_id: &Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().expect("email queue mutex poisoned");
        let entry = rows
            .iter_mut()
            .find(|entry| entry.id == *entry_id)
            .ok_or(StoreError::NotFound)?;
        entry.status = EmailStatus::Sent;
        Ok(())
    }

    fn delete_for_application(&self, application_id: &ApplicationId) -> Result<usize, StoreError> {
        let mut rows = self.rows.lock().expect("email queue mutex poisoned");
        let before = rows.len();
        rows.retain(|entry| entry.pending_application_id != *application_id);
        Ok(before - rows.len())
    }
}
