use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use super::domain::{ApplicationId, PendingApplication, ProgressState, UserId};
use super::store::{PendingApplicationStore, StoreError};
use crate::forms::{
    AnswerSet, FormDefinition, FormId, FormRegistry, Locale, Page, Progress, ValidationMessage,
};

/// Out-of-band check run after a step's schema validation passes and before
/// the step is persisted (e.g. a contact-role uniqueness check against an
/// external directory).
pub trait PreFlightCheck: Send + Sync {
    fn check(
        &self,
        application: &PendingApplication,
        answers: &AnswerSet,
    ) -> Result<(), PreFlightFailure>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreFlightFailure {
    pub field: String,
    pub message: String,
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unknown form '{0}'")]
    UnknownForm(FormId),
    #[error("unknown step {section}/{index}")]
    UnknownStep { section: String, index: usize },
    #[error("step validation failed")]
    Validation(Vec<ValidationMessage>),
    #[error("pre-flight check failed for field '{}'", .0.field)]
    PreFlight(PreFlightFailure),
}

/// Result of persisting one step.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub application: PendingApplication,
    pub progress: Progress,
    pub next: Page,
}

/// Service composing the form registry and the pending-application store.
/// All mutation is id-scoped and ownership-checked; a wrong user sees
/// NotFound, never another user's data.
pub struct ApplicationService<P> {
    store: Arc<P>,
    registry: Arc<FormRegistry>,
    pre_flight: HashMap<String, Arc<dyn PreFlightCheck>>,
    application_lifetime: Duration,
}

impl<P> ApplicationService<P>
where
    P: PendingApplicationStore + 'static,
{
    pub fn new(store: Arc<P>, registry: Arc<FormRegistry>, application_lifetime_days: i64) -> Self {
        Self {
            store,
            registry,
            pre_flight: HashMap::new(),
            application_lifetime: Duration::days(application_lifetime_days),
        }
    }

    pub fn with_pre_flight_check(mut self, tag: &str, check: Arc<dyn PreFlightCheck>) -> Self {
        self.pre_flight.insert(tag.to_string(), check);
        self
    }

    pub fn registry(&self) -> &FormRegistry {
        &self.registry
    }

    pub fn form_for(
        &self,
        application: &PendingApplication,
    ) -> Result<&FormDefinition, ApplicationServiceError> {
        self.registry
            .get(&application.form_id)
            .ok_or_else(|| ApplicationServiceError::UnknownForm(application.form_id.clone()))
    }

    /// Create a fresh pending application expiring one lifetime from now.
    pub fn start(
        &self,
        user_id: UserId,
        form_id: FormId,
        now: DateTime<Utc>,
    ) -> Result<PendingApplication, ApplicationServiceError> {
        if self.registry.get(&form_id).is_none() {
            return Err(ApplicationServiceError::UnknownForm(form_id));
        }
        let application =
            PendingApplication::new(user_id, form_id, now, now + self.application_lifetime);
        Ok(self.store.create(application)?)
    }

    /// Fetch with an ownership check; a mismatched user gets NotFound.
    pub fn get(
        &self,
        user_id: &UserId,
        id: &ApplicationId,
    ) -> Result<PendingApplication, ApplicationServiceError> {
        let application = self.store.fetch(id)?.ok_or(StoreError::NotFound)?;
        if application.user_id != *user_id {
            return Err(ApplicationServiceError::Store(StoreError::NotFound));
        }
        Ok(application)
    }

    pub fn list(&self, user_id: &UserId) -> Result<Vec<PendingApplication>, ApplicationServiceError> {
        Ok(self.store.find_all_by_user(user_id)?)
    }

    pub fn latest(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PendingApplication>, ApplicationServiceError> {
        Ok(self.store.find_latest_by_user(user_id)?)
    }

    pub fn list_for_form(
        &self,
        form_id: &FormId,
        user_id: &UserId,
    ) -> Result<Vec<PendingApplication>, ApplicationServiceError> {
        Ok(self.store.find_by_form_and_user(form_id, user_id)?)
    }

    pub fn delete(
        &self,
        user_id: &UserId,
        id: &ApplicationId,
    ) -> Result<(), ApplicationServiceError> {
        Ok(self.store.delete(id, user_id)?)
    }

    /// Validate and persist one step.
    ///
    /// Only the step's own fields are replaced in the answer-set (removed
    /// when absent from the submission), and only this step's validation
    /// failures block the save; other steps may legitimately be invalid
    /// mid-edit. The persisted write is a full replace of the mapping.
    pub fn save_step(
        &self,
        user_id: &UserId,
        id: &ApplicationId,
        section_slug: &str,
        step_index: usize,
        answers: &AnswerSet,
        locale: Locale,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, ApplicationServiceError> {
        let application = self.get(user_id, id)?;
        let definition = self.form_for(&application)?;
        let step = definition.step(section_slug, step_index).ok_or_else(|| {
            ApplicationServiceError::UnknownStep {
                section: section_slug.to_string(),
                index: step_index,
            }
        })?;

        let mut merged = application.application_data.clone();
        for name in step.field_names() {
            match answers.get(name) {
                Some(value) => {
                    merged.insert(name.to_string(), value.clone());
                }
                None => {
                    merged.remove(name);
                }
            }
        }

        let form = definition.instantiate(merged.clone(), locale);
        let outcome = form.validate();
        let step_messages: Vec<ValidationMessage> = outcome
            .messages
            .into_iter()
            .filter(|message| step.field_names().any(|name| name == message.field))
            .collect();
        if !step_messages.is_empty() {
            return Err(ApplicationServiceError::Validation(step_messages));
        }

        if let Some(tag) = &step.pre_flight {
            match self.pre_flight.get(tag) {
                Some(check) => check
                    .check(&application, &merged)
                    .map_err(ApplicationServiceError::PreFlight)?,
                None => {
                    warn!(tag = tag.as_str(), "no pre-flight check registered for step");
                }
            }
        }

        let progress = form.progress();
        let progress_state = if progress.is_complete {
            ProgressState::Complete
        } else {
            ProgressState::Pending
        };
        let saved = self
            .store
            .save_state(id, merged, progress_state, now)?;

        let next = form
            .pagination(section_slug, step_index)
            .map(|pagination| pagination.next)
            .unwrap_or(Page::Summary);

        Ok(SaveOutcome {
            application: saved,
            progress,
            next,
        })
    }
}
