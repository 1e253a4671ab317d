//! Pending-application lifecycle: start, step-by-step save, dashboard
//! listings, deletion, and the HTTP surface over them.
//!
//! The raw answer-set is persisted as-is between saves, so it may be
//! momentarily invalid mid-edit; validity is always re-derived from the form
//! definition, never trusted from storage.

pub mod domain;
pub mod memory;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, EmailQueueEntry, EmailStatus, PendingApplication, ProgressState,
    SubmittedApplication, UserId,
};
pub use memory::{InMemoryEmailQueue, InMemoryPendingStore, InMemorySubmittedStore};
pub use router::{application_router, ApplicationRouterState, ApplicationView};
pub use service::{
    ApplicationService, ApplicationServiceError, PreFlightCheck, PreFlightFailure, SaveOutcome,
};
pub use store::{
    EmailQueueStore, PendingApplicationStore, StoreError, SubmittedApplicationStore,
};
