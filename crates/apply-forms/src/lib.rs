//! Grant application form engine.
//!
//! The crate is organised around three concerns: a declarative form model
//! (`forms`) whose conditional validation rules are data interpreted against
//! the current answer-set, durable in-progress application state
//! (`applications`), and the two workflows that act on that state over time:
//! expiry reminders (`expiry`) and the exactly-once submission pipeline
//! (`submission`).

pub mod applications;
pub mod config;
pub mod error;
pub mod expiry;
pub mod forms;
pub mod submission;
pub mod telemetry;
