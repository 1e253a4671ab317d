//! Concrete form definitions. Forms are defined in code, not by end users;
//! each definition is assembled once at startup and registered by id.

mod awards_for_all;

pub use awards_for_all::{awards_for_all, AWARDS_FOR_ALL_FORM_ID};

use super::form::FormRegistry;
use super::FormDefinitionError;

/// Registry holding every form the platform serves.
pub fn registry() -> Result<FormRegistry, FormDefinitionError> {
    Ok(FormRegistry::new().register(awards_for_all()?))
}
