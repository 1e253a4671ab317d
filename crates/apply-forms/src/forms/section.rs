use serde::{Deserialize, Serialize};

use super::step::StepDefinition;

/// Ordered group of steps with a URL-stable slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    pub slug: String,
    pub title: String,
    pub steps: Vec<StepDefinition>,
}

impl SectionDefinition {
    pub fn new(slug: &str, title: &str, steps: Vec<StepDefinition>) -> Self {
        Self {
            slug: slug.to_string(),
            title: title.to_string(),
            steps,
        }
    }
}
