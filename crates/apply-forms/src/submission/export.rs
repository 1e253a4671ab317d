//! Pure transform from a validated form to the external system's schema.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::applications::domain::PendingApplication;
use crate::forms::Form;

/// One file attachment referenced by the exported record. Storage keys
/// follow `"<formId>/<applicationId>/<filename>"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentRef {
    pub field: String,
    pub storage_key: String,
    pub filename: String,
    pub content_type: String,
}

/// The record handed to the external system of record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedApplication {
    pub form_id: String,
    pub schema_version: u32,
    pub environment: String,
    pub submitted_by: String,
    pub started_at: DateTime<Utc>,
    pub answers: Value,
    pub attachments: Vec<AttachmentRef>,
}

/// Export the form under its current answers. Inapplicable fields have
/// already been stripped by validation; only the validated value set leaves
/// the building.
pub fn export(
    form: &Form<'_>,
    application: &PendingApplication,
    environment: &str,
) -> ExportedApplication {
    let validated = form.validate();

    let attachments = form
        .definition
        .file_fields()
        .filter_map(|field| {
            let value = validated.value.get(&field.name)?;
            let filename = value.get("filename")?.as_str()?;
            let content_type = value
                .get("contentType")
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream");
            Some(AttachmentRef {
                field: field.name.clone(),
                storage_key: format!("{}/{}/{}", application.form_id, application.id, filename),
                filename: filename.to_string(),
                content_type: content_type.to_string(),
            })
        })
        .collect();

    ExportedApplication {
        form_id: application.form_id.0.clone(),
        schema_version: form.definition.schema_version,
        environment: environment.to_string(),
        submitted_by: application.user_id.0.clone(),
        started_at: application.created_at,
        answers: Value::Object(validated.value.into_iter().collect()),
        attachments,
    }
}
