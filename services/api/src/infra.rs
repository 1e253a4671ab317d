//! Local adapters behind the engine's trait seams. Production deployments
//! swap these for the real CRM, object storage, scanner and mail provider;
//! the in-process versions keep local development and demos self-contained.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use apply_forms::expiry::{Delivery, EmailMessage, EmailTransport, TransportError};
use apply_forms::submission::{
    CrmAttachment, CrmClient, CrmError, CrmHealth, CrmReference, ExportedApplication, FileStorage,
    ScanError, ScanVerdict, StorageError, VirusScanner,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Prints reminder emails to the service log instead of sending them.
#[derive(Default)]
pub(crate) struct ConsoleEmailTransport;

impl EmailTransport for ConsoleEmailTransport {
    fn send(&self, message: &EmailMessage) -> Result<Delivery, TransportError> {
        info!(
            to = message.to.as_str(),
            subject = message.subject.as_str(),
            "reminder email (console transport)"
        );
        Ok(Delivery { delivered: true })
    }
}

/// Accepts every submission and hands back a sequential reference.
#[derive(Default)]
pub(crate) struct LocalCrmClient {
    counter: AtomicU64,
}

impl CrmClient for LocalCrmClient {
    fn authorize(&self) -> Result<String, CrmError> {
        Ok("local-token".to_string())
    }

    fn submit(&self, _token: &str, record: &ExportedApplication) -> Result<CrmReference, CrmError> {
        let serial = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            form_id = record.form_id.as_str(),
            submitted_by = record.submitted_by.as_str(),
            serial,
            "submission accepted (local crm)"
        );
        Ok(CrmReference(format!("LOCAL-{serial:06}")))
    }

    fn attach(
        &self,
        _token: &str,
        reference: &CrmReference,
        attachment: &CrmAttachment,
    ) -> Result<(), CrmError> {
        info!(
            reference = reference.0.as_str(),
            filename = attachment.filename.as_str(),
            bytes = attachment.bytes.len(),
            "attachment accepted (local crm)"
        );
        Ok(())
    }

    fn health_status(&self) -> Result<CrmHealth, CrmError> {
        Ok(CrmHealth {
            status: "ok".to_string(),
        })
    }
}

/// Keyed byte store standing in for object storage.
#[derive(Default)]
pub(crate) struct InMemoryFileStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl FileStorage for InMemoryFileStorage {
    fn upload(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().expect("file storage mutex poisoned");
        objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.lock().expect("file storage mutex poisoned");
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

/// Treats every file as clean. A real deployment wires ClamAV or similar.
#[derive(Default)]
pub(crate) struct PassthroughScanner;

impl VirusScanner for PassthroughScanner {
    fn scan(&self, _key: &str, _bytes: &[u8]) -> Result<ScanVerdict, ScanError> {
        Ok(ScanVerdict { is_infected: false })
    }
}
