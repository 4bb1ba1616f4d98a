//! Asynchronous audit trail writer.
//!
//! Writes never block or fail the action being audited: the insert runs on a
//! spawned task, and a failed insert is logged loudly instead of propagated.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::audit::classify;
use crate::models::AuditRecord;
use crate::redact::{redact_object, SENSITIVE_FIELDS};
use crate::store::AuthzStore;

/// One audit event, before classification and redaction.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: String,
    pub organization_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub correlation_id: String,
    pub metadata: Value,
}

impl AuditEvent {
    pub fn new(event_type: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            organization_id: None,
            actor_id: None,
            resource_type: None,
            resource_id: None,
            correlation_id: correlation_id.into(),
            metadata: json!({}),
        }
    }

    pub fn organization(mut self, organization_id: Uuid) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuthzStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuthzStore>) -> Self {
        Self { store }
    }

    fn build_record(event: AuditEvent) -> AuditRecord {
        let classification = classify::classify(&event.event_type);
        let requires_alert = classify::requires_immediate_alert(&event.event_type);
        let redacted = redact_object(&event.metadata, SENSITIVE_FIELDS);
        AuditRecord::classified(
            event.correlation_id,
            event.organization_id,
            event.actor_id,
            event.event_type,
            event.resource_type,
            event.resource_id,
            redacted,
            classification,
            requires_alert,
        )
    }

    /// Classify, redact, and persist without waiting for the insert.
    pub fn log_async(&self, event: AuditEvent) {
        let store = Arc::clone(&self.store);
        let record = Self::build_record(event);
        tokio::spawn(async move {
            if record.requires_alert {
                tracing::warn!(
                    event_type = %record.event_type,
                    correlation_id = %record.correlation_id,
                    "security-relevant audit event"
                );
            }
            if let Err(e) = store.insert_audit_record(&record).await {
                tracing::error!(
                    event_type = %record.event_type,
                    correlation_id = %record.correlation_id,
                    error = %e,
                    "failed to persist audit record"
                );
            }
        });
    }

    /// Persist an event and wait for the write. Used where the caller needs
    /// the insert to have happened before returning, mostly in tests.
    pub async fn log(&self, event: AuditEvent) {
        let record = Self::build_record(event);
        if record.requires_alert {
            tracing::warn!(
                event_type = %record.event_type,
                correlation_id = %record.correlation_id,
                "security-relevant audit event"
            );
        }
        if let Err(e) = self.store.insert_audit_record(&record).await {
            tracing::error!(
                event_type = %record.event_type,
                correlation_id = %record.correlation_id,
                error = %e,
                "failed to persist audit record"
            );
        }
    }
}
