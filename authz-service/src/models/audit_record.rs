//! Audit record model - immutable compliance log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::audit::classify::{
    ComplianceLevel, DataClassification, EventCategory, EventMetadata, Severity,
};

/// A classified, redacted audit record.
///
/// Immutable once written: classification, retention, and redaction are
/// decided at creation time from the event type and never revisited.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditRecord {
    pub record_id: Uuid,
    pub correlation_id: String,
    pub organization_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub event_type: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    /// Redacted before persistence; must never contain raw PII.
    pub metadata: serde_json::Value,
    pub category: EventCategory,
    pub compliance_level: ComplianceLevel,
    pub data_classification: DataClassification,
    pub severity: Severity,
    pub retention_years: i16,
    /// Routed to real-time alerting by consumers that poll this flag.
    pub requires_alert: bool,
    pub created_utc: DateTime<Utc>,
}

impl AuditRecord {
    /// Build a record from an event and its derived classification.
    #[allow(clippy::too_many_arguments)]
    pub fn classified(
        correlation_id: impl Into<String>,
        organization_id: Option<Uuid>,
        actor_id: Option<Uuid>,
        event_type: impl Into<String>,
        resource_type: Option<String>,
        resource_id: Option<String>,
        metadata: serde_json::Value,
        classification: EventMetadata,
        requires_alert: bool,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            correlation_id: correlation_id.into(),
            organization_id,
            actor_id,
            event_type: event_type.into(),
            resource_type,
            resource_id,
            metadata,
            category: classification.category,
            compliance_level: classification.compliance_level,
            data_classification: classification.data_classification,
            severity: classification.severity,
            retention_years: classification.retention_years as i16,
            requires_alert,
            created_utc: Utc::now(),
        }
    }
}

/// Audit record response for API.
#[derive(Debug, Serialize)]
pub struct AuditRecordResponse {
    pub record_id: Uuid,
    pub correlation_id: String,
    pub organization_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub event_type: String,
    pub category: EventCategory,
    pub compliance_level: ComplianceLevel,
    pub severity: Severity,
    pub requires_alert: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<AuditRecord> for AuditRecordResponse {
    fn from(r: AuditRecord) -> Self {
        Self {
            record_id: r.record_id,
            correlation_id: r.correlation_id,
            organization_id: r.organization_id,
            actor_id: r.actor_id,
            event_type: r.event_type,
            category: r.category,
            compliance_level: r.compliance_level,
            severity: r.severity,
            requires_alert: r.requires_alert,
            created_utc: r.created_utc,
        }
    }
}
