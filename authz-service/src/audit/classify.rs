//! Audit event classification.
//!
//! Maps a raw event-type tag to its compliance metadata. Classification is
//! deterministic, total, and happens exactly once, when the event is written;
//! retention and redaction decisions are never reinterpreted later.

use serde::{Deserialize, Serialize};

/// Functional category of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "event_category", rename_all = "snake_case")]
pub enum EventCategory {
    Authentication,
    Authorization,
    DataAccess,
    DataModification,
    AdminAction,
    SecurityEvent,
    AiUsage,
}

/// How strictly the event is handled for compliance reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "compliance_level", rename_all = "snake_case")]
pub enum ComplianceLevel {
    Low,
    Standard,
    High,
    Critical,
}

/// Sensitivity of the data the event may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "data_classification", rename_all = "snake_case")]
pub enum DataClassification {
    Public,
    Internal,
    Confidential,
    Restricted,
}

/// Log severity attached to the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "severity", rename_all = "snake_case")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Compliance metadata derived from an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub category: EventCategory,
    pub compliance_level: ComplianceLevel,
    pub data_classification: DataClassification,
    pub severity: Severity,
    pub retention_years: u8,
}

/// Export and bulk-download events are maximally sensitive regardless of
/// what was exported.
const EXPORT_EVENTS: &[&str] = &[
    "DATA_EXPORT_CSV",
    "DATA_EXPORT_JSON",
    "DATA_EXPORT_PDF",
    "DATA_BULK_DOWNLOAD",
];

/// Event types that route to real-time alerting, independent of the
/// storage-retention classification.
const ALERT_EVENTS: &[&str] = &[
    "AUTH_LOGIN_FAILURE",
    "RBAC_PERMISSION_DENIED",
    "AI_QUOTA_EXCEEDED",
    "AI_CONTENT_BLOCKED",
    "SECURITY_ANOMALY_DETECTED",
    "SECURITY_SUSPICIOUS_ACTIVITY",
    "SECURITY_ACCESS_DENIED",
    "SECURITY_IP_BLOCKED",
];

/// Classify an event type into its compliance metadata.
///
/// Total over all inputs: unrecognized event types get a safe default
/// rather than an error.
pub fn classify(event_type: &str) -> EventMetadata {
    if event_type.starts_with("AUTH_") {
        let is_failure = event_type.contains("FAILURE");
        return EventMetadata {
            category: EventCategory::Authentication,
            compliance_level: if is_failure {
                ComplianceLevel::Critical
            } else {
                ComplianceLevel::High
            },
            data_classification: DataClassification::Confidential,
            severity: if is_failure {
                Severity::Warning
            } else {
                Severity::Info
            },
            // Regulatory minimum for authentication trails.
            retention_years: 7,
        };
    }

    if event_type.starts_with("RBAC_") {
        let is_denial = event_type.contains("DENIED");
        return EventMetadata {
            category: EventCategory::Authorization,
            compliance_level: if is_denial {
                ComplianceLevel::High
            } else {
                ComplianceLevel::Standard
            },
            data_classification: DataClassification::Confidential,
            severity: if is_denial {
                Severity::Warning
            } else {
                Severity::Info
            },
            retention_years: 7,
        };
    }

    if EXPORT_EVENTS.contains(&event_type) {
        return EventMetadata {
            category: EventCategory::DataAccess,
            compliance_level: ComplianceLevel::Critical,
            data_classification: DataClassification::Restricted,
            severity: Severity::Info,
            retention_years: 7,
        };
    }

    if event_type.starts_with("DATA_") {
        let is_delete = event_type.contains("DELETE") || event_type.contains("PURGE");
        let is_mutation = is_delete || event_type.contains("UPDATE");
        return EventMetadata {
            category: if is_mutation {
                EventCategory::DataModification
            } else {
                EventCategory::DataAccess
            },
            compliance_level: if is_delete {
                ComplianceLevel::High
            } else {
                ComplianceLevel::Standard
            },
            data_classification: DataClassification::Internal,
            severity: Severity::Info,
            retention_years: if is_delete { 7 } else { 3 },
        };
    }

    if event_type.starts_with("AI_") {
        let quota_exceeded = event_type.contains("QUOTA_EXCEEDED");
        return EventMetadata {
            category: EventCategory::AiUsage,
            compliance_level: if quota_exceeded {
                ComplianceLevel::High
            } else {
                ComplianceLevel::Standard
            },
            data_classification: DataClassification::Internal,
            severity: if quota_exceeded {
                Severity::Warning
            } else {
                Severity::Info
            },
            retention_years: 3,
        };
    }

    if event_type.starts_with("ADMIN_") {
        return EventMetadata {
            category: EventCategory::AdminAction,
            compliance_level: ComplianceLevel::High,
            data_classification: DataClassification::Confidential,
            severity: Severity::Info,
            retention_years: 7,
        };
    }

    if event_type.starts_with("SECURITY_") {
        return EventMetadata {
            category: EventCategory::SecurityEvent,
            compliance_level: ComplianceLevel::Critical,
            data_classification: DataClassification::Restricted,
            severity: Severity::Warning,
            retention_years: 7,
        };
    }

    // Safe default for unrecognized tags.
    EventMetadata {
        category: EventCategory::DataAccess,
        compliance_level: ComplianceLevel::Standard,
        data_classification: DataClassification::Internal,
        severity: Severity::Info,
        retention_years: 3,
    }
}

/// Whether an event type must be routed to real-time alerting.
///
/// A fixed allow-list; anything else, including unrecognized types,
/// returns false.
pub fn requires_immediate_alert(event_type: &str) -> bool {
    ALERT_EVENTS.contains(&event_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_is_critical() {
        let meta = classify("AUTH_LOGIN_FAILURE");
        assert_eq!(meta.category, EventCategory::Authentication);
        assert_eq!(meta.compliance_level, ComplianceLevel::Critical);
        assert_eq!(meta.severity, Severity::Warning);
        assert_eq!(meta.retention_years, 7);
    }

    #[test]
    fn auth_success_is_high() {
        let meta = classify("AUTH_LOGIN_SUCCESS");
        assert_eq!(meta.compliance_level, ComplianceLevel::High);
        assert_eq!(meta.severity, Severity::Info);
    }

    #[test]
    fn rbac_denial_escalates() {
        let denied = classify("RBAC_PERMISSION_DENIED");
        assert_eq!(denied.category, EventCategory::Authorization);
        assert_eq!(denied.compliance_level, ComplianceLevel::High);
        assert_eq!(denied.severity, Severity::Warning);

        let granted = classify("RBAC_PERMISSION_GRANTED");
        assert_eq!(granted.compliance_level, ComplianceLevel::Standard);
        assert_eq!(granted.retention_years, 7);
    }

    #[test]
    fn exports_are_always_critical_restricted() {
        for event in ["DATA_EXPORT_CSV", "DATA_EXPORT_JSON", "DATA_EXPORT_PDF", "DATA_BULK_DOWNLOAD"] {
            let meta = classify(event);
            assert_eq!(meta.compliance_level, ComplianceLevel::Critical, "{event}");
            assert_eq!(meta.data_classification, DataClassification::Restricted, "{event}");
            assert_eq!(meta.retention_years, 7, "{event}");
        }
    }

    #[test]
    fn data_delete_and_purge_keep_seven_years() {
        for event in ["DATA_DELETE", "DATA_BULK_DELETE", "DATA_PURGE"] {
            let meta = classify(event);
            assert_eq!(meta.category, EventCategory::DataModification, "{event}");
            assert_eq!(meta.compliance_level, ComplianceLevel::High, "{event}");
            assert_eq!(meta.retention_years, 7, "{event}");
        }

        let view = classify("DATA_VIEW");
        assert_eq!(view.category, EventCategory::DataAccess);
        assert_eq!(view.retention_years, 3);
    }

    #[test]
    fn ai_quota_exceeded_bumps_severity() {
        let meta = classify("AI_QUOTA_EXCEEDED");
        assert_eq!(meta.compliance_level, ComplianceLevel::High);
        assert_eq!(meta.severity, Severity::Warning);
        assert_eq!(meta.retention_years, 3);

        let chat = classify("AI_CHAT_REQUEST");
        assert_eq!(chat.compliance_level, ComplianceLevel::Standard);
    }

    #[test]
    fn admin_and_security_events() {
        let admin = classify("ADMIN_CONFIG_CHANGED");
        assert_eq!(admin.category, EventCategory::AdminAction);
        assert_eq!(admin.compliance_level, ComplianceLevel::High);
        assert_eq!(admin.retention_years, 7);

        let security = classify("SECURITY_ANOMALY_DETECTED");
        assert_eq!(security.category, EventCategory::SecurityEvent);
        assert_eq!(security.compliance_level, ComplianceLevel::Critical);
        assert_eq!(security.data_classification, DataClassification::Restricted);
        assert_eq!(security.severity, Severity::Warning);
    }

    #[test]
    fn unrecognized_event_gets_safe_default() {
        let meta = classify("SOMETHING_NEW_ENTIRELY");
        assert_eq!(meta.category, EventCategory::DataAccess);
        assert_eq!(meta.compliance_level, ComplianceLevel::Standard);
        assert_eq!(meta.data_classification, DataClassification::Internal);
        assert_eq!(meta.severity, Severity::Info);
        assert_eq!(meta.retention_years, 3);

        // Total over edge cases too.
        let _ = classify("");
        let _ = classify("AUTH_");
    }

    #[test]
    fn alert_allow_list_is_exact() {
        let allowed = [
            "AUTH_LOGIN_FAILURE",
            "RBAC_PERMISSION_DENIED",
            "AI_QUOTA_EXCEEDED",
            "AI_CONTENT_BLOCKED",
            "SECURITY_ANOMALY_DETECTED",
            "SECURITY_SUSPICIOUS_ACTIVITY",
            "SECURITY_ACCESS_DENIED",
            "SECURITY_IP_BLOCKED",
        ];
        for event in allowed {
            assert!(requires_immediate_alert(event), "{event}");
        }
        for event in ["AUTH_LOGIN_SUCCESS", "SECURITY_CERTIFICATE_RENEWED", "DATA_PURGE", "", "junk"] {
            assert!(!requires_immediate_alert(event), "{event}");
        }
    }

    #[test]
    fn classification_is_deterministic() {
        for event in ["AUTH_LOGIN_FAILURE", "DATA_EXPORT_CSV", "unknown"] {
            assert_eq!(classify(event), classify(event));
        }
    }
}
