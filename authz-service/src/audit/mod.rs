//! Audit event classification and persistence.

pub mod classify;
pub mod logger;

pub use classify::{classify, requires_immediate_alert, EventMetadata};
pub use logger::{AuditEvent, AuditLogger};
