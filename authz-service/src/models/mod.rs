pub mod audit_record;
pub mod membership;
pub mod permission;
pub mod role;

pub use audit_record::{AuditRecord, AuditRecordResponse};
pub use membership::Membership;
pub use permission::{OverrideAction, ResourceOverride, ResourceRef};
pub use role::{Role, RoleAssignment, ADMIN_ROLE_LEVEL, SUPER_ADMIN_ROLE_LEVEL};
