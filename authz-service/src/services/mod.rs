//! Business services: org context, permission evaluation, admin checks.

pub mod admin;
pub mod org_context;
pub mod permission;

pub use admin::AdminService;
pub use org_context::{OrgContext, OrgContextResolver, OrgHint};
pub use permission::{PermissionService, RBAC_MANAGE};
