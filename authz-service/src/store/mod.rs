//! Data access for the authorization core.
//!
//! The store is an explicitly passed handle, not a process-global client:
//! production wires [`PgStore`], tests wire [`MemoryStore`]. Lookup methods
//! are flat and batched so a permission check never degenerates into an
//! N+1 traversal of the role graph.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AuditRecord, Membership, OverrideAction, ResourceOverride, ResourceRef, Role, RoleAssignment,
};

/// Storage failure. Callers in the evaluation path must treat this as
/// "access could not be determined" and fail closed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Read/write surface over the role, permission, membership, override, and
/// audit tables.
#[async_trait]
pub trait AuthzStore: Send + Sync {
    // ==================== Membership ====================

    /// Whether an active membership row exists for (user, org).
    async fn membership_exists(&self, user_id: Uuid, org_id: Uuid) -> Result<bool, StoreError>;

    /// The user's default organization, if one is on file.
    async fn default_organization(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError>;

    // ==================== Roles ====================

    /// All roles the user holds, optionally filtered to one organization.
    async fn roles_for_user(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> Result<Vec<Role>, StoreError>;

    /// Batched role lookup, used for walking the hierarchy level by level.
    async fn roles_by_ids(&self, role_ids: &[Uuid]) -> Result<Vec<Role>, StoreError>;

    async fn role_by_slug(&self, slug: &str) -> Result<Option<Role>, StoreError>;

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError>;

    async fn insert_role_assignment(&self, assignment: &RoleAssignment) -> Result<(), StoreError>;

    async fn delete_role_assignment(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), StoreError>;

    // ==================== Permissions ====================

    /// Slugs granted directly to the user in this organization.
    async fn direct_permissions(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<HashSet<String>, StoreError>;

    /// Union of slugs granted to any of the given roles, in one query.
    async fn role_permissions(&self, role_ids: &[Uuid]) -> Result<HashSet<String>, StoreError>;

    async fn grant_user_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
    ) -> Result<(), StoreError>;

    async fn revoke_user_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
    ) -> Result<(), StoreError>;

    async fn grant_role_permission(&self, role_id: Uuid, slug: &str) -> Result<(), StoreError>;

    // ==================== Resource overrides ====================

    /// The override for this exact (user, org, slug, resource), if any.
    async fn resource_override(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
        resource: &ResourceRef,
    ) -> Result<Option<OverrideAction>, StoreError>;

    async fn upsert_resource_override(
        &self,
        override_row: &ResourceOverride,
    ) -> Result<(), StoreError>;

    async fn delete_resource_override(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
        resource: &ResourceRef,
    ) -> Result<(), StoreError>;

    // ==================== Audit ====================

    async fn insert_audit_record(&self, record: &AuditRecord) -> Result<(), StoreError>;

    /// Most recent audit records for one organization, newest first.
    async fn audit_records_for_org(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditRecord>, StoreError>;
}
