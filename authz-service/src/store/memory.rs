//! In-memory store for tests.
//!
//! Mirrors the semantics of [`super::PgStore`] over plain collections.
//! `fail_ops` lets tests simulate a storage outage to exercise the
//! fail-closed paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::{AuthzStore, StoreError};
use crate::models::{
    AuditRecord, Membership, OverrideAction, ResourceOverride, ResourceRef, Role, RoleAssignment,
};

#[derive(Default)]
struct Tables {
    memberships: Vec<Membership>,
    roles: Vec<Role>,
    role_assignments: Vec<RoleAssignment>,
    user_permissions: Vec<(Uuid, Uuid, String)>,
    role_permissions: Vec<(Uuid, String)>,
    resource_overrides: Vec<ResourceOverride>,
    audit_records: Vec<AuditRecord>,
}

/// In-memory implementation of [`AuthzStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_ops: AtomicBool,
    fail_budget: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make lookups and audit writes return a backend error, to test
    /// fail-closed behavior.
    pub fn set_fail_ops(&self, fail: bool) {
        self.fail_ops.store(fail, Ordering::SeqCst);
    }

    /// Fail only the next `n` operations, then recover. Simulates a
    /// transient outage mid-request.
    pub fn fail_next_ops(&self, n: usize) {
        self.fail_budget.store(n, Ordering::SeqCst);
    }

    /// Audit records written so far, for assertions.
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.tables.read().unwrap().audit_records.clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let budgeted = self
            .fail_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if budgeted || self.fail_ops.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "simulated storage outage"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthzStore for MemoryStore {
    async fn membership_exists(&self, user_id: Uuid, org_id: Uuid) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self.tables.read().unwrap().memberships.iter().any(|m| {
            m.user_id == user_id && m.organization_id == org_id && m.active
        }))
    }

    async fn default_organization(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .unwrap()
            .memberships
            .iter()
            .find(|m| m.user_id == user_id && m.is_default && m.active)
            .map(|m| m.organization_id))
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        self.tables
            .write()
            .unwrap()
            .memberships
            .push(membership.clone());
        Ok(())
    }

    async fn roles_for_user(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> Result<Vec<Role>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().unwrap();
        let role_ids: HashSet<Uuid> = tables
            .role_assignments
            .iter()
            .filter(|a| a.user_id == user_id && org_id.map_or(true, |o| a.organization_id == o))
            .map(|a| a.role_id)
            .collect();
        Ok(tables
            .roles
            .iter()
            .filter(|r| role_ids.contains(&r.role_id))
            .cloned()
            .collect())
    }

    async fn roles_by_ids(&self, role_ids: &[Uuid]) -> Result<Vec<Role>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().unwrap();
        Ok(tables
            .roles
            .iter()
            .filter(|r| role_ids.contains(&r.role_id))
            .cloned()
            .collect())
    }

    async fn role_by_slug(&self, slug: &str) -> Result<Option<Role>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .unwrap()
            .roles
            .iter()
            .find(|r| r.slug == slug)
            .cloned())
    }

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        self.tables.write().unwrap().roles.push(role.clone());
        Ok(())
    }

    async fn insert_role_assignment(&self, assignment: &RoleAssignment) -> Result<(), StoreError> {
        self.tables
            .write()
            .unwrap()
            .role_assignments
            .push(assignment.clone());
        Ok(())
    }

    async fn delete_role_assignment(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), StoreError> {
        self.tables.write().unwrap().role_assignments.retain(|a| {
            !(a.user_id == user_id && a.organization_id == org_id && a.role_id == role_id)
        });
        Ok(())
    }

    async fn direct_permissions(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<HashSet<String>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .unwrap()
            .user_permissions
            .iter()
            .filter(|(u, o, _)| *u == user_id && *o == org_id)
            .map(|(_, _, slug)| slug.clone())
            .collect())
    }

    async fn role_permissions(&self, role_ids: &[Uuid]) -> Result<HashSet<String>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .unwrap()
            .role_permissions
            .iter()
            .filter(|(role_id, _)| role_ids.contains(role_id))
            .map(|(_, slug)| slug.clone())
            .collect())
    }

    async fn grant_user_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let row = (user_id, org_id, slug.to_string());
        if !tables.user_permissions.contains(&row) {
            tables.user_permissions.push(row);
        }
        Ok(())
    }

    async fn revoke_user_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .unwrap()
            .user_permissions
            .retain(|(u, o, s)| !(*u == user_id && *o == org_id && s == slug));
        Ok(())
    }

    async fn grant_role_permission(&self, role_id: Uuid, slug: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        let row = (role_id, slug.to_string());
        if !tables.role_permissions.contains(&row) {
            tables.role_permissions.push(row);
        }
        Ok(())
    }

    async fn resource_override(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
        resource: &ResourceRef,
    ) -> Result<Option<OverrideAction>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .unwrap()
            .resource_overrides
            .iter()
            .find(|o| {
                o.user_id == user_id
                    && o.organization_id == org_id
                    && o.permission_slug == slug
                    && o.resource_type == resource.resource_type
                    && o.resource_id == resource.resource_id
            })
            .map(|o| o.action))
    }

    async fn upsert_resource_override(
        &self,
        override_row: &ResourceOverride,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap();
        tables.resource_overrides.retain(|o| {
            !(o.user_id == override_row.user_id
                && o.organization_id == override_row.organization_id
                && o.permission_slug == override_row.permission_slug
                && o.resource_type == override_row.resource_type
                && o.resource_id == override_row.resource_id)
        });
        tables.resource_overrides.push(override_row.clone());
        Ok(())
    }

    async fn delete_resource_override(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
        resource: &ResourceRef,
    ) -> Result<(), StoreError> {
        self.tables.write().unwrap().resource_overrides.retain(|o| {
            !(o.user_id == user_id
                && o.organization_id == org_id
                && o.permission_slug == slug
                && o.resource_type == resource.resource_type
                && o.resource_id == resource.resource_id)
        });
        Ok(())
    }

    async fn insert_audit_record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.check_available()?;
        self.tables
            .write()
            .unwrap()
            .audit_records
            .push(record.clone());
        Ok(())
    }

    async fn audit_records_for_org(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .unwrap()
            .audit_records
            .iter()
            .filter(|r| r.organization_id == Some(org_id))
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
