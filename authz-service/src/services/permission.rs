//! Permission evaluation and RBAC administration.
//!
//! Evaluation precedence, first match wins:
//! 1. resource-scoped override for the exact resource
//! 2. direct user grant
//! 3. grant on any held role, including roles inherited through the
//!    hierarchy (a child role carries everything its ancestors grant)
//! 4. deny
//!
//! Store failures fail closed: the caller gets `PermissionCheck`, never a
//! grant. Effective permission sets are cached per (user, org) and
//! invalidated on every mutation that could change them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLogger};
use crate::models::{OverrideAction, ResourceOverride, ResourceRef, RoleAssignment};
use crate::store::{AuthzStore, StoreError};

/// Permission required to administer roles, grants, and overrides.
pub const RBAC_MANAGE: &str = "rbac.manage";

/// Cached effective permission slugs, keyed by (user, org).
///
/// Never authoritative: any entry can be dropped at any time and rebuilt
/// from the store.
#[derive(Default)]
pub struct PermissionCache {
    entries: DashMap<(Uuid, Uuid), Arc<HashSet<String>>>,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, user_id: Uuid, org_id: Uuid) -> Option<Arc<HashSet<String>>> {
        self.entries
            .get(&(user_id, org_id))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn insert(&self, user_id: Uuid, org_id: Uuid, slugs: Arc<HashSet<String>>) {
        self.entries.insert((user_id, org_id), slugs);
    }

    /// Drop the snapshot for one (user, org).
    pub fn invalidate(&self, user_id: Uuid, org_id: Uuid) {
        self.entries.remove(&(user_id, org_id));
    }

    /// Drop every snapshot. Used when a role-level mutation may affect an
    /// unknown set of users.
    pub fn clear(&self) {
        self.entries.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn AuthzStore>,
    cache: Arc<PermissionCache>,
    audit: AuditLogger,
}

fn check_failed(e: StoreError) -> AppError {
    AppError::PermissionCheck(e.into())
}

impl PermissionService {
    pub fn new(store: Arc<dyn AuthzStore>, audit: AuditLogger) -> Self {
        Self {
            store,
            cache: Arc::new(PermissionCache::new()),
            audit,
        }
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Every role id the user effectively holds in the org: assigned roles
    /// plus everything reachable through `parent_role_id`.
    ///
    /// Walks the hierarchy one batched query per level; a visited set makes
    /// a cycle terminate instead of looping.
    async fn effective_role_ids(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<Vec<Uuid>, StoreError> {
        let assigned = self.store.roles_for_user(user_id, Some(org_id)).await?;

        let mut visited: HashSet<Uuid> = assigned.iter().map(|r| r.role_id).collect();
        let mut frontier: Vec<Uuid> = assigned
            .iter()
            .filter_map(|r| r.parent_role_id)
            .filter(|id| visited.insert(*id))
            .collect();

        while !frontier.is_empty() {
            let parents = self.store.roles_by_ids(&frontier).await?;
            frontier = parents
                .iter()
                .filter_map(|r| r.parent_role_id)
                .filter(|id| visited.insert(*id))
                .collect();
        }

        Ok(visited.into_iter().collect())
    }

    /// Union of direct grants and role grants, from cache when warm.
    async fn effective_permissions(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<Arc<HashSet<String>>, StoreError> {
        if let Some(cached) = self.cache.get(user_id, org_id) {
            return Ok(cached);
        }

        let mut slugs = self.store.direct_permissions(user_id, org_id).await?;
        let role_ids = self.effective_role_ids(user_id, org_id).await?;
        if !role_ids.is_empty() {
            slugs.extend(self.store.role_permissions(&role_ids).await?);
        }

        let slugs = Arc::new(slugs);
        self.cache.insert(user_id, org_id, Arc::clone(&slugs));
        Ok(slugs)
    }

    /// Evaluate one permission. `resource` narrows the check to a specific
    /// resource, letting a stored override win in either direction.
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
        resource: Option<&ResourceRef>,
    ) -> Result<bool, AppError> {
        if let Some(resource) = resource {
            let override_action = self
                .store
                .resource_override(user_id, org_id, slug, resource)
                .await
                .map_err(check_failed)?;
            match override_action {
                Some(OverrideAction::Allow) => return Ok(true),
                Some(OverrideAction::Deny) => return Ok(false),
                None => {}
            }
        }

        let slugs = self
            .effective_permissions(user_id, org_id)
            .await
            .map_err(check_failed)?;
        Ok(slugs.contains(slug))
    }

    /// Like [`check_permission`] but a denial becomes an error, and is
    /// audited.
    ///
    /// [`check_permission`]: PermissionService::check_permission
    pub async fn require_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
        resource: Option<&ResourceRef>,
        correlation_id: &str,
    ) -> Result<(), AppError> {
        if self
            .check_permission(user_id, org_id, slug, resource)
            .await?
        {
            return Ok(());
        }

        self.audit.log_async(
            AuditEvent::new("RBAC_PERMISSION_DENIED", correlation_id)
                .organization(org_id)
                .actor(user_id)
                .metadata(json!({ "permission": slug })),
        );
        Err(AppError::PermissionDenied(format!(
            "missing permission: {slug}"
        )))
    }

    /// Succeeds if the user holds at least one of the slugs. A denial
    /// reports the whole set, since no single slug was the blocker.
    ///
    /// A per-slug evaluation error is held back until every slug has been
    /// tried, so a grantable slug later in the set still succeeds.
    pub async fn require_any(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slugs: &[&str],
        correlation_id: &str,
    ) -> Result<(), AppError> {
        let mut deferred = None;
        for slug in slugs {
            match self.check_permission(user_id, org_id, slug, None).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => {
                    deferred.get_or_insert(e);
                }
            }
        }
        if let Some(e) = deferred {
            return Err(e);
        }

        self.audit.log_async(
            AuditEvent::new("RBAC_PERMISSION_DENIED", correlation_id)
                .organization(org_id)
                .actor(user_id)
                .metadata(json!({ "permissions_any_of": slugs })),
        );
        Err(AppError::PermissionDenied(format!(
            "missing any of permissions: {}",
            slugs.join(", ")
        )))
    }

    /// Succeeds only if the user holds every slug. Stops at the first
    /// failure and names that slug.
    pub async fn require_all(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slugs: &[&str],
        correlation_id: &str,
    ) -> Result<(), AppError> {
        for slug in slugs {
            self.require_permission(user_id, org_id, slug, None, correlation_id)
                .await?;
        }
        Ok(())
    }

    // ==================== Administration ====================
    //
    // Every mutation is gated on `rbac.manage`, invalidates the affected
    // cache entries, and leaves an audit trail.

    pub async fn assign_role(
        &self,
        actor_id: Uuid,
        org_id: Uuid,
        user_id: Uuid,
        role_slug: &str,
        correlation_id: &str,
    ) -> Result<(), AppError> {
        self.require_permission(actor_id, org_id, RBAC_MANAGE, None, correlation_id)
            .await?;

        let role = self
            .store
            .role_by_slug(role_slug)
            .await
            .map_err(check_failed)?
            .ok_or_else(|| AppError::NotFound(format!("role not found: {role_slug}")))?;

        self.store
            .insert_role_assignment(&RoleAssignment {
                assignment_id: Uuid::new_v4(),
                user_id,
                organization_id: org_id,
                role_id: role.role_id,
                created_utc: Utc::now(),
            })
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        self.cache.invalidate(user_id, org_id);
        self.audit.log_async(
            AuditEvent::new("RBAC_ROLE_ASSIGNED", correlation_id)
                .organization(org_id)
                .actor(actor_id)
                .resource("user", user_id.to_string())
                .metadata(json!({ "role": role_slug })),
        );
        Ok(())
    }

    pub async fn remove_role(
        &self,
        actor_id: Uuid,
        org_id: Uuid,
        user_id: Uuid,
        role_slug: &str,
        correlation_id: &str,
    ) -> Result<(), AppError> {
        self.require_permission(actor_id, org_id, RBAC_MANAGE, None, correlation_id)
            .await?;

        let role = self
            .store
            .role_by_slug(role_slug)
            .await
            .map_err(check_failed)?
            .ok_or_else(|| AppError::NotFound(format!("role not found: {role_slug}")))?;

        self.store
            .delete_role_assignment(user_id, org_id, role.role_id)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        self.cache.invalidate(user_id, org_id);
        self.audit.log_async(
            AuditEvent::new("RBAC_ROLE_REMOVED", correlation_id)
                .organization(org_id)
                .actor(actor_id)
                .resource("user", user_id.to_string())
                .metadata(json!({ "role": role_slug })),
        );
        Ok(())
    }

    pub async fn grant_permission(
        &self,
        actor_id: Uuid,
        org_id: Uuid,
        user_id: Uuid,
        slug: &str,
        correlation_id: &str,
    ) -> Result<(), AppError> {
        self.require_permission(actor_id, org_id, RBAC_MANAGE, None, correlation_id)
            .await?;

        self.store
            .grant_user_permission(user_id, org_id, slug)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        self.cache.invalidate(user_id, org_id);
        self.audit.log_async(
            AuditEvent::new("RBAC_PERMISSION_GRANTED", correlation_id)
                .organization(org_id)
                .actor(actor_id)
                .resource("user", user_id.to_string())
                .metadata(json!({ "permission": slug })),
        );
        Ok(())
    }

    pub async fn revoke_permission(
        &self,
        actor_id: Uuid,
        org_id: Uuid,
        user_id: Uuid,
        slug: &str,
        correlation_id: &str,
    ) -> Result<(), AppError> {
        self.require_permission(actor_id, org_id, RBAC_MANAGE, None, correlation_id)
            .await?;

        self.store
            .revoke_user_permission(user_id, org_id, slug)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        self.cache.invalidate(user_id, org_id);
        self.audit.log_async(
            AuditEvent::new("RBAC_PERMISSION_REVOKED", correlation_id)
                .organization(org_id)
                .actor(actor_id)
                .resource("user", user_id.to_string())
                .metadata(json!({ "permission": slug })),
        );
        Ok(())
    }

    /// Grant a permission to a role. Affects an unknown set of users, so
    /// the whole cache is dropped.
    pub async fn grant_role_permission(
        &self,
        actor_id: Uuid,
        org_id: Uuid,
        role_slug: &str,
        slug: &str,
        correlation_id: &str,
    ) -> Result<(), AppError> {
        self.require_permission(actor_id, org_id, RBAC_MANAGE, None, correlation_id)
            .await?;

        let role = self
            .store
            .role_by_slug(role_slug)
            .await
            .map_err(check_failed)?
            .ok_or_else(|| AppError::NotFound(format!("role not found: {role_slug}")))?;

        self.store
            .grant_role_permission(role.role_id, slug)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        self.cache.clear();
        self.audit.log_async(
            AuditEvent::new("RBAC_PERMISSION_GRANTED", correlation_id)
                .organization(org_id)
                .actor(actor_id)
                .resource("role", role_slug)
                .metadata(json!({ "permission": slug })),
        );
        Ok(())
    }

    pub async fn set_resource_override(
        &self,
        actor_id: Uuid,
        org_id: Uuid,
        user_id: Uuid,
        slug: &str,
        resource: &ResourceRef,
        action: OverrideAction,
        correlation_id: &str,
    ) -> Result<(), AppError> {
        self.require_permission(actor_id, org_id, RBAC_MANAGE, None, correlation_id)
            .await?;

        self.store
            .upsert_resource_override(&ResourceOverride::new(
                user_id,
                org_id,
                slug,
                resource.clone(),
                action,
                actor_id,
            ))
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        self.cache.invalidate(user_id, org_id);
        self.audit.log_async(
            AuditEvent::new("RBAC_OVERRIDE_SET", correlation_id)
                .organization(org_id)
                .actor(actor_id)
                .resource(resource.resource_type.clone(), resource.resource_id.clone())
                .metadata(json!({
                    "permission": slug,
                    "subject": user_id,
                    "action": action,
                })),
        );
        Ok(())
    }

    pub async fn remove_resource_override(
        &self,
        actor_id: Uuid,
        org_id: Uuid,
        user_id: Uuid,
        slug: &str,
        resource: &ResourceRef,
        correlation_id: &str,
    ) -> Result<(), AppError> {
        self.require_permission(actor_id, org_id, RBAC_MANAGE, None, correlation_id)
            .await?;

        self.store
            .delete_resource_override(user_id, org_id, slug, resource)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        self.cache.invalidate(user_id, org_id);
        self.audit.log_async(
            AuditEvent::new("RBAC_OVERRIDE_REMOVED", correlation_id)
                .organization(org_id)
                .actor(actor_id)
                .resource(resource.resource_type.clone(), resource.resource_id.clone())
                .metadata(json!({ "permission": slug, "subject": user_id })),
        );
        Ok(())
    }
}
