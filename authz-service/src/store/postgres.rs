//! PostgreSQL store backed by sqlx.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::{AuthzStore, StoreError};
use crate::models::{
    AuditRecord, Membership, OverrideAction, ResourceOverride, ResourceRef, Role, RoleAssignment,
};

/// PostgreSQL-backed store. Cheap to clone; wraps a connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!(e)))?;
        Ok(())
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow::anyhow!(e))
}

#[async_trait]
impl AuthzStore for PgStore {
    async fn membership_exists(&self, user_id: Uuid, org_id: Uuid) -> Result<bool, StoreError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT membership_id FROM memberships
             WHERE user_id = $1 AND organization_id = $2 AND active",
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.is_some())
    }

    async fn default_organization(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT organization_id FROM memberships
             WHERE user_id = $1 AND is_default AND active
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(|(org_id,)| org_id))
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO memberships (membership_id, user_id, organization_id, is_default, active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(membership.membership_id)
        .bind(membership.user_id)
        .bind(membership.organization_id)
        .bind(membership.is_default)
        .bind(membership.active)
        .bind(membership.created_utc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn roles_for_user(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> Result<Vec<Role>, StoreError> {
        // One join, not a per-assignment traversal.
        let roles = match org_id {
            Some(org_id) => {
                sqlx::query_as::<_, Role>(
                    r#"
                    SELECT r.role_id, r.slug, r.level, r.parent_role_id, r.created_utc
                    FROM role_assignments ra
                    JOIN roles r ON r.role_id = ra.role_id
                    WHERE ra.user_id = $1 AND ra.organization_id = $2
                    "#,
                )
                .bind(user_id)
                .bind(org_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Role>(
                    r#"
                    SELECT DISTINCT r.role_id, r.slug, r.level, r.parent_role_id, r.created_utc
                    FROM role_assignments ra
                    JOIN roles r ON r.role_id = ra.role_id
                    WHERE ra.user_id = $1
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
        };
        roles.map_err(backend)
    }

    async fn roles_by_ids(&self, role_ids: &[Uuid]) -> Result<Vec<Role>, StoreError> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Role>(
            "SELECT role_id, slug, level, parent_role_id, created_utc
             FROM roles WHERE role_id = ANY($1)",
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }

    async fn role_by_slug(&self, slug: &str) -> Result<Option<Role>, StoreError> {
        sqlx::query_as::<_, Role>(
            "SELECT role_id, slug, level, parent_role_id, created_utc
             FROM roles WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO roles (role_id, slug, level, parent_role_id, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(role.role_id)
        .bind(&role.slug)
        .bind(role.level)
        .bind(role.parent_role_id)
        .bind(role.created_utc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn insert_role_assignment(&self, assignment: &RoleAssignment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO role_assignments (assignment_id, user_id, organization_id, role_id, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(assignment.assignment_id)
        .bind(assignment.user_id)
        .bind(assignment.organization_id)
        .bind(assignment.role_id)
        .bind(assignment.created_utc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn delete_role_assignment(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM role_assignments
             WHERE user_id = $1 AND organization_id = $2 AND role_id = $3",
        )
        .bind(user_id)
        .bind(org_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn direct_permissions(
        &self,
        user_id: Uuid,
        org_id: Uuid,
    ) -> Result<HashSet<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT permission_slug FROM user_permissions
             WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }

    async fn role_permissions(&self, role_ids: &[Uuid]) -> Result<HashSet<String>, StoreError> {
        if role_ids.is_empty() {
            return Ok(HashSet::new());
        }
        // Flat batched query over all roles at once.
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT permission_slug FROM role_permissions
             WHERE role_id = ANY($1)",
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }

    async fn grant_user_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, organization_id, permission_slug)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(org_id)
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn revoke_user_permission(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM user_permissions
             WHERE user_id = $1 AND organization_id = $2 AND permission_slug = $3",
        )
        .bind(user_id)
        .bind(org_id)
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn grant_role_permission(&self, role_id: Uuid, slug: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_slug)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn resource_override(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
        resource: &ResourceRef,
    ) -> Result<Option<OverrideAction>, StoreError> {
        let row: Option<(OverrideAction,)> = sqlx::query_as(
            r#"
            SELECT action FROM resource_overrides
            WHERE user_id = $1 AND organization_id = $2 AND permission_slug = $3
              AND resource_type = $4 AND resource_id = $5
            "#,
        )
        .bind(user_id)
        .bind(org_id)
        .bind(slug)
        .bind(&resource.resource_type)
        .bind(&resource.resource_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(|(action,)| action))
    }

    async fn upsert_resource_override(
        &self,
        override_row: &ResourceOverride,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO resource_overrides
                (override_id, user_id, organization_id, permission_slug,
                 resource_type, resource_id, action, granted_by, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, organization_id, permission_slug, resource_type, resource_id)
            DO UPDATE SET action = EXCLUDED.action, granted_by = EXCLUDED.granted_by
            "#,
        )
        .bind(override_row.override_id)
        .bind(override_row.user_id)
        .bind(override_row.organization_id)
        .bind(&override_row.permission_slug)
        .bind(&override_row.resource_type)
        .bind(&override_row.resource_id)
        .bind(override_row.action)
        .bind(override_row.granted_by)
        .bind(override_row.created_utc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn delete_resource_override(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        slug: &str,
        resource: &ResourceRef,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM resource_overrides
            WHERE user_id = $1 AND organization_id = $2 AND permission_slug = $3
              AND resource_type = $4 AND resource_id = $5
            "#,
        )
        .bind(user_id)
        .bind(org_id)
        .bind(slug)
        .bind(&resource.resource_type)
        .bind(&resource.resource_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn insert_audit_record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_records
                (record_id, correlation_id, organization_id, actor_id, event_type,
                 resource_type, resource_id, metadata, category, compliance_level,
                 data_classification, severity, retention_years, requires_alert, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.record_id)
        .bind(&record.correlation_id)
        .bind(record.organization_id)
        .bind(record.actor_id)
        .bind(&record.event_type)
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(&record.metadata)
        .bind(record.category)
        .bind(record.compliance_level)
        .bind(record.data_classification)
        .bind(record.severity)
        .bind(record.retention_years)
        .bind(record.requires_alert)
        .bind(record.created_utc)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn audit_records_for_org(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        sqlx::query_as::<_, AuditRecord>(
            r#"
            SELECT record_id, correlation_id, organization_id, actor_id, event_type,
                   resource_type, resource_id, metadata, category, compliance_level,
                   data_classification, severity, retention_years, requires_alert, created_utc
            FROM audit_records
            WHERE organization_id = $1
            ORDER BY created_utc DESC
            LIMIT $2
            "#,
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }
}
