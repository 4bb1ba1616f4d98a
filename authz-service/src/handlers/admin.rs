//! RBAC administration handlers.
//!
//! Every endpoint here runs as the authenticated caller; the permission
//! service gates each mutation on `rbac.manage` and writes the audit trail.

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use service_core::{error::AppError, middleware::correlation::CorrelationId};
use uuid::Uuid;

use crate::middleware::UserId;
use crate::models::{AuditRecordResponse, OverrideAction, ResourceRef};
use crate::services::{OrgContext, RBAC_MANAGE};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct PermissionChangeRequest {
    pub user_id: Uuid,
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct RolePermissionRequest {
    pub role: String,
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub user_id: Uuid,
    pub permission: String,
    pub resource: ResourceRef,
    /// Required when setting; ignored on removal.
    pub action: Option<OverrideAction>,
}

#[derive(Debug, Serialize)]
pub struct AdminAck {
    pub ok: bool,
}

const ACK: AdminAck = AdminAck { ok: true };

/// POST /admin/roles/assign
pub async fn assign_role(
    State(state): State<AppState>,
    UserId(actor): UserId,
    org: OrgContext,
    correlation: CorrelationId,
    Json(req): Json<RoleChangeRequest>,
) -> Result<Json<AdminAck>, AppError> {
    state
        .permissions
        .assign_role(actor, org.organization_id, req.user_id, &req.role, &correlation.0)
        .await?;
    Ok(Json(ACK))
}

/// POST /admin/roles/remove
pub async fn remove_role(
    State(state): State<AppState>,
    UserId(actor): UserId,
    org: OrgContext,
    correlation: CorrelationId,
    Json(req): Json<RoleChangeRequest>,
) -> Result<Json<AdminAck>, AppError> {
    state
        .permissions
        .remove_role(actor, org.organization_id, req.user_id, &req.role, &correlation.0)
        .await?;
    Ok(Json(ACK))
}

/// POST /admin/permissions/grant
pub async fn grant_permission(
    State(state): State<AppState>,
    UserId(actor): UserId,
    org: OrgContext,
    correlation: CorrelationId,
    Json(req): Json<PermissionChangeRequest>,
) -> Result<Json<AdminAck>, AppError> {
    state
        .permissions
        .grant_permission(
            actor,
            org.organization_id,
            req.user_id,
            &req.permission,
            &correlation.0,
        )
        .await?;
    Ok(Json(ACK))
}

/// POST /admin/permissions/revoke
pub async fn revoke_permission(
    State(state): State<AppState>,
    UserId(actor): UserId,
    org: OrgContext,
    correlation: CorrelationId,
    Json(req): Json<PermissionChangeRequest>,
) -> Result<Json<AdminAck>, AppError> {
    state
        .permissions
        .revoke_permission(
            actor,
            org.organization_id,
            req.user_id,
            &req.permission,
            &correlation.0,
        )
        .await?;
    Ok(Json(ACK))
}

/// POST /admin/roles/permissions/grant
pub async fn grant_role_permission(
    State(state): State<AppState>,
    UserId(actor): UserId,
    org: OrgContext,
    correlation: CorrelationId,
    Json(req): Json<RolePermissionRequest>,
) -> Result<Json<AdminAck>, AppError> {
    state
        .permissions
        .grant_role_permission(
            actor,
            org.organization_id,
            &req.role,
            &req.permission,
            &correlation.0,
        )
        .await?;
    Ok(Json(ACK))
}

/// POST /admin/overrides/set
pub async fn set_override(
    State(state): State<AppState>,
    UserId(actor): UserId,
    org: OrgContext,
    correlation: CorrelationId,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<AdminAck>, AppError> {
    let action = req
        .action
        .ok_or_else(|| AppError::Validation("override action is required".to_string()))?;

    state
        .permissions
        .set_resource_override(
            actor,
            org.organization_id,
            req.user_id,
            &req.permission,
            &req.resource,
            action,
            &correlation.0,
        )
        .await?;
    Ok(Json(ACK))
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub records: Vec<AuditRecordResponse>,
}

/// GET /admin/audit
///
/// Newest first, capped at 100 records. Read access rides on the same
/// `rbac.manage` gate as the mutations.
pub async fn audit_log(
    State(state): State<AppState>,
    UserId(actor): UserId,
    org: OrgContext,
    correlation: CorrelationId,
) -> Result<Json<AuditLogResponse>, AppError> {
    state
        .permissions
        .require_permission(actor, org.organization_id, RBAC_MANAGE, None, &correlation.0)
        .await?;

    let records = state
        .store
        .audit_records_for_org(org.organization_id, 100)
        .await
        .map_err(|e| AppError::Database(e.into()))?;

    Ok(Json(AuditLogResponse {
        records: records.into_iter().map(AuditRecordResponse::from).collect(),
    }))
}

/// POST /admin/overrides/remove
pub async fn remove_override(
    State(state): State<AppState>,
    UserId(actor): UserId,
    org: OrgContext,
    correlation: CorrelationId,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<AdminAck>, AppError> {
    state
        .permissions
        .remove_resource_override(
            actor,
            org.organization_id,
            req.user_id,
            &req.permission,
            &req.resource,
            &correlation.0,
        )
        .await?;
    Ok(Json(ACK))
}
