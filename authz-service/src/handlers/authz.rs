//! Authorization evaluation handlers.

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use service_core::{error::AppError, middleware::correlation::CorrelationId};
use uuid::Uuid;

use crate::middleware::UserId;
use crate::models::ResourceRef;
use crate::services::OrgContext;
use crate::AppState;

/// One permission check.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub permission: String,
    /// Narrows the check to a specific resource so stored overrides apply.
    pub resource: Option<ResourceRef>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub permission: String,
    pub allowed: bool,
}

/// Evaluate several permissions at once.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PermissionDecision {
    pub permission: String,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub all_allowed: bool,
    pub decisions: Vec<PermissionDecision>,
}

#[derive(Debug, Serialize)]
pub struct AdminStatusResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub is_admin: bool,
}

/// POST /authz/check
///
/// Answers allow/deny without erroring on denial; callers that want the
/// 403 behavior enforce on `allowed` themselves or use require endpoints.
pub async fn check(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    org: OrgContext,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let allowed = state
        .permissions
        .check_permission(
            user_id,
            org.organization_id,
            &req.permission,
            req.resource.as_ref(),
        )
        .await?;

    Ok(Json(CheckResponse {
        user_id,
        organization_id: org.organization_id,
        permission: req.permission,
        allowed,
    }))
}

/// POST /authz/evaluate
pub async fn evaluate(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    org: OrgContext,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let mut decisions = Vec::with_capacity(req.permissions.len());
    let mut all_allowed = true;

    for permission in req.permissions {
        let allowed = state
            .permissions
            .check_permission(user_id, org.organization_id, &permission, None)
            .await?;
        all_allowed &= allowed;
        decisions.push(PermissionDecision {
            permission,
            allowed,
        });
    }

    Ok(Json(EvaluateResponse {
        user_id,
        organization_id: org.organization_id,
        all_allowed,
        decisions,
    }))
}

/// POST /authz/require
///
/// 200 on grant, 403 with the standard envelope on denial.
pub async fn require(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    org: OrgContext,
    correlation: CorrelationId,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    state
        .permissions
        .require_permission(
            user_id,
            org.organization_id,
            &req.permission,
            req.resource.as_ref(),
            &correlation.0,
        )
        .await?;

    Ok(Json(CheckResponse {
        user_id,
        organization_id: org.organization_id,
        permission: req.permission,
        allowed: true,
    }))
}

/// GET /authz/admin-status
pub async fn admin_status(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    org: OrgContext,
) -> Result<Json<AdminStatusResponse>, AppError> {
    let is_admin = state
        .admin
        .has_admin_role(user_id, Some(org.organization_id))
        .await?;

    Ok(Json(AdminStatusResponse {
        user_id,
        organization_id: org.organization_id,
        is_admin,
    }))
}
