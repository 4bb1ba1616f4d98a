//! Admin role checks.
//!
//! Admin status is a property of role level, not of permission slugs: a
//! user is an admin when the highest level across their held roles reaches
//! the admin threshold. Store failures fail closed.

use std::sync::Arc;

use service_core::error::AppError;
use uuid::Uuid;

use crate::store::AuthzStore;

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn AuthzStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn AuthzStore>) -> Self {
        Self { store }
    }

    /// Whether the user's highest role level reaches the admin threshold.
    ///
    /// With `org_id` the check covers roles held in that organization only;
    /// without it, roles from every organization count.
    pub async fn has_admin_role(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let roles = self
            .store
            .roles_for_user(user_id, org_id)
            .await
            .map_err(|e| AppError::PermissionCheck(e.into()))?;

        Ok(roles.iter().any(|role| role.is_admin_level()))
    }

    /// Admin or error. Denial is `PermissionDenied`; a store failure stays
    /// a `PermissionCheck` so it is never mistaken for a clean denial.
    pub async fn require_admin_role(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        if self.has_admin_role(user_id, org_id).await? {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "admin role required".to_string(),
            ))
        }
    }
}
