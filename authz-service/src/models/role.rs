//! Role model - org-scoped roles with integer admin levels and a hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role level at or above which a user is considered administrative.
pub const ADMIN_ROLE_LEVEL: i32 = 50;

/// Level assigned to the super_admin role.
pub const SUPER_ADMIN_ROLE_LEVEL: i32 = 60;

/// Role entity.
///
/// `level` drives coarse admin-tier comparisons; `parent_role_id` forms the
/// role hierarchy through which permissions are inherited (a child role
/// inherits everything its ancestors grant).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub slug: String,
    pub level: i32,
    pub parent_role_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    pub fn new(slug: impl Into<String>, level: i32, parent_role_id: Option<Uuid>) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            slug: slug.into(),
            level,
            parent_role_id,
            created_utc: Utc::now(),
        }
    }

    pub fn is_admin_level(&self) -> bool {
        self.level >= ADMIN_ROLE_LEVEL
    }
}

/// A user's role within one organization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleAssignment {
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(user_id: Uuid, organization_id: Uuid, role_id: Uuid) -> Self {
        Self {
            assignment_id: Uuid::new_v4(),
            user_id,
            organization_id,
            role_id,
            created_utc: Utc::now(),
        }
    }
}
