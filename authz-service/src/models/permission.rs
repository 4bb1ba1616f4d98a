//! Permission model - flat dot-namespaced slugs plus resource-scoped overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A specific resource instance an override applies to.
///
/// Permission slugs themselves are plain dot-namespaced strings compared by
/// exact equality; there is no globbing or prefix matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: String,
    pub resource_id: String,
}

impl ResourceRef {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }
}

/// Whether a resource-scoped override grants or denies the permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "override_action", rename_all = "snake_case")]
pub enum OverrideAction {
    Allow,
    Deny,
}

/// An explicit per-resource grant or denial, consulted before role/direct
/// resolution. Overrides never expire silently; they must be removed by an
/// explicit admin action.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResourceOverride {
    pub override_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub permission_slug: String,
    pub resource_type: String,
    pub resource_id: String,
    pub action: OverrideAction,
    pub granted_by: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl ResourceOverride {
    pub fn new(
        user_id: Uuid,
        organization_id: Uuid,
        permission_slug: impl Into<String>,
        resource: ResourceRef,
        action: OverrideAction,
        granted_by: Uuid,
    ) -> Self {
        Self {
            override_id: Uuid::new_v4(),
            user_id,
            organization_id,
            permission_slug: permission_slug.into(),
            resource_type: resource.resource_type,
            resource_id: resource.resource_id,
            action,
            granted_by,
            created_utc: Utc::now(),
        }
    }

    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(self.resource_type.clone(), self.resource_id.clone())
    }
}
