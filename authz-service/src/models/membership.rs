//! Organization membership - links a user to the orgs they may act within.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Membership record for a (user, organization) pair.
///
/// Every permission check operates within exactly one resolved organization;
/// membership is the gate on that resolution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub membership_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    /// The org used when a request carries no explicit org hint.
    pub is_default: bool,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: Uuid, organization_id: Uuid, is_default: bool) -> Self {
        Self {
            membership_id: Uuid::new_v4(),
            user_id,
            organization_id,
            is_default,
            active: true,
            created_utc: Utc::now(),
        }
    }
}
