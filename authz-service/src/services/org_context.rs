//! Organization context resolution.
//!
//! Every request operates inside exactly one organization. The caller may
//! hint which one via header or query parameter; otherwise the user's stored
//! default applies. Whatever is chosen, the user must hold an active
//! membership in it.

use std::sync::Arc;

use service_core::error::AppError;
use uuid::Uuid;

use crate::store::AuthzStore;

/// Where the caller hinted the organization from, in precedence order.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrgHint {
    /// `X-Organization-Id` header.
    pub header: Option<Uuid>,
    /// `organization_id` query parameter.
    pub query: Option<Uuid>,
}

impl OrgHint {
    pub fn none() -> Self {
        Self::default()
    }

    fn candidate(&self) -> Option<Uuid> {
        self.header.or(self.query)
    }
}

/// Resolved org context, carried through request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgContext {
    pub organization_id: Uuid,
}

#[derive(Clone)]
pub struct OrgContextResolver {
    store: Arc<dyn AuthzStore>,
}

impl OrgContextResolver {
    pub fn new(store: Arc<dyn AuthzStore>) -> Self {
        Self { store }
    }

    /// Pick the organization for this request and verify membership.
    ///
    /// Header beats query parameter beats stored default. Read-only: a user
    /// with no membership gets an error, never an implicit membership row.
    pub async fn resolve(&self, user_id: Uuid, hint: OrgHint) -> Result<OrgContext, AppError> {
        let candidate = match hint.candidate() {
            Some(org_id) => org_id,
            None => self
                .store
                .default_organization(user_id)
                .await
                .map_err(|e| AppError::PermissionCheck(e.into()))?
                .ok_or_else(|| {
                    AppError::OrgContext("user has no organization assigned".to_string())
                })?,
        };

        let is_member = self
            .store
            .membership_exists(user_id, candidate)
            .await
            .map_err(|e| AppError::PermissionCheck(e.into()))?;

        if !is_member {
            return Err(AppError::OrgContext(format!(
                "no access to organization: {candidate}"
            )));
        }

        Ok(OrgContext {
            organization_id: candidate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Membership;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    fn membership(user_id: Uuid, org_id: Uuid, is_default: bool) -> Membership {
        Membership {
            membership_id: Uuid::new_v4(),
            user_id,
            organization_id: org_id,
            is_default,
            active: true,
            created_utc: Utc::now(),
        }
    }

    async fn resolver_with_member(user_id: Uuid, org_id: Uuid) -> (OrgContextResolver, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_membership(&membership(user_id, org_id, true))
            .await
            .unwrap();
        (
            OrgContextResolver::new(Arc::clone(&store) as Arc<dyn AuthzStore>),
            store,
        )
    }

    #[tokio::test]
    async fn header_hint_wins_over_query_and_default() {
        let user = Uuid::new_v4();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let (resolver, store) = resolver_with_member(user, org_a).await;
        store
            .insert_membership(&membership(user, org_b, false))
            .await
            .unwrap();

        let ctx = resolver
            .resolve(
                user,
                OrgHint {
                    header: Some(org_b),
                    query: Some(org_a),
                },
            )
            .await
            .unwrap();

        assert_eq!(ctx.organization_id, org_b);
    }

    #[tokio::test]
    async fn query_hint_beats_default() {
        let user = Uuid::new_v4();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let (resolver, store) = resolver_with_member(user, org_a).await;
        store
            .insert_membership(&membership(user, org_b, false))
            .await
            .unwrap();

        let ctx = resolver
            .resolve(
                user,
                OrgHint {
                    header: None,
                    query: Some(org_b),
                },
            )
            .await
            .unwrap();

        assert_eq!(ctx.organization_id, org_b);
    }

    #[tokio::test]
    async fn falls_back_to_default_organization() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let (resolver, _store) = resolver_with_member(user, org).await;

        let ctx = resolver.resolve(user, OrgHint::none()).await.unwrap();
        assert_eq!(ctx.organization_id, org);
    }

    #[tokio::test]
    async fn no_hint_and_no_default_is_org_context_error() {
        let store = Arc::new(MemoryStore::new());
        let resolver = OrgContextResolver::new(store as Arc<dyn AuthzStore>);

        let err = resolver
            .resolve(Uuid::new_v4(), OrgHint::none())
            .await
            .unwrap_err();

        match err {
            AppError::OrgContext(msg) => {
                assert_eq!(msg, "user has no organization assigned");
            }
            other => panic!("expected OrgContext, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn hint_without_membership_is_rejected() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let (resolver, _store) = resolver_with_member(user, org).await;
        let foreign = Uuid::new_v4();

        let err = resolver
            .resolve(
                user,
                OrgHint {
                    header: Some(foreign),
                    query: None,
                },
            )
            .await
            .unwrap_err();

        match err {
            AppError::OrgContext(msg) => {
                assert_eq!(msg, format!("no access to organization: {foreign}"));
            }
            other => panic!("expected OrgContext, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_outage_fails_closed() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let (resolver, store) = resolver_with_member(user, org).await;
        store.set_fail_ops(true);

        let err = resolver
            .resolve(
                user,
                OrgHint {
                    header: Some(org),
                    query: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PermissionCheck(_)));
    }
}
