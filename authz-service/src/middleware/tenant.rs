//! Organization context middleware.
//!
//! Resolves the request's organization before handlers run and carries it
//! through request extensions. Handlers take it with the [`OrgContext`]
//! extractor and can rely on membership having been verified.

use service_core::{
    axum::{
        async_trait,
        extract::{FromRequestParts, Request, State},
        http::request::Parts,
        middleware::Next,
        response::Response,
    },
    error::AppError,
};
use uuid::Uuid;

use crate::middleware::identity::UserId;
use crate::services::{OrgContext, OrgHint};
use crate::AppState;

/// Header carrying the caller's chosen organization.
pub const ORG_ID_HEADER: &str = "x-organization-id";

/// Query parameter fallback for the organization hint.
pub const ORG_ID_QUERY_PARAM: &str = "organization_id";

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Read the organization hint from header, then query parameter.
///
/// A hint that is present but not a UUID is a validation error rather than
/// a silent fall-through to the default organization.
fn org_hint(parts: &Parts) -> Result<OrgHint, AppError> {
    let header = parts
        .headers
        .get(ORG_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            Uuid::parse_str(raw)
                .map_err(|_| AppError::Validation(format!("malformed {ORG_ID_HEADER} header")))
        })
        .transpose()?;

    let query = parts
        .uri
        .query()
        .and_then(|q| query_param(q, ORG_ID_QUERY_PARAM))
        .map(|raw| {
            Uuid::parse_str(raw).map_err(|_| {
                AppError::Validation(format!("malformed {ORG_ID_QUERY_PARAM} parameter"))
            })
        })
        .transpose()?;

    Ok(OrgHint { header, query })
}

/// Resolve the org context for the authenticated caller and stash it in
/// request extensions. Applied after identity is available.
pub async fn org_context_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let UserId(user_id) = UserId::from_request_parts(&mut parts, &state).await?;
    let hint = org_hint(&parts)?;
    let ctx = state.org_resolver.resolve(user_id, hint).await?;

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for OrgContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OrgContext>()
            .copied()
            .ok_or_else(|| AppError::OrgContext("organization context not resolved".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_parsing() {
        assert_eq!(
            query_param("organization_id=abc&x=1", "organization_id"),
            Some("abc")
        );
        assert_eq!(
            query_param("x=1&organization_id=abc", "organization_id"),
            Some("abc")
        );
        assert_eq!(query_param("x=1", "organization_id"), None);
        assert_eq!(query_param("", "organization_id"), None);
    }
}
