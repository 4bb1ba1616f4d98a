//! Caller identity extraction.
//!
//! Identity is established upstream by the gateway, which verifies the
//! caller and forwards the user id in a trusted header. This service only
//! reads that header; it never validates credentials itself.

use service_core::{
    axum::{async_trait, extract::FromRequestParts, http::request::Parts},
    error::AppError,
};
use uuid::Uuid;

/// Trusted header set by the gateway after authentication.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Auth(anyhow::anyhow!("missing {USER_ID_HEADER} header")))?;

        let user_id = Uuid::parse_str(raw)
            .map_err(|_| AppError::Auth(anyhow::anyhow!("malformed {USER_ID_HEADER} header")))?;

        Ok(UserId(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route("/", get(|user: UserId| async move { user.0.to_string() }))
    }

    #[tokio::test]
    async fn extracts_valid_user_id() {
        let user = Uuid::new_v4();
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(USER_ID_HEADER, user.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn malformed_header_is_unauthorized() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(USER_ID_HEADER, "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
    }
}
