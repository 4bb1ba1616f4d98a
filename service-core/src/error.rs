//! Standardized error envelope for all HTTP surfaces.
//!
//! Every error response carries `{ error: { code, message, correlationId } }`
//! plus an `x-correlation-id` header mirroring the body field. Internal error
//! detail is logged server-side and never serialized to the client.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Response header mirroring the envelope's correlation ID.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Stable error codes clients can rely on for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication & authorization
    Unauthorized,
    Forbidden,
    InsufficientPermissions,
    InvalidOrgContext,
    PermissionCheckError,
    // Rate limiting
    RateLimitExceeded,
    // Validation
    InvalidRequest,
    ValidationError,
    // Resources
    NotFound,
    Conflict,
    // Server
    InternalError,
    DatabaseError,
    ServiceUnavailable,
    ExternalServiceError,
    Timeout,
}

impl ErrorCode {
    /// Fixed code -> HTTP status mapping. Callers may override per response.
    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden
            | ErrorCode::InsufficientPermissions
            | ErrorCode::InvalidOrgContext => StatusCode::FORBIDDEN,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InvalidRequest | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::ExternalServiceError => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::PermissionCheckError
            | ErrorCode::InternalError
            | ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Client-visible error envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
}

/// Builder for a standardized error response.
///
/// `internal` is logged with full context when the response is built and is
/// never serialized into the body. `details` must already be safe for client
/// consumption; never put raw error objects in it.
#[derive(Debug)]
pub struct ErrorResponse {
    code: ErrorCode,
    message: String,
    status: Option<StatusCode>,
    details: Option<serde_json::Value>,
    internal: Option<anyhow::Error>,
    correlation_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            details: None,
            internal: None,
            correlation_id: None,
        }
    }

    /// Override the HTTP status derived from the error code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach client-safe details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the internal error for server-side logging only.
    pub fn with_internal(mut self, err: anyhow::Error) -> Self {
        self.internal = Some(err);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Classify a caught error into a standard response by keyword matching.
    ///
    /// This is a best-effort fallback for errors that reach the boundary
    /// untyped; call sites that can construct a typed [`AppError`] directly
    /// should do so instead. When `expose_detail` is false (production) the
    /// raw message is replaced with a generic one.
    pub fn from_exception(err: anyhow::Error, expose_detail: bool) -> Self {
        let raw = err.to_string();
        let lowered = raw.to_lowercase();

        let (code, message) = if lowered.contains("unauthorized") || lowered.contains("authentication")
        {
            (ErrorCode::Unauthorized, "Authentication required")
        } else if lowered.contains("forbidden") || lowered.contains("permission") {
            (ErrorCode::Forbidden, "Access denied")
        } else if lowered.contains("not found") {
            (ErrorCode::NotFound, "Resource not found")
        } else if lowered.contains("timeout") {
            (ErrorCode::Timeout, "Request timeout")
        } else if lowered.contains("rate limit") {
            (ErrorCode::RateLimitExceeded, "Rate limit exceeded")
        } else {
            (ErrorCode::InternalError, "An unexpected error occurred")
        };

        let message = if expose_detail && code == ErrorCode::InternalError {
            raw
        } else {
            message.to_string()
        };

        Self::new(code, message).with_internal(err)
    }

    /// Build the final envelope. Consumes the responder, logging any attached
    /// internal error.
    pub fn into_envelope(self) -> (StatusCode, ErrorEnvelope) {
        let correlation_id = self
            .correlation_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let status = self.status.unwrap_or_else(|| self.code.http_status());

        if let Some(internal) = &self.internal {
            tracing::error!(
                correlation_id = %correlation_id,
                code = ?self.code,
                status = %status,
                error = ?internal,
                "request failed"
            );
        }

        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                correlation_id,
            },
            details: self.details,
        };
        (status, envelope)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let (status, envelope) = self.into_envelope();
        let header_value = HeaderValue::from_str(&envelope.error.correlation_id)
            .unwrap_or_else(|_| HeaderValue::from_static("invalid"));

        let mut response = (status, Json(envelope)).into_response();
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
        response
    }
}

/// Error taxonomy shared by all services.
///
/// `PermissionDenied` (a genuine 403) is kept distinct from
/// `PermissionCheck` (the evaluator could not determine access, 500-class)
/// so monitoring can alert on infrastructure failures without drowning in
/// ordinary denials. Both behave as "no access" to the caller.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required: {0}")]
    Auth(anyhow::Error),

    #[error("Insufficient permissions: {0}")]
    PermissionDenied(String),

    #[error("Invalid organization context: {0}")]
    OrgContext(String),

    #[error("Permission check failed: {0}")]
    PermissionCheck(anyhow::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Convert into the standard responder, without leaking internals.
    pub fn into_error_response(self) -> ErrorResponse {
        match self {
            AppError::Auth(err) => {
                ErrorResponse::new(ErrorCode::Unauthorized, "Authentication required")
                    .with_internal(err)
            }
            AppError::PermissionDenied(msg) => {
                ErrorResponse::new(ErrorCode::InsufficientPermissions, msg)
            }
            AppError::OrgContext(msg) => ErrorResponse::new(ErrorCode::InvalidOrgContext, msg),
            AppError::PermissionCheck(err) => ErrorResponse::new(
                ErrorCode::PermissionCheckError,
                "Unable to determine access",
            )
            .with_internal(err),
            AppError::Validation(msg) => ErrorResponse::new(ErrorCode::ValidationError, msg),
            AppError::NotFound(msg) => ErrorResponse::new(ErrorCode::NotFound, msg),
            AppError::Conflict(msg) => ErrorResponse::new(ErrorCode::Conflict, msg),
            AppError::Database(err) => {
                ErrorResponse::new(ErrorCode::DatabaseError, "Database error")
                    .with_internal(err)
            }
            AppError::Internal(err) => {
                ErrorResponse::new(ErrorCode::InternalError, "Internal server error")
                    .with_internal(err)
            }
        }
    }

    /// The error code this variant maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Auth(_) => ErrorCode::Unauthorized,
            AppError::PermissionDenied(_) => ErrorCode::InsufficientPermissions,
            AppError::OrgContext(_) => ErrorCode::InvalidOrgContext,
            AppError::PermissionCheck(_) => ErrorCode::PermissionCheckError,
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_error_response().into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_to_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorCode::InsufficientPermissions.http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ErrorCode::InvalidOrgContext.http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ErrorCode::ValidationError.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::RateLimitExceeded.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::PermissionCheckError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn envelope_never_contains_internal_error_text() {
        let internal = anyhow::anyhow!("pg: relation user_roles does not exist");
        let (status, envelope) = ErrorResponse::new(ErrorCode::DatabaseError, "Database error")
            .with_internal(internal)
            .into_envelope();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(!json.contains("user_roles"));
        assert!(json.contains("\"correlationId\""));
    }

    #[test]
    fn correlation_id_generated_when_absent() {
        let (_, envelope) = ErrorResponse::new(ErrorCode::NotFound, "Resource not found")
            .into_envelope();
        assert!(Uuid::parse_str(&envelope.error.correlation_id).is_ok());
    }

    #[test]
    fn correlation_id_preserved_when_supplied() {
        let (_, envelope) = ErrorResponse::new(ErrorCode::NotFound, "Resource not found")
            .with_correlation_id("req-123")
            .into_envelope();
        assert_eq!(envelope.error.correlation_id, "req-123");
    }

    #[test]
    fn status_override_wins() {
        let (status, _) = ErrorResponse::new(ErrorCode::InternalError, "oops")
            .with_status(StatusCode::BAD_GATEWAY)
            .into_envelope();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn from_exception_classifies_by_keyword() {
        let cases = [
            ("token is unauthorized", ErrorCode::Unauthorized),
            ("permission missing for user", ErrorCode::Forbidden),
            ("row not found in table", ErrorCode::NotFound),
            ("upstream timeout after 5s", ErrorCode::Timeout),
            ("rate limit hit", ErrorCode::RateLimitExceeded),
            ("disk exploded", ErrorCode::InternalError),
        ];
        for (msg, expected) in cases {
            let resp = ErrorResponse::from_exception(anyhow::anyhow!(msg.to_string()), false);
            let (_, envelope) = resp.into_envelope();
            assert_eq!(envelope.error.code, expected, "message: {msg}");
        }
    }

    #[test]
    fn from_exception_hides_raw_message_in_production() {
        let resp =
            ErrorResponse::from_exception(anyhow::anyhow!("secret internal detail"), false);
        let (_, envelope) = resp.into_envelope();
        assert!(!envelope.error.message.contains("secret internal detail"));
    }

    #[test]
    fn from_exception_surfaces_raw_message_in_dev() {
        let resp =
            ErrorResponse::from_exception(anyhow::anyhow!("weird edge case at line 4"), true);
        let (_, envelope) = resp.into_envelope();
        assert_eq!(envelope.error.message, "weird edge case at line 4");
    }

    #[test]
    fn app_error_maps_check_failure_distinct_from_denial() {
        let denied = AppError::PermissionDenied("missing courses.create".into());
        let check = AppError::PermissionCheck(anyhow::anyhow!("store offline"));
        assert_eq!(denied.code(), ErrorCode::InsufficientPermissions);
        assert_eq!(check.code(), ErrorCode::PermissionCheckError);
    }
}
