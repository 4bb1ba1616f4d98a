//! Shared fixtures for HTTP integration tests.
//!
//! Tests run against the real router with an in-memory store, so the full
//! middleware and error-envelope path is exercised without a database.

use std::sync::Arc;

use authz_service::{
    build_router,
    config::{AuthzConfig, DatabaseConfig, Environment, SecurityConfig},
    models::{Membership, Role, RoleAssignment},
    store::{memory::MemoryStore, AuthzStore},
    AppState,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use service_core::axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use uuid::Uuid;

pub fn test_config() -> AuthzConfig {
    AuthzConfig {
        common: service_core::config::Config {
            port: 0,
            environment: Environment::Dev,
            log_level: "warn".into(),
        },
        service_name: "authz-service".into(),
        service_version: "0.0.0-test".into(),
        database: DatabaseConfig {
            url: "postgres://unused".into(),
            max_connections: 1,
        },
        security: SecurityConfig {
            allowed_origins: vec!["*".into()],
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(test_config(), Arc::clone(&store) as Arc<dyn AuthzStore>);
    TestApp {
        router: build_router(state),
        store,
    }
}

impl TestApp {
    pub async fn add_member(&self, user: Uuid, org: Uuid, is_default: bool) {
        self.store
            .insert_membership(&Membership {
                membership_id: Uuid::new_v4(),
                user_id: user,
                organization_id: org,
                is_default,
                active: true,
                created_utc: Utc::now(),
            })
            .await
            .unwrap();
    }

    pub async fn add_role(&self, user: Uuid, org: Uuid, slug: &str, level: i32) -> Role {
        let role = Role::new(slug, level, None);
        self.store.insert_role(&role).await.unwrap();
        self.store
            .insert_role_assignment(&RoleAssignment::new(user, org, role.role_id))
            .await
            .unwrap();
        role
    }

    pub async fn grant(&self, user: Uuid, org: Uuid, slug: &str) {
        self.store
            .grant_user_permission(user, org, slug)
            .await
            .unwrap();
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Fire one request at the router. `user` fills `x-user-id`, `org` fills
/// `x-organization-id`; both are optional so failure paths are reachable.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    org: Option<Uuid>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    if let Some(org) = org {
        builder = builder.header("x-organization-id", org.to_string());
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        body,
    }
}
