pub mod audit;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod redact;
pub mod services;
pub mod store;

use std::sync::Arc;

use service_core::axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::correlation::correlation_id_middleware;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::audit::AuditLogger;
use crate::config::AuthzConfig;
use crate::middleware::org_context_middleware;
use crate::services::{AdminService, OrgContextResolver, PermissionService};
use crate::store::AuthzStore;

/// Shared application state. Every service borrows the same store handle;
/// nothing holds a global.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthzConfig>,
    pub store: Arc<dyn AuthzStore>,
    pub permissions: PermissionService,
    pub admin: AdminService,
    pub audit: AuditLogger,
    pub org_resolver: OrgContextResolver,
}

impl AppState {
    pub fn new(config: AuthzConfig, store: Arc<dyn AuthzStore>) -> Self {
        let audit = AuditLogger::new(Arc::clone(&store));
        Self {
            config: Arc::new(config),
            permissions: PermissionService::new(Arc::clone(&store), audit.clone()),
            admin: AdminService::new(Arc::clone(&store)),
            org_resolver: OrgContextResolver::new(Arc::clone(&store)),
            audit,
            store,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Assemble the HTTP surface.
///
/// Everything except `/health` runs behind org-context resolution, so
/// handlers can assume membership was verified.
pub fn build_router(state: AppState) -> Router {
    let scoped = Router::new()
        .route("/authz/check", post(handlers::authz::check))
        .route("/authz/evaluate", post(handlers::authz::evaluate))
        .route("/authz/require", post(handlers::authz::require))
        .route("/authz/admin-status", get(handlers::authz::admin_status))
        .route("/admin/roles/assign", post(handlers::admin::assign_role))
        .route("/admin/roles/remove", post(handlers::admin::remove_role))
        .route(
            "/admin/roles/permissions/grant",
            post(handlers::admin::grant_role_permission),
        )
        .route(
            "/admin/permissions/grant",
            post(handlers::admin::grant_permission),
        )
        .route(
            "/admin/permissions/revoke",
            post(handlers::admin::revoke_permission),
        )
        .route("/admin/audit", get(handlers::admin::audit_log))
        .route("/admin/overrides/set", post(handlers::admin::set_override))
        .route(
            "/admin/overrides/remove",
            post(handlers::admin::remove_override),
        )
        .layer(from_fn_with_state(state.clone(), org_context_middleware));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(scoped)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
        .with_state(state)
}
