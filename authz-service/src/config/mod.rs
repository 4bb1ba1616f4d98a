use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

pub use service_core::config::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthzConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// CORS origins allowed to call this service.
    pub allowed_origins: Vec<String>,
}

impl AuthzConfig {
    /// Load configuration from environment variables, with sane defaults for
    /// everything except the database URL. Port, environment, and log level
    /// come from the shared layered loader (`APP__` variables).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Validation("DATABASE_URL must be set".into()))?;

        Ok(Self {
            common: core_config::Config::load()?,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "authz-service".into()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseConfig {
                url: database_url,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_max_connections),
            },
            security: SecurityConfig {
                allowed_origins: env::var("ALLOWED_ORIGINS")
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_else(|_| vec!["http://localhost:3000".into()]),
            },
        })
    }
}
