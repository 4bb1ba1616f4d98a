//! service-core: shared infrastructure for the platform services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
pub use serde;
pub use serde_json;
pub use tracing;

pub use observability::init_tracing;
