pub mod correlation;

pub use correlation::{correlation_id_middleware, CorrelationId};
