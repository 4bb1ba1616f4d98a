//! Request middleware: caller identity and organization context.

pub mod identity;
pub mod tenant;

pub use identity::{UserId, USER_ID_HEADER};
pub use tenant::{org_context_middleware, ORG_ID_HEADER, ORG_ID_QUERY_PARAM};
