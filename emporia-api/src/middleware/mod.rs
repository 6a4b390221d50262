pub mod auth;
pub mod context;

pub use auth::{admin_auth_middleware, customer_auth_middleware, Claims, ROLE_ADMIN, ROLE_CUSTOMER};
pub use context::{request_context_middleware, RequestContext};
