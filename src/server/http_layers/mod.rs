mod basic_auth;
mod rate_limit;
mod requests_logging;

pub use basic_auth::{require_basic_auth, BasicAuth, BasicAuthError};
pub use rate_limit::{rate_limit, spawn_cleanup, IpRateLimiter};
pub use requests_logging::{log_requests, RequestsLoggingLevel};
