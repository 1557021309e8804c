mod auth;
mod error_handler;
mod rate_limit;

pub use auth::{TOKEN_COOKIE, auth_middleware};
pub use error_handler::log_errors;
pub use rate_limit::{RouteLimit, client_ip, rate_limit};
