//! Session handling with private cookies: issuing, validating and revoking
//! the auth cookie, plus the log-in and log-out routes.

mod cookie;
mod log_in;
mod middleware;
mod token;

pub use cookie::DEFAULT_COOKIE_DURATION;
pub use log_in::{get_current_user, post_demo_log_in, post_log_out};
pub use middleware::auth_guard;

#[cfg(test)]
pub use cookie::{COOKIE_TOKEN, set_auth_cookie};

#[cfg(test)]
pub use middleware::AuthState;
