pub mod auth;
pub mod permissions;
pub mod security_headers;
pub mod throttle;

pub use auth::{optional_auth, require_auth, AuthenticatedUser, SESSION_COOKIE_NAME};
pub use permissions::*;
pub use security_headers::security_headers;
pub use throttle::{api_throttle, ClientKey};
