use std::env;

/// Seven days, matching the session cookie lifetime
const DEFAULT_SESSION_TTL: i64 = 604800;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens
    pub secret_key: String,
    pub session_ttl_secs: i64,
    /// Add the `Secure` attribute to session cookies
    pub secure_cookies: bool,
    /// Salt mixed into avatar seeds so they cannot be derived from user ids alone
    pub avatar_salt: String,
    /// Failed logins tolerated per client before the throttle trips
    pub login_max_attempts: usize,
    pub login_window_secs: u64,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let secret_key = env::var("COURPERA_SECRET_KEY").unwrap_or_else(|_| {
            tracing::warn!("COURPERA_SECRET_KEY not set, using an insecure development key");
            "courpera-dev-secret-change-me".to_string()
        });

        Self {
            secret_key,
            session_ttl_secs: env::var("COURPERA_SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SESSION_TTL),
            secure_cookies: env::var("COURPERA_SECURE_COOKIES")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            avatar_salt: env::var("COURPERA_AVATAR_SALT")
                .unwrap_or_else(|_| "courpera".to_string()),
            login_max_attempts: env::var("COURPERA_LOGIN_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            login_window_secs: 900,
        }
    }
}
