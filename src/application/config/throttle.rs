use std::env;

/// REST API request budgets, per minute
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub user_per_minute: usize,
    pub anon_per_minute: usize,
}

impl ThrottleConfig {
    pub fn from_env() -> Self {
        Self {
            user_per_minute: env::var("COURPERA_API_USER_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            anon_per_minute: env::var("COURPERA_API_ANON_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            user_per_minute: 100,
            anon_per_minute: 30,
        }
    }
}
