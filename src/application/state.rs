use std::path::PathBuf;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::config::throttle::ThrottleConfig;
use crate::config::CONFIG;
use crate::services::chat::ChatHub;
use crate::services::notification::NotificationService;
use crate::services::throttle::SlidingWindowLimiter;

/// Database connection type alias
pub type DbConn = DatabaseConnection;

/// Limits and storage settings copied out of the global config so tests can override them
#[derive(Clone, Debug)]
pub struct Limits {
    pub login_max_attempts: usize,
    pub login_window: Duration,
    pub upload_rate: usize,
    pub upload_window: Duration,
    pub max_upload_bytes: u64,
    pub media_root: PathBuf,
    pub api: ThrottleConfig,
}

impl Limits {
    pub fn from_config() -> Self {
        Self {
            login_max_attempts: CONFIG.auth.login_max_attempts,
            login_window: Duration::from_secs(CONFIG.auth.login_window_secs),
            upload_rate: CONFIG.uploads.upload_rate,
            upload_window: Duration::from_secs(CONFIG.uploads.upload_window_secs),
            max_upload_bytes: CONFIG.uploads.max_upload_bytes,
            media_root: CONFIG.uploads.media_root.clone(),
            api: CONFIG.throttle.clone(),
        }
    }
}

/// Application state containing all shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DbConn,
    pub notification: NotificationService,
    pub chat: ChatHub,
    pub login_limiter: SlidingWindowLimiter,
    pub upload_limiter: SlidingWindowLimiter,
    pub api_user_limiter: SlidingWindowLimiter,
    pub api_anon_limiter: SlidingWindowLimiter,
    pub limits: Limits,
}

impl AppState {
    pub fn new(db: DbConn) -> Self {
        Self::with_limits(db, Limits::from_config())
    }

    pub fn with_limits(db: DbConn, limits: Limits) -> Self {
        let minute = Duration::from_secs(60);

        Self {
            notification: NotificationService::new(db.clone()),
            chat: ChatHub::new(),
            login_limiter: SlidingWindowLimiter::new(limits.login_max_attempts, limits.login_window),
            upload_limiter: SlidingWindowLimiter::new(limits.upload_rate, limits.upload_window),
            api_user_limiter: SlidingWindowLimiter::new(limits.api.user_per_minute, minute),
            api_anon_limiter: SlidingWindowLimiter::new(limits.api.anon_per_minute, minute),
            db,
            limits,
        }
    }

    pub fn media_root(&self) -> &std::path::Path {
        &self.limits.media_root
    }
}
