use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct UploadsConfig {
    /// Root directory for stored materials and paper submissions
    pub media_root: PathBuf,
    pub max_upload_bytes: u64,
    /// Uploads allowed per user within `upload_window_secs`
    pub upload_rate: usize,
    pub upload_window_secs: u64,
}

impl UploadsConfig {
    pub fn from_env() -> Self {
        let max_mb: u64 = env::var("COURPERA_MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(25);

        Self {
            media_root: env::var("COURPERA_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            max_upload_bytes: max_mb * 1024 * 1024,
            upload_rate: env::var("COURPERA_UPLOAD_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            upload_window_secs: 60,
        }
    }
}
