pub mod accounts;
pub mod avatar;
pub mod calendar;
pub mod chat;
pub mod grading;
pub mod notification;
pub mod security;
pub mod throttle;
pub mod uploads;

pub use chat::ChatHub;
pub use notification::NotificationService;
pub use throttle::SlidingWindowLimiter;
