//! Course chat rooms: per-room broadcast fan-out, message parsing and flood control.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};

use crate::services::throttle::RateWindow;

/// Longest stored chat message, in characters
pub const MAX_MESSAGE_CHARS: usize = 500;
/// Messages accepted per connection within `RATE_WINDOW`
pub const RATE_LIMIT: usize = 5;
pub const RATE_WINDOW: Duration = Duration::from_secs(5);

const ROOM_CAPACITY: usize = 64;

pub fn room_name(course_id: i64) -> String {
    format!("course_{}", course_id)
}

/// Registry of live chat rooms, one broadcast channel per room
#[derive(Clone, Default)]
pub struct ChatHub {
    rooms: Arc<RwLock<HashMap<String, broadcast::Sender<String>>>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a room, creating its channel on first use
    pub async fn subscribe(&self, room: &str) -> broadcast::Receiver<String> {
        {
            let rooms = self.rooms.read().await;
            if let Some(tx) = rooms.get(room) {
                return tx.subscribe();
            }
        }

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Send a frame to everyone in the room. Returns the number of receivers.
    pub async fn publish(&self, room: &str, frame: String) -> usize {
        let rooms = self.rooms.read().await;
        match rooms.get(room) {
            Some(tx) => tx.send(frame).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop the room's channel once nobody is listening
    pub async fn release(&self, room: &str) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(room).is_some_and(|tx| tx.receiver_count() == 0) {
            rooms.remove(room);
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

/// Next frame for a room subscriber. Skips over frames lost to lag and
/// returns `None` once the room is gone.
pub async fn next_frame(rx: &mut broadcast::Receiver<String>) -> Option<String> {
    loop {
        match rx.recv().await {
            Ok(frame) => return Some(frame),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Chat subscriber lagging; frames skipped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Per-connection flood control: silently drops messages over the budget
#[derive(Debug)]
pub struct MessageRateLimiter {
    window: RateWindow,
}

impl MessageRateLimiter {
    pub fn new() -> Self {
        Self::with_limit(RATE_LIMIT, RATE_WINDOW)
    }

    pub fn with_limit(limit: usize, window: Duration) -> Self {
        Self {
            window: RateWindow::new(limit, window),
        }
    }

    pub fn allow(&mut self) -> bool {
        self.window.try_hit()
    }

    pub fn allow_at(&mut self, now: std::time::Instant) -> bool {
        self.window.try_hit_at(now)
    }
}

impl Default for MessageRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct IncomingFrame {
    #[serde(default)]
    message: Option<String>,
}

/// Extract the trimmed message text from a client frame, if any
pub fn parse_incoming(frame: &str) -> Option<String> {
    let parsed: IncomingFrame = serde_json::from_str(frame).ok()?;
    let text = parsed.message?.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Cut a message down to the stored maximum on a character boundary
pub fn truncate_message(text: &str) -> String {
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// Frame fanned out to a room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub sender: String,
    pub message: String,
}

impl ChatEvent {
    pub fn message(sender: &str, message: &str) -> Self {
        Self {
            event_type: "chat.message".to_string(),
            sender: sender.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_parse_incoming() {
        assert_eq!(
            parse_incoming(r#"{"message": "  hello  "}"#).as_deref(),
            Some("hello")
        );
        assert_eq!(parse_incoming(r#"{"message": "   "}"#), None);
        assert_eq!(parse_incoming(r#"{"other": 1}"#), None);
        assert_eq!(parse_incoming("not json"), None);
    }

    #[test]
    fn test_truncate_message_counts_chars() {
        let long = "é".repeat(600);
        let cut = truncate_message(&long);
        assert_eq!(cut.chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(truncate_message("short"), "short");
    }

    #[test]
    fn test_rate_limiter_drops_sixth_message() {
        let mut limiter = MessageRateLimiter::new();
        let t0 = Instant::now();
        for i in 0..5 {
            assert!(limiter.allow_at(t0 + Duration::from_millis(i * 100)));
        }
        assert!(!limiter.allow_at(t0 + Duration::from_millis(600)));
        assert!(limiter.allow_at(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_chat_event_shape() {
        let json = serde_json::to_value(ChatEvent::message("amy", "hi")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "chat.message", "sender": "amy", "message": "hi"})
        );
    }

    #[tokio::test]
    async fn test_hub_fans_out_within_room() {
        let hub = ChatHub::new();
        let mut a = hub.subscribe("course_1").await;
        let mut b = hub.subscribe("course_1").await;
        let mut other = hub.subscribe("course_2").await;

        assert_eq!(hub.publish("course_1", "ping".to_string()).await, 2);
        assert_eq!(a.recv().await.unwrap(), "ping");
        assert_eq!(b.recv().await.unwrap(), "ping");
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_hub_release_drops_empty_room() {
        let hub = ChatHub::new();
        let rx = hub.subscribe("course_9").await;
        hub.release("course_9").await;
        assert_eq!(hub.room_count().await, 1);

        drop(rx);
        hub.release("course_9").await;
        assert_eq!(hub.room_count().await, 0);
        assert_eq!(hub.publish("course_9", "x".to_string()).await, 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_receiving() {
        let (tx, mut rx) = broadcast::channel(2);
        for i in 0..5 {
            tx.send(format!("m{}", i)).unwrap();
        }
        // The oldest frames were overwritten; the stream resumes with what is left
        assert_eq!(next_frame(&mut rx).await.as_deref(), Some("m3"));
        assert_eq!(next_frame(&mut rx).await.as_deref(), Some("m4"));

        drop(tx);
        assert_eq!(next_frame(&mut rx).await, None);
    }
}
