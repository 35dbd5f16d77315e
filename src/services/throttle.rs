//! In-process sliding-window rate limiting.
//!
//! Used for login attempts, material uploads, the REST API budget and
//! per-connection chat messages.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::state::AppState;

/// Sliding window over a single key
#[derive(Debug, Clone)]
pub struct RateWindow {
    limit: usize,
    window: Duration,
    hits: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: VecDeque::with_capacity(limit),
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&oldest) = self.hits.front() {
            if now.duration_since(oldest) >= self.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a hit at `now` if the window has room. Returns whether it was accepted.
    pub fn try_hit_at(&mut self, now: Instant) -> bool {
        self.evict(now);
        if self.hits.len() >= self.limit {
            return false;
        }
        self.hits.push_back(now);
        true
    }

    pub fn try_hit(&mut self) -> bool {
        self.try_hit_at(Instant::now())
    }

    /// Record a hit without checking the limit
    pub fn record_at(&mut self, now: Instant) {
        self.evict(now);
        self.hits.push_back(now);
    }

    pub fn is_full_at(&mut self, now: Instant) -> bool {
        self.evict(now);
        self.hits.len() >= self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Keyed sliding-window limiter shared across requests
#[derive(Clone)]
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, RateWindow>>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Count a request against `key`; false when the key is over budget
    pub fn try_acquire(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let entry = windows
            .entry(key.to_string())
            .or_insert_with(|| RateWindow::new(self.limit, self.window));
        entry.try_hit_at(now)
    }

    /// True when `key` has used up its budget. Does not count a hit.
    pub fn is_blocked(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let Some(entry) = windows.get_mut(key) else {
            return false;
        };
        let blocked = entry.is_full_at(now);
        if entry.is_empty() {
            windows.remove(key);
        }
        blocked
    }

    /// Count a hit unconditionally (e.g. a failed login)
    pub fn record(&self, key: &str) {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        windows
            .entry(key.to_string())
            .or_insert_with(|| RateWindow::new(self.limit, self.window))
            .record_at(now);
    }

    /// Forget all hits for `key`
    pub fn reset(&self, key: &str) {
        self.windows.lock().remove(key);
    }

    /// Drop keys whose windows have drained. Returns how many were removed.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    fn prune_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| {
            w.evict(now);
            !w.is_empty()
        });
        before - windows.len()
    }

    /// Number of keys currently holding hits
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Periodically drop drained keys from every request limiter in `state`
pub fn start_limiter_pruning(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let removed: usize = [
                &state.login_limiter,
                &state.upload_limiter,
                &state.api_user_limiter,
                &state.api_anon_limiter,
            ]
            .iter()
            .map(|limiter| limiter.prune())
            .sum();
            if removed > 0 {
                debug!(removed, "Pruned idle rate-limit keys");
            }
        }
    });
}
