use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window request limiter keyed by session id
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Arc<DashMap<String, VecDeque<Instant>>>,
    last_sweep: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// `max_requests == 0` disables limiting.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Arc::new(DashMap::new()),
            last_sweep: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Record a request for `session_id`. Returns false when the session
    /// already used up its window.
    pub fn check(&self, session_id: &str) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        let now = Instant::now();
        self.sweep(now);

        let mut hits = self.hits.entry(session_id.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|hit| now.duration_since(*hit) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests {
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Number of sessions currently holding window state.
    pub fn tracked_sessions(&self) -> usize {
        self.hits.len()
    }

    /// Drop sessions whose last request left the window. Runs at most once
    /// per window; must not be called while holding a map entry.
    fn sweep(&self, now: Instant) {
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last_sweep) < self.window {
            return;
        }
        *last_sweep = now;
        drop(last_sweep);

        let window = self.window;
        self.hits
            .retain(|_, hits| hits.back().is_some_and(|hit| now.duration_since(*hit) < window));
    }
}
