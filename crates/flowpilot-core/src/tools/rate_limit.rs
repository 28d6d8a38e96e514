//! Fixed-window request limiter for tools.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// At most `max_requests` admitted calls per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub max_requests: u32,
    #[serde(with = "duration_ms")]
    pub window: Duration,
}

impl RateLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// The counter resets only when the window expires; the outcome of an
/// admitted call does not affect it.
pub struct RateLimiter {
    limit: RateLimit,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            window: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Admit one request, or return `false` when the window is exhausted.
    pub fn try_acquire(&self) -> bool {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());

        if window.started.elapsed() >= self.limit.window {
            window.started = Instant::now();
            window.count = 0;
        }

        if window.count >= self.limit.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}
