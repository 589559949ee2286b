//! Token-bucket rate limiter for outbound emission.

use std::time::{Duration, Instant};

/// `(allowed_messages, time_window_ms, message_count, window_start_monotonic)`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    allowed_messages: u32,
    time_window: Duration,
    message_count: u32,
    window_start: Instant,
}

impl TokenBucket {
    pub fn new(allowed_messages: u32, time_window_ms: u64) -> Self {
        Self {
            allowed_messages,
            time_window: Duration::from_millis(time_window_ms),
            message_count: 0,
            window_start: Instant::now(),
        }
    }

    /// For tests: construct with an explicit window start so elapsed
    /// time is deterministic.
    pub fn with_window_start(allowed_messages: u32, time_window_ms: u64, window_start: Instant) -> Self {
        Self {
            allowed_messages,
            time_window: Duration::from_millis(time_window_ms),
            message_count: 0,
            window_start,
        }
    }

    /// Attempt to consume one token `at` the given instant. Rolls the
    /// window over and resets the count if the window has elapsed.
    /// Returns `true` if the message may be sent, `false` if the
    /// caller must drop it.
    pub fn try_consume_at(&mut self, at: Instant) -> bool {
        if at.duration_since(self.window_start) >= self.time_window {
            self.window_start = at;
            self.message_count = 0;
        }
        if self.message_count < self.allowed_messages {
            self.message_count += 1;
            true
        } else {
            false
        }
    }

    /// Convenience wrapper using the real clock.
    pub fn try_consume(&mut self) -> bool {
        self.try_consume_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_configured_rate() {
        let start = Instant::now();
        let mut bucket = TokenBucket::with_window_start(3, 100, start);
        assert!(bucket.try_consume_at(start));
        assert!(bucket.try_consume_at(start));
        assert!(bucket.try_consume_at(start));
        assert!(!bucket.try_consume_at(start));
    }

    #[test]
    fn window_rollover_resets_count() {
        let start = Instant::now();
        let mut bucket = TokenBucket::with_window_start(1, 100, start);
        assert!(bucket.try_consume_at(start));
        assert!(!bucket.try_consume_at(start + Duration::from_millis(50)));
        assert!(bucket.try_consume_at(start + Duration::from_millis(101)));
    }
}
