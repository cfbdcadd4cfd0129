//! Wall clock abstraction for session timestamps

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Source of the current time in Unix milliseconds
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time, Unix milliseconds
    fn now_millis(&self) -> i64;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Wall clock driven by tokio's timer.
///
/// Anchored to the system time at construction and advanced by
/// `tokio::time::Instant`, so it follows a paused and advanced tokio clock in
/// tests while staying consistent with the session expiration timer.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor_millis: i64,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    /// Anchor a new clock at the current time
    pub fn new() -> Self {
        Self {
            anchor_millis: chrono::Utc::now().timestamp_millis(),
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_millis.saturating_add(elapsed)
    }
}

/// Manually driven clock
#[derive(Debug, Default)]
pub struct MockClock {
    now_millis: AtomicI64,
}

impl MockClock {
    /// Clock frozen at `now_millis`
    pub fn new(now_millis: i64) -> Self {
        Self {
            now_millis: AtomicI64::new(now_millis),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let millis = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now_millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, now_millis: i64) {
        self.now_millis.store(now_millis, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.now_millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::new(1_000);
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_millis(), 3_000);
        clock.set(10);
        assert_eq!(clock.now_millis(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let start = clock.now_millis();
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now_millis() - start, 90_000);
    }
}
