//! Client-side sliding-window rate limiter.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Small cushion added to each wait so a timestamp has actually left the
/// window when we re-check.
const WAKE_SLACK: Duration = Duration::from_millis(10);

/// Allows at most `max_calls` admissions per sliding `window`.
///
/// Timestamps of admitted calls are kept in a deque; entries older than the
/// window are pruned on every acquisition. When the window is full,
/// [`acquire`](Self::acquire) sleeps until the oldest entry ages out and then
/// re-checks, so concurrent callers cannot overshoot the budget.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a call is admissible, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                while calls
                    .front()
                    .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
                {
                    calls.pop_front();
                }

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }

                match calls.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };

            log::debug!(
                "Rate limit window full ({} calls), waiting {:?}",
                self.max_calls,
                wait
            );
            sleep(wait + WAKE_SLACK).await;
        }
    }
}
