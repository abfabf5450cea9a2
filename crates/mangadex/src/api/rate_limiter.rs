//! Rate limiter implementation using a sliding window log.
//!
//! Admission timestamps from the last window are kept; a request is admitted
//! only while fewer than `max_requests` of them remain, so no rolling window
//! ever holds more than the budget.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Requests permitted per rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateBudget {
    /// Create a budget; a zero request count is raised to one
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub fn per_second(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Shared sliding-window rate limiter
///
/// Clones share the same admission log. Waiters queue on the inner mutex in
/// FIFO order and the one holding it sleeps until a slot frees up.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    budget: RateBudget,
    admitted: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(budget: RateBudget) -> Self {
        Self {
            budget,
            admitted: Arc::new(Mutex::new(VecDeque::with_capacity(
                budget.max_requests as usize,
            ))),
        }
    }

    pub fn budget(&self) -> RateBudget {
        self.budget
    }

    /// Wait until a request can be made, then record it
    ///
    /// Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        let mut admitted = self.admitted.lock().await;

        loop {
            let now = Instant::now();
            self.evict_expired(&mut admitted, now);

            if admitted.len() < self.budget.max_requests as usize {
                admitted.push_back(now);
                break;
            }

            // Full: the oldest admission leaves the window first
            if let Some(&oldest) = admitted.front() {
                let ready_at = oldest + self.budget.window;
                tracing::debug!(
                    wait_ms = ready_at.saturating_duration_since(now).as_millis() as u64,
                    admitted = admitted.len(),
                    max_requests = self.budget.max_requests,
                    "Rate limit: waiting for the window to roll"
                );
                sleep_until(ready_at).await;
            }
        }

        started.elapsed()
    }

    /// Number of requests admitted within the current window
    pub async fn current_window_count(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        self.evict_expired(&mut admitted, Instant::now());
        admitted.len()
    }

    /// Requests that could be admitted right now without waiting
    pub async fn remaining(&self) -> u32 {
        let used = self.current_window_count().await as u32;
        self.budget.max_requests.saturating_sub(used)
    }

    fn evict_expired(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = admitted.front() {
            if now.duration_since(front) >= self.budget.window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}
