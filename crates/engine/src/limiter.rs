//! Rolling-window rate limiter shared by every dispatch worker.
//!
//! Workers `await` on `acquire()` before issuing a request; the call
//! returns once fewer than `capacity` requests were issued in the
//! trailing window. The issue log is mutated under a single async mutex,
//! so the invariant holds across all workers combined.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct WindowState {
    capacity: usize,
    window: Duration,
    issued: VecDeque<Instant>,
}

impl WindowState {
    /// Record one issue slot, or return how long to wait for the oldest
    /// issue to leave the window.
    fn try_acquire(&mut self) -> Option<Duration> {
        let now = Instant::now();
        while let Some(front) = self.issued.front() {
            if now.duration_since(*front) >= self.window {
                self.issued.pop_front();
            } else {
                break;
            }
        }
        if self.issued.len() < self.capacity {
            self.issued.push_back(now);
            None
        } else {
            // Oldest entry pins the window; wait until it expires.
            let front = *self.issued.front().expect("non-empty at capacity");
            Some(self.window - now.duration_since(front))
        }
    }
}

pub struct RollingWindowLimiter(Mutex<WindowState>);

impl RollingWindowLimiter {
    /// Standard limiter: `max_requests_per_minute` over a trailing 60s window.
    pub fn per_minute(max_requests_per_minute: u32) -> Self {
        Self::with_window(max_requests_per_minute as usize, Duration::from_secs(60))
    }

    pub fn with_window(capacity: usize, window: Duration) -> Self {
        Self(Mutex::new(WindowState {
            capacity: capacity.max(1),
            window,
            issued: VecDeque::new(),
        }))
    }

    /// Acquire one issue slot, sleeping while the window is saturated.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.0.lock().await;
                state.try_acquire()
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_allows_up_to_capacity() {
        let mut state = WindowState {
            capacity: 3,
            window: Duration::from_secs(60),
            issued: VecDeque::new(),
        };
        for _ in 0..3 {
            assert!(state.try_acquire().is_none());
        }
        let wait = state.try_acquire();
        assert!(wait.is_some());
        assert!(wait.unwrap() <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_window_to_roll() {
        let limiter = RollingWindowLimiter::with_window(2, Duration::from_millis(200));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(100));
        // Third slot only frees once the first issue leaves the window.
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_trailing_window_law() {
        let capacity = 3;
        let window = Duration::from_millis(150);
        let limiter = RollingWindowLimiter::with_window(capacity, window);
        let mut times = Vec::new();
        for _ in 0..8 {
            limiter.acquire().await;
            times.push(Instant::now());
        }
        // No trailing window of the configured length holds more than
        // `capacity` issues.
        for (i, t) in times.iter().enumerate() {
            let in_window = times[..=i]
                .iter()
                .filter(|earlier| t.duration_since(**earlier) < window)
                .count();
            assert!(in_window <= capacity, "window held {} issues", in_window);
        }
    }

    #[tokio::test]
    async fn test_shared_across_workers() {
        use std::sync::Arc;
        let limiter = Arc::new(RollingWindowLimiter::with_window(2, Duration::from_millis(150)));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        // 4 acquires at capacity 2 need at least one full window roll.
        assert!(start.elapsed() >= Duration::from_millis(130));
    }
}
