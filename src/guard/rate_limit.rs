use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Fixed-window admission counter keyed by ip hash.
///
/// State lives in process memory only: a restart resets every quota, and
/// separate instances do not share counts.
#[derive(Clone)]
pub struct RateLimiter {
    // ip_hash -> (count, window_reset)
    state: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Count one request against `key`. Returns false once the window's
    /// quota is spent.
    pub async fn check(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let entry = state
            .entry(key.to_string())
            .or_insert((0, now + self.window));

        // Start a new window once the old one has elapsed
        if now > entry.1 {
            *entry = (1, now + self.window);
            return true;
        }

        if entry.0 < self.max_requests {
            entry.0 += 1;
            true
        } else {
            false
        }
    }

    /// Periodic cleanup of expired windows
    pub async fn cleanup(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let before = state.len();
        state.retain(|_, (_, reset_at)| now <= *reset_at);
        before - state.len()
    }

    pub async fn tracked(&self) -> usize {
        self.state.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_eleventh_request_denied_until_window_elapses() {
        let limiter = RateLimiter::new(10, 60);

        for _ in 0..10 {
            assert!(limiter.check("abc").await);
        }
        assert!(!limiter.check("abc").await);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!limiter.check("abc").await);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.check("abc").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identities_are_independent() {
        let limiter = RateLimiter::new(1, 60);

        assert!(limiter.check("one").await);
        assert!(!limiter.check("one").await);
        assert!(limiter.check("two").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_evicts_only_expired_windows() {
        let limiter = RateLimiter::new(10, 60);
        limiter.check("old").await;

        tokio::time::advance(Duration::from_secs(45)).await;
        limiter.check("fresh").await;

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(limiter.cleanup().await, 1);
        assert_eq!(limiter.tracked().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_checks_do_not_lose_updates() {
        let limiter = RateLimiter::new(50, 60);

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("shared").await })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 50);
    }
}
