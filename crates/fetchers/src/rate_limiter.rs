//! A token bucket keyed by a fixed global key (spec §5 "Rate limiter").
//! Used by both the ITA client and the CT log client, each with their own
//! bucket instance. Distributed coordination is modeled as an injectable
//! backend; its unavailability is fail-open (log + proceed), never a hard
//! failure, per spec §4.1/§7.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// A backend that can coordinate a rate limit across processes (e.g. Redis
/// `INCR`+`EXPIRE`). Returns `Ok(true)` if a token was granted.
#[async_trait]
pub trait DistributedLimiterBackend: Send + Sync {
    async fn try_acquire(&self, key: &str, max_per_window: u32, window: Duration) -> anyhow::Result<bool>;
}

/// An in-process sliding-window token bucket: at most `max_per_window`
/// acquisitions inside any rolling `window`.
pub struct LocalTokenBucket {
    max_per_window: u32,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl LocalTokenBucket {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        LocalTokenBucket {
            max_per_window,
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().expect("rate limiter lock poisoned");
        while let Some(&front) = timestamps.front() {
            if now.duration_since(front) > self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
        if timestamps.len() as u32 >= self.max_per_window {
            return false;
        }
        timestamps.push_back(now);
        true
    }
}

/// Rate limiter that prefers a distributed backend and falls back to a
/// local bucket, failing open (proceeding with a warning) if the
/// distributed backend errors.
pub struct RateLimiter {
    key: String,
    max_per_window: u32,
    window: Duration,
    backend: Option<Box<dyn DistributedLimiterBackend>>,
    local_fallback: LocalTokenBucket,
}

impl RateLimiter {
    pub fn new(key: impl Into<String>, max_per_window: u32, window: Duration) -> Self {
        RateLimiter {
            key: key.into(),
            max_per_window,
            window,
            backend: None,
            local_fallback: LocalTokenBucket::new(max_per_window, window),
        }
    }

    pub fn with_backend(mut self, backend: Box<dyn DistributedLimiterBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Blocks (spin-polling with a short sleep) until a token is available,
    /// or returns immediately having fail-opened past a backend error.
    pub async fn acquire(&self) {
        loop {
            let granted = match &self.backend {
                Some(backend) => {
                    match backend.try_acquire(&self.key, self.max_per_window, self.window).await {
                        Ok(granted) => granted,
                        Err(err) => {
                            warn!(error = %err, "distributed rate limiter unavailable, failing open");
                            return;
                        }
                    }
                }
                None => self.local_fallback.try_acquire(),
            };

            if granted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_bucket_enforces_window() {
        let bucket = LocalTokenBucket::new(2, Duration::from_secs(1));
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test]
    async fn rate_limiter_without_backend_uses_local_fallback() {
        let limiter = RateLimiter::new("ita", 1, Duration::from_millis(100));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    struct FailingBackend;

    #[async_trait]
    impl DistributedLimiterBackend for FailingBackend {
        async fn try_acquire(&self, _key: &str, _max: u32, _window: Duration) -> anyhow::Result<bool> {
            anyhow::bail!("redis unreachable")
        }
    }

    #[tokio::test]
    async fn fails_open_when_distributed_backend_errors() {
        let limiter = RateLimiter::new("ct", 1, Duration::from_secs(1))
            .with_backend(Box::new(FailingBackend));
        let start = Instant::now();
        limiter.acquire().await;
        // Fail-open returns immediately rather than blocking.
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
