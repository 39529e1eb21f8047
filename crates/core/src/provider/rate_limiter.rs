//! Token bucket rate limiting, one bucket per provider.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use super::ProviderError;

/// Token bucket: tokens refill at a constant rate and each request takes one.
pub struct TokenBucket {
    capacity: f32,
    tokens: f32,
    /// Tokens per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Starts full.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Take a token, or return how long until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let wait_secs = (1.0 - self.tokens) / self.refill_rate;
            Err(Duration::from_secs_f32(wait_secs))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Buckets keyed by provider name.
pub struct RateLimiterPool {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiterPool {
    pub fn new<'a>(providers: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let buckets = providers
            .into_iter()
            .map(|(name, rpm)| (name.to_string(), TokenBucket::new(rpm)))
            .collect();
        Self {
            buckets: Mutex::new(buckets),
        }
    }

    /// Fails fast with [`ProviderError::RateLimited`] when the bucket is
    /// empty. Unknown providers are not limited.
    pub async fn try_acquire(&self, provider: &str) -> Result<(), ProviderError> {
        let mut buckets = self.buckets.lock().await;
        match buckets.get_mut(provider) {
            Some(bucket) => bucket
                .try_acquire()
                .map_err(|wait| ProviderError::RateLimited {
                    provider: provider.to_string(),
                    retry_after_ms: wait.as_millis() as u64,
                }),
            None => Ok(()),
        }
    }
}
