//! Token-bucket rate limiter for outbound model calls.
//!
//! `consume` is the non-blocking primitive: it refills from elapsed time,
//! takes tokens if available, and otherwise returns the wait the caller must
//! honor. `await_tokens` is the cooperative wrapper that sleeps and retries.
//!
//! All mutation of `available`/`last_refill` happens inside one mutex-guarded
//! critical section per call; the bucket is the only state shared across
//! callers if dispatch is ever parallelized.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Bucket sizing policy. Callers request 1 token per outbound model call.
#[derive(Debug, Clone, Copy)]
pub struct RateConfig {
    /// Maximum number of tokens the bucket can hold.
    pub capacity: f64,
    /// Tokens added per second.
    pub refill_per_second: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            capacity: 100.0,
            refill_per_second: 1.0,
        }
    }
}

impl RateConfig {
    /// Reads `REVIEW_RATE_CAPACITY` / `REVIEW_RATE_REFILL_PER_SEC`,
    /// falling back to the defaults for anything missing or unparsable.
    pub fn from_env() -> Self {
        let default = Self::default();
        let capacity = std::env::var("REVIEW_RATE_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.capacity);
        let refill_per_second = std::env::var("REVIEW_RATE_REFILL_PER_SEC")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.refill_per_second);
        Self {
            capacity,
            refill_per_second,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    available: f64,
    last_refill: Instant,
}

/// Token bucket. Starts full.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(cfg: RateConfig) -> Self {
        Self {
            capacity: cfg.capacity,
            refill_per_second: cfg.refill_per_second,
            state: Mutex::new(BucketState {
                available: cfg.capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Tries to take `tokens`; returns 0.0 on success, otherwise the time in
    /// seconds the caller must wait before enough tokens have accumulated.
    ///
    /// On a shortfall the remaining balance is spent (`available` drops to 0)
    /// and the returned wait covers only the deficit.
    pub async fn consume(&self, tokens: f64) -> f64 {
        let mut s = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(s.last_refill).as_secs_f64();
        s.available = (s.available + elapsed * self.refill_per_second).min(self.capacity);
        s.last_refill = now;

        if s.available >= tokens {
            s.available -= tokens;
            return 0.0;
        }

        let deficit = tokens - s.available;
        s.available = 0.0;
        deficit / self.refill_per_second
    }

    /// Suspends until `tokens` are available, then reserves them.
    pub async fn await_tokens(&self, tokens: f64) {
        loop {
            let wait = self.consume(tokens).await;
            if wait <= 0.0 {
                return;
            }
            debug!("rate limit: waiting {:.3}s for {} token(s)", wait, tokens);
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(capacity: f64, refill: f64) -> TokenBucket {
        TokenBucket::new(RateConfig {
            capacity,
            refill_per_second: refill,
        })
    }

    #[tokio::test]
    async fn consume_within_capacity_never_waits() {
        let b = bucket(10.0, 1.0);
        for _ in 0..10 {
            assert_eq!(b.consume(1.0).await, 0.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deficit_wait_covers_exactly_the_shortfall() {
        let b = bucket(2.0, 0.5);
        assert_eq!(b.consume(2.0).await, 0.0);
        // Bucket is empty; 1 token at 0.5/s is a 2 second wait.
        let wait = b.consume(1.0).await;
        assert!((wait - 2.0).abs() < 1e-9, "wait was {wait}");
    }

    #[tokio::test(start_paused = true)]
    async fn refill_is_capped_at_capacity() {
        let b = bucket(3.0, 100.0);
        assert_eq!(b.consume(3.0).await, 0.0);
        tokio::time::advance(Duration::from_secs(60)).await;
        // Despite a minute of refill, only `capacity` tokens are available.
        assert_eq!(b.consume(3.0).await, 0.0);
        assert!(b.consume(1.0).await > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn await_tokens_eventually_obtains_tokens() {
        let b = bucket(1.0, 1.0);
        b.await_tokens(1.0).await;
        let start = Instant::now();
        // Empty bucket: must suspend roughly 1s, then succeed.
        b.await_tokens(1.0).await;
        let waited = start.elapsed().as_secs_f64();
        assert!(waited >= 1.0, "waited only {waited}s");
        assert!(waited < 3.0, "waited {waited}s");
    }
}
