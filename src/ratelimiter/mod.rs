//! Per-vendor token bucket rate limiting.
//!
//! One [`VendorRateLimiter`] per vendor, built on `governor`'s token bucket. Unlike a
//! reject-immediately limiter, `acquire` suspends the caller until a token is
//! available rather than returning a rejection.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimiterError {
    #[error("rate_limit_per_minute must be greater than 0")]
    InvalidRate,
    #[error("unknown vendor: {0}")]
    UnknownVendor(String),
}

type Bucket = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A single vendor's token bucket. Capacity and refill rate are both derived from
/// `rate_limit_per_minute`, matching the capacity-equals-burst framing in SPEC_FULL.md §4.1.
pub struct VendorRateLimiter {
    limiter: Bucket,
}

impl VendorRateLimiter {
    pub fn new(rate_limit_per_minute: u32) -> Result<Self, RateLimiterError> {
        let per_minute =
            NonZeroU32::new(rate_limit_per_minute).ok_or(RateLimiterError::InvalidRate)?;
        let quota = Quota::per_minute(per_minute).allow_burst(per_minute);
        Ok(Self {
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Blocks until a token is available, then consumes it.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Non-blocking check, used by tests that assert on immediate availability.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Registry of one rate limiter per configured vendor.
#[derive(Clone)]
pub struct RateLimiterRegistry {
    limiters: Arc<HashMap<String, Arc<VendorRateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new(rates: impl IntoIterator<Item = (String, u32)>) -> Result<Self, RateLimiterError> {
        let mut limiters = HashMap::new();
        for (vendor, rate) in rates {
            limiters.insert(vendor, Arc::new(VendorRateLimiter::new(rate)?));
        }
        Ok(Self {
            limiters: Arc::new(limiters),
        })
    }

    pub fn get(&self, vendor: &str) -> Result<Arc<VendorRateLimiter>, RateLimiterError> {
        self.limiters
            .get(vendor)
            .cloned()
            .ok_or_else(|| RateLimiterError::UnknownVendor(vendor.to_string()))
    }

    pub async fn acquire(&self, vendor: &str) -> Result<(), RateLimiterError> {
        let limiter = self.get(vendor)?;
        limiter.acquire().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_is_rejected() {
        assert!(VendorRateLimiter::new(0).is_err());
    }

    #[test]
    fn initial_burst_allows_capacity_requests() {
        let limiter = VendorRateLimiter::new(5).unwrap();
        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn acquire_blocks_until_token_available() {
        let limiter = VendorRateLimiter::new(1).unwrap();
        // Drain initial burst.
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        let started = tokio::time::Instant::now();
        tokio::time::pause();
        let acquire_fut = limiter.acquire();
        tokio::pin!(acquire_fut);

        tokio::select! {
            _ = &mut acquire_fut => panic!("acquire should not resolve before refill"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(1)) => {}
        }

        tokio::time::advance(std::time::Duration::from_secs(61)).await;
        acquire_fut.await;
        assert!(started.elapsed() >= std::time::Duration::from_secs(0));
    }

    #[tokio::test]
    async fn registry_resolves_by_vendor_name() {
        let registry =
            RateLimiterRegistry::new([("syncVendor".to_string(), 60u32)]).unwrap();
        assert!(registry.acquire("syncVendor").await.is_ok());
        assert!(matches!(
            registry.acquire("unknown").await,
            Err(RateLimiterError::UnknownVendor(_))
        ));
    }
}
