//! Per-dependency circuit breaker with CLOSED/OPEN/HALF_OPEN states.
//!
//! Extends the counter/atomics shape of a feature-flag-service database breaker with the
//! pieces this service needs: a real elapsed-time-since-last-failure check (an `Instant`
//! captured at the failure, not a since-epoch approximation), rolling average latency,
//! an error-rate-with-minimum-samples trip condition, and an `execute()` wrapper that
//! times the operation out and records the outcome in one call.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use bon::Builder;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, Builder)]
pub struct BreakerConfig {
    #[builder(default = 5)]
    pub failure_threshold: usize,
    #[builder(default = Duration::from_secs(30))]
    pub recovery_timeout: Duration,
    #[builder(default = Duration::from_secs(60))]
    pub monitoring_window: Duration,
    #[builder(default = Duration::from_secs(5))]
    pub latency_threshold: Duration,
    #[builder(default = 10)]
    pub minimum_requests: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig::builder().build()
    }
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker '{0}' is open")]
    Open(String),
    #[error("operation exceeded latency threshold")]
    Timeout,
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug, Clone)]
struct Sample {
    at: Instant,
    success: bool,
    latency: Duration,
}

/// A single named circuit breaker instance (one per vendor, plus one each for the
/// store and queue as collaborators, per SPEC_FULL.md §4.2).
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: AtomicUsize, // 0 = Closed, 1 = Open, 2 = HalfOpen
    half_open_calls: AtomicUsize,
    last_failure: RwLock<Option<Instant>>,
    window: Mutex<Vec<Sample>>,
    total_requests: AtomicU64,
}

const HALF_OPEN_MAX_CALLS: usize = 5;

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: AtomicUsize::new(0),
            half_open_calls: AtomicUsize::new(0),
            last_failure: RwLock::new(None),
            window: Mutex::new(Vec::new()),
            total_requests: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> BreakerState {
        match self.state.load(Ordering::Acquire) {
            0 => BreakerState::Closed,
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    fn set_state(&self, state: BreakerState) {
        self.state.store(
            match state {
                BreakerState::Closed => 0,
                BreakerState::Open => 1,
                BreakerState::HalfOpen => 2,
            },
            Ordering::Release,
        );
    }

    /// Whether a call is currently allowed, transitioning Open -> HalfOpen if the
    /// recovery timeout has elapsed since the last recorded failure.
    fn can_execute(&self) -> bool {
        match self.state() {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = self
                    .last_failure
                    .read()
                    .unwrap()
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.recovery_timeout {
                    self.set_state(BreakerState::HalfOpen);
                    self.half_open_calls.store(0, Ordering::Relaxed);
                    tracing::info!(breaker = %self.name, "transitioning Open -> HalfOpen");
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                let calls = self.half_open_calls.fetch_add(1, Ordering::Relaxed);
                calls < HALF_OPEN_MAX_CALLS
            }
        }
    }

    fn record(&self, success: bool, latency: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        {
            let mut window = self.window.lock().unwrap();
            window.push(Sample {
                at: now,
                success,
                latency,
            });
            let cutoff = now - self.config.monitoring_window;
            window.retain(|s| s.at >= cutoff);
        }

        match self.state() {
            BreakerState::Closed => {
                if !success || self.trip_condition_met() {
                    self.trip();
                }
            }
            BreakerState::HalfOpen => {
                if success {
                    self.close();
                } else {
                    self.trip();
                }
            }
            BreakerState::Open => {
                if !success {
                    *self.last_failure.write().unwrap() = Some(now);
                }
            }
        }
    }

    fn trip_condition_met(&self) -> bool {
        let window = self.window.lock().unwrap();
        let total = window.len();
        if total == 0 {
            return false;
        }
        let failures = window.iter().filter(|s| !s.success).count();
        if failures >= self.config.failure_threshold {
            return true;
        }
        if total >= self.config.minimum_requests {
            let error_rate = failures as f64 / total as f64;
            if error_rate > 0.5 {
                return true;
            }
        }
        let avg_latency: Duration =
            window.iter().map(|s| s.latency).sum::<Duration>() / total as u32;
        avg_latency > self.config.latency_threshold * 2
    }

    fn trip(&self) {
        if self.state() != BreakerState::Open {
            tracing::warn!(breaker = %self.name, "tripping to Open");
        }
        self.set_state(BreakerState::Open);
        *self.last_failure.write().unwrap() = Some(Instant::now());
    }

    fn close(&self) {
        tracing::info!(breaker = %self.name, "closing circuit");
        self.set_state(BreakerState::Closed);
        self.half_open_calls.store(0, Ordering::Relaxed);
        self.window.lock().unwrap().clear();
    }

    pub fn stats(&self) -> BreakerStats {
        let window = self.window.lock().unwrap();
        let total = window.len();
        let failures = window.iter().filter(|s| !s.success).count();
        let avg_latency = if total > 0 {
            window.iter().map(|s| s.latency).sum::<Duration>() / total as u32
        } else {
            Duration::ZERO
        };
        BreakerStats {
            state: self.state(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            window_requests: total,
            window_failures: failures,
            error_rate: if total > 0 {
                failures as f64 / total as f64
            } else {
                0.0
            },
            avg_latency,
        }
    }

    /// Runs `op` under the breaker: fails fast if open, enforces `latency_threshold`
    /// as a timeout, and records the outcome either way.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.can_execute() {
            return Err(BreakerError::Open(self.name.clone()));
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.latency_threshold, op()).await;
        let latency = started.elapsed();

        match outcome {
            Ok(Ok(value)) => {
                self.record(true, latency);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record(false, latency);
                Err(BreakerError::Inner(err))
            }
            Err(_) => {
                self.record(false, latency);
                Err(BreakerError::Timeout)
            }
        }
    }

    /// Test hook: force the breaker open regardless of recorded history.
    pub fn force_open(&self) {
        self.trip();
    }

    /// Test hook: force the breaker closed and clear history.
    pub fn force_close(&self) {
        self.close();
    }

    /// Test hook: reset to the initial Closed state with empty history.
    pub fn reset(&self) {
        self.close();
        self.total_requests.store(0, Ordering::Relaxed);
        *self.last_failure.write().unwrap() = None;
    }
}

#[derive(Debug, Clone)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub total_requests: u64,
    pub window_requests: usize,
    pub window_failures: usize,
    pub error_rate: f64,
    pub avg_latency: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn fast_config() -> BreakerConfig {
        BreakerConfig::builder()
            .failure_threshold(2)
            .recovery_timeout(Duration::from_millis(50))
            .monitoring_window(Duration::from_secs(60))
            .latency_threshold(Duration::from_millis(200))
            .minimum_requests(4)
            .build()
    }

    #[tokio::test]
    async fn trips_after_failure_threshold() {
        let breaker = CircuitBreaker::new("vendor", fast_config());
        for _ in 0..2 {
            let _ = breaker
                .execute(|| async { Err::<(), _>("boom") })
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn fails_fast_while_open() {
        let breaker = CircuitBreaker::new("vendor", fast_config());
        breaker.force_open();
        let result: Result<(), BreakerError<&str>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(BreakerError::Open(_))));
    }

    #[tokio::test]
    async fn recovers_after_timeout_and_one_success() {
        let breaker = CircuitBreaker::new("vendor", fast_config());
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result: Result<(), BreakerError<Infallible>> =
            breaker.execute(|| async { Ok(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("vendor", fast_config());
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = breaker.execute(|| async { Err::<(), _>("still broken") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let breaker = CircuitBreaker::new("vendor", fast_config());
        for _ in 0..2 {
            let result: Result<(), BreakerError<Infallible>> = breaker
                .execute(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                })
                .await;
            assert!(matches!(result, Err(BreakerError::Timeout)));
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn reset_returns_to_closed_with_empty_stats() {
        let breaker = CircuitBreaker::new("vendor", fast_config());
        breaker.force_open();
        breaker.reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.stats().total_requests, 0);
    }
}
