//! Metrics and tracing setup (SPEC_FULL.md §10.2).

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters/gauges.
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_accepted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    vendor_calls: AtomicU64,
    vendor_call_errors: AtomicU64,
    breaker_trips: AtomicU64,
    sweeper_reclaims: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_accepted(&self) {
        self.jobs_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_accepted", "metric incremented");
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_completed", "metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "metric incremented");
    }

    pub fn vendor_call(&self, success: bool) {
        self.vendor_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.vendor_call_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn breaker_tripped(&self) {
        self.breaker_trips.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "breaker_trips", "metric incremented");
    }

    pub fn sweeper_reclaimed(&self, count: u64) {
        self.sweeper_reclaims.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            vendor_calls: self.vendor_calls.load(Ordering::Relaxed),
            vendor_call_errors: self.vendor_call_errors.load(Ordering::Relaxed),
            breaker_trips: self.breaker_trips.load(Ordering::Relaxed),
            sweeper_reclaims: self.sweeper_reclaims.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_accepted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub vendor_calls: u64,
    pub vendor_call_errors: u64,
    pub breaker_trips: u64,
    pub sweeper_reclaims: u64,
}

/// Initializes the global tracing subscriber from `RUST_LOG`/`LOG_LEVEL`, defaulting to `info`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
