use crate::measurement::{CheckTally, Measurement};
use crate::transaction::TransactionData;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics_util::AtomicBucket;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters shared by every virtual user of a single run.
pub(crate) struct TaskAtomics {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    success: Arc<AtomicU64>,
    error: Arc<AtomicU64>,
    iterations: Arc<AtomicU64>,
    latency: Arc<AtomicBucket<Duration>>,
    checks: Arc<Mutex<CheckTally>>,
}

impl TaskAtomics {
    pub fn new(tps_limit: Option<NonZeroU32>) -> Self {
        Self {
            limiter: tps_limit.map(|tps| Arc::new(rate_limiter(tps))),
            success: Arc::new(AtomicU64::new(0)),
            error: Arc::new(AtomicU64::new(0)),
            iterations: Arc::new(AtomicU64::new(0)),
            latency: Arc::new(AtomicBucket::new()),
            checks: Arc::new(Mutex::new(CheckTally::default())),
        }
    }

    pub fn clone_to_transaction_data(&self) -> TransactionData {
        TransactionData {
            limiter: self.limiter.clone(),
            success: self.success.clone(),
            error: self.error.clone(),
            latency: self.latency.clone(),
            checks: self.checks.clone(),
        }
    }

    pub fn iterations(&self) -> Arc<AtomicU64> {
        self.iterations.clone()
    }

    pub fn collect(&self, elapsed: Duration) -> Measurement {
        let success = self.success.swap(0, Ordering::Relaxed);
        let error = self.error.swap(0, Ordering::Relaxed);
        let iterations = self.iterations.swap(0, Ordering::Relaxed);
        let mut measurement = Measurement::new(success, error, iterations, elapsed);
        self.latency
            .clear_with(|dur| measurement.populate_latencies(dur));
        if let Ok(mut checks) = self.checks.lock() {
            measurement.checks = checks.drain();
        }
        measurement
    }
}

fn rate_limiter(tps_limit: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps_limit).allow_burst(NonZeroU32::MIN))
}
