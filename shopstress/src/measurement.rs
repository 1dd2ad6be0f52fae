use pdatastructs::tdigest::{TDigest, K1};
use shopstress_core::CheckStatistics;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Counters drained from the virtual users over a single sampling interval.
#[derive(Debug, Clone)]
pub(crate) struct Measurement {
    pub success: u64,
    pub error: u64,
    pub iterations: u64,
    pub elapsed: Duration,
    pub checks: Vec<CheckStatistics>,
    latencies: Vec<Duration>,
    latency: TDigest<K1>,
}

impl Measurement {
    pub fn new(success: u64, error: u64, iterations: u64, elapsed: Duration) -> Self {
        Self {
            success,
            error,
            iterations,
            elapsed,
            checks: vec![],
            latencies: vec![],
            latency: default_tdigest(),
        }
    }

    pub fn populate_latencies(&mut self, dur: &[Duration]) {
        for latency in dur {
            self.latency.insert(latency.as_secs_f64());
        }
        self.latencies.extend_from_slice(dur);
    }

    pub fn latencies(&self) -> &[Duration] {
        &self.latencies
    }

    pub fn total(&self) -> u64 {
        self.success + self.error
    }

    pub fn tps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0. {
            self.total() as f64 / secs
        } else {
            0.
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.total() == 0 {
            0.
        } else {
            self.error as f64 / self.total() as f64
        }
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        if self.latencies.is_empty() {
            Duration::ZERO
        } else {
            quantile_of(&self.latency, quantile)
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TPS={:.2}, ErrorRate={:.4}, Iterations={}, p50={:?}, p90={:?}, p99={:?}",
            self.tps(),
            self.error_rate(),
            self.iterations,
            self.latency(0.5),
            self.latency(0.90),
            self.latency(0.99),
        )
    }
}

pub(crate) fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

/// NOTE: Callers must check for an empty digest first; its quantiles are NaN.
pub(crate) fn quantile_of(digest: &TDigest<K1>, quantile: f64) -> Duration {
    let secs = digest.quantile(quantile);

    // TDigest sometimes returns NaN which we need to filter for.
    let secs = if secs.is_finite() && secs >= 0. {
        secs
    } else {
        error!("Non-finite latency quantile calculated; reporting zero.");
        0.
    };

    Duration::from_secs_f64(secs)
}

/// Per-check pass/fail counts, keyed by transaction name.
#[derive(Debug, Default)]
pub(crate) struct CheckTally {
    checks: BTreeMap<&'static str, (u64, u64)>,
}

impl CheckTally {
    pub fn record(&mut self, name: &'static str, passed: bool) {
        let entry = self.checks.entry(name).or_default();
        if passed {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    pub fn snapshot(&self) -> Vec<CheckStatistics> {
        self.checks
            .iter()
            .map(|(name, (passes, fails))| CheckStatistics {
                name: name.to_string(),
                passes: *passes,
                fails: *fails,
            })
            .collect()
    }

    pub fn drain(&mut self) -> Vec<CheckStatistics> {
        let snapshot = self.snapshot();
        self.checks.clear();
        snapshot
    }
}
