use crate::measurement::{default_tdigest, quantile_of, Measurement};
use pdatastructs::tdigest::{TDigest, K1};
use shopstress_core::{
    CheckStatistics, LatencyStat, LatencyStatistics, RunStatistics, ScenarioConfig, Threshold,
};
use std::time::Duration;

/// Whole-run aggregate of every interval measurement.
#[derive(Debug, Clone)]
pub(crate) struct RunData {
    success: u64,
    error: u64,
    iterations: u64,
    checks: Vec<CheckStatistics>,
    latency_count: u64,
    latency_sum: Duration,
    latency_min: Option<Duration>,
    latency_max: Duration,
    latency: TDigest<K1>,
}

impl RunData {
    pub fn new() -> Self {
        Self {
            success: 0,
            error: 0,
            iterations: 0,
            checks: vec![],
            latency_count: 0,
            latency_sum: Duration::ZERO,
            latency_min: None,
            latency_max: Duration::ZERO,
            latency: default_tdigest(),
        }
    }

    pub fn push(&mut self, measurement: &Measurement) {
        self.success += measurement.success;
        self.error += measurement.error;
        self.iterations += measurement.iterations;

        for check in &measurement.checks {
            match self.checks.iter_mut().find(|c| c.name == check.name) {
                Some(existing) => {
                    existing.passes += check.passes;
                    existing.fails += check.fails;
                }
                None => self.checks.push(check.clone()),
            }
        }

        // NOTE: TDigest does not support merge, so every raw latency is inserted again here.
        for latency in measurement.latencies() {
            self.latency.insert(latency.as_secs_f64());
            self.latency_count += 1;
            self.latency_sum += *latency;
            self.latency_min = Some(self.latency_min.map_or(*latency, |m| m.min(*latency)));
            self.latency_max = self.latency_max.max(*latency);
        }
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        if self.latency_count == 0 {
            Duration::ZERO
        } else {
            quantile_of(&self.latency, quantile)
        }
    }

    /// Whole-run latency, plus every percentile named by a latency threshold.
    fn latency_statistics(&self, thresholds: &[Threshold]) -> LatencyStatistics {
        if self.latency_count == 0 {
            return LatencyStatistics::default();
        }

        let percentiles = thresholds
            .iter()
            .filter_map(|threshold| match threshold {
                Threshold::Latency {
                    stat: LatencyStat::Quantile(p),
                    ..
                } => Some((*p, self.latency(*p / 100.))),
                _ => None,
            })
            .collect();

        LatencyStatistics {
            avg: Duration::from_nanos(
                (self.latency_sum.as_nanos() / self.latency_count as u128) as u64,
            ),
            min: self.latency_min.unwrap_or_default(),
            max: self.latency_max,
            p50: self.latency(0.5),
            p90: self.latency(0.9),
            p95: self.latency(0.95),
            p99: self.latency(0.99),
            percentiles,
        }
    }

    pub fn into_statistics(
        self,
        config: &ScenarioConfig,
        elapsed: Duration,
        interrupted_iterations: u64,
    ) -> RunStatistics {
        let mut stats = RunStatistics {
            name: config.name.clone(),
            vus: config.effective_vus(),
            elapsed,
            iterations: self.iterations,
            interrupted_iterations,
            requests: self.success + self.error,
            failed_requests: self.error,
            latency: self.latency_statistics(&config.thresholds),
            checks: self.checks,
            thresholds: vec![],
        };
        stats.evaluate(&config.thresholds);
        stats
    }
}
