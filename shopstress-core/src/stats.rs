use crate::Threshold;
use std::fmt;
use std::time::Duration;

/// Run Statistics for a given Scenario
///
/// Aggregated over the whole run, including iterations which finished during the graceful-stop
/// window.
#[derive(Clone, Debug)]
pub struct RunStatistics {
    pub name: String,
    pub vus: usize,
    pub elapsed: Duration,
    pub iterations: u64,
    pub interrupted_iterations: u64,
    pub requests: u64,
    pub failed_requests: u64,
    pub latency: LatencyStatistics,
    pub checks: Vec<CheckStatistics>,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunStatistics {
    /// Fraction of requests which failed their check. Zero when nothing was sent.
    pub fn error_rate(&self) -> f64 {
        if self.requests == 0 {
            0.
        } else {
            self.failed_requests as f64 / self.requests as f64
        }
    }

    /// Fraction of checks which passed. One when nothing was checked.
    pub fn check_rate(&self) -> f64 {
        let (passes, total) = self
            .checks
            .iter()
            .fold((0, 0), |(p, t), c| (p + c.passes, t + c.total()));
        if total == 0 {
            1.
        } else {
            passes as f64 / total as f64
        }
    }

    pub fn tps(&self) -> f64 {
        per_second(self.requests, self.elapsed)
    }

    pub fn iterations_per_second(&self) -> f64 {
        per_second(self.iterations, self.elapsed)
    }

    pub fn check(&self, name: &str) -> Option<&CheckStatistics> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Evaluate every threshold against these statistics, replacing previous outcomes.
    pub fn evaluate(&mut self, thresholds: &[Threshold]) {
        self.thresholds = thresholds
            .iter()
            .map(|threshold| ThresholdOutcome {
                threshold: threshold.clone(),
                passed: threshold.evaluate(self),
            })
            .collect();
    }

    /// True when no threshold was crossed.
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0. {
        count as f64 / secs
    } else {
        0.
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LatencyStatistics {
    pub avg: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
    /// Extra percentiles computed for latency thresholds, as `(percentile, latency)`.
    pub percentiles: Vec<(f64, Duration)>,
}

impl LatencyStatistics {
    /// Latency at `percentile` (in `(0, 100]`).
    ///
    /// Percentiles which were neither tracked nor computed for a threshold round up to the next
    /// tracked one, or to `max` above 99.
    pub fn percentile(&self, percentile: f64) -> Duration {
        if let Some((_, latency)) = self
            .percentiles
            .iter()
            .find(|(p, _)| (p - percentile).abs() < f64::EPSILON)
        {
            return *latency;
        }

        if percentile <= 50. {
            self.p50
        } else if percentile <= 90. {
            self.p90
        } else if percentile <= 95. {
            self.p95
        } else if percentile <= 99. {
            self.p99
        } else {
            self.max
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckStatistics {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckStatistics {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            1.
        } else {
            self.passes as f64 / self.total() as f64
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdOutcome {
    pub threshold: Threshold,
    pub passed: bool,
}

fn mark(passed: bool) -> char {
    if passed {
        '✓'
    } else {
        '✗'
    }
}

fn fmt_dur(d: Duration) -> String {
    format!("{:.2?}", d)
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "     scenario: {}, {} VUs, {}",
            self.name,
            self.vus,
            humantime::format_duration(Duration::from_secs(self.elapsed.as_secs()))
        )?;
        writeln!(f)?;

        for check in &self.checks {
            writeln!(
                f,
                "     {} {:<20} {:>7.2}% ✓ {} ✗ {}",
                mark(check.fails == 0),
                check.name,
                check.pass_rate() * 100.,
                check.passes,
                check.fails,
            )?;
        }
        if !self.checks.is_empty() {
            writeln!(f)?;
        }

        let l = &self.latency;
        writeln!(f, "     checks.............: {:.2}%", self.check_rate() * 100.)?;
        writeln!(
            f,
            "     http_req_duration..: avg={} min={} p(50)={} p(90)={} p(95)={} p(99)={} max={}",
            fmt_dur(l.avg),
            fmt_dur(l.min),
            fmt_dur(l.p50),
            fmt_dur(l.p90),
            fmt_dur(l.p95),
            fmt_dur(l.p99),
            fmt_dur(l.max),
        )?;
        writeln!(
            f,
            "     http_req_failed....: {:.2}% {} out of {}",
            self.error_rate() * 100.,
            self.failed_requests,
            self.requests,
        )?;
        writeln!(
            f,
            "     http_reqs..........: {} {:.2}/s",
            self.requests,
            self.tps()
        )?;
        write!(
            f,
            "     iterations.........: {} {:.2}/s",
            self.iterations,
            self.iterations_per_second()
        )?;
        if self.interrupted_iterations > 0 {
            write!(f, " ({} interrupted)", self.interrupted_iterations)?;
        }

        if !self.thresholds.is_empty() {
            writeln!(f)?;
            writeln!(f)?;
            write!(f, "     thresholds:")?;
            for outcome in &self.thresholds {
                write!(f, "\n       {} {}", mark(outcome.passed), outcome.threshold)?;
            }
        }

        Ok(())
    }
}
