use crate::{RunStatistics, DEFAULT_FAILURE_RATE_THRESHOLD};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Run-level pass/fail criterion, evaluated once the run has finished.
///
/// Parsed from expressions of the form `<metric><op><value>`:
///
/// ```
/// use shopstress_core::Threshold;
///
/// let failed: Threshold = "http_req_failed<0.001".parse().unwrap();
/// let checks: Threshold = "checks>=0.99".parse().unwrap();
/// let latency: Threshold = "p(95)<500ms".parse().unwrap();
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Threshold {
    /// Fraction of failed requests.
    FailureRate { op: Comparison, rate: f64 },
    /// Fraction of passed checks.
    CheckRate { op: Comparison, rate: f64 },
    /// Request latency statistic.
    Latency {
        stat: LatencyStat,
        op: Comparison,
        limit: Duration,
    },
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::FailureRate {
            op: Comparison::Lt,
            rate: DEFAULT_FAILURE_RATE_THRESHOLD,
        }
    }
}

impl Threshold {
    pub fn evaluate(&self, stats: &RunStatistics) -> bool {
        match self {
            Threshold::FailureRate { op, rate } => op.holds(stats.error_rate(), *rate),
            Threshold::CheckRate { op, rate } => op.holds(stats.check_rate(), *rate),
            Threshold::Latency { stat, op, limit } => {
                let observed = match stat {
                    LatencyStat::Avg => stats.latency.avg,
                    LatencyStat::Max => stats.latency.max,
                    LatencyStat::Quantile(q) => stats.latency.percentile(*q),
                };
                op.holds(observed, *limit)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn holds<T: PartialOrd>(&self, observed: T, limit: T) -> bool {
        match self {
            Comparison::Lt => observed < limit,
            Comparison::Le => observed <= limit,
            Comparison::Gt => observed > limit,
            Comparison::Ge => observed >= limit,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LatencyStat {
    Avg,
    Max,
    /// Percentile in (0, 100]
    Quantile(f64),
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdParseError {
    #[error("Missing comparison operator in threshold `{0}`")]
    MissingOperator(String),

    #[error("Unknown threshold metric `{0}`")]
    UnknownMetric(String),

    #[error("Invalid rate `{0}`, expected a number between 0 and 1")]
    InvalidRate(String),

    #[error("Invalid percentile `{0}`, expected p(N) with N in (0, 100]")]
    InvalidPercentile(String),

    #[error("Invalid duration `{0}`: {1}")]
    InvalidDuration(String, String),
}

impl FromStr for Threshold {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let idx = s
            .find(['<', '>'])
            .ok_or_else(|| ThresholdParseError::MissingOperator(s.to_string()))?;
        let (metric, rest) = s.split_at(idx);
        let (op, value) = if let Some(v) = rest.strip_prefix("<=") {
            (Comparison::Le, v)
        } else if let Some(v) = rest.strip_prefix(">=") {
            (Comparison::Ge, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (Comparison::Lt, v)
        } else {
            (Comparison::Gt, &rest[1..])
        };
        let metric = metric.trim();
        let value = value.trim();

        match metric {
            "http_req_failed" => Ok(Threshold::FailureRate {
                op,
                rate: parse_rate(value)?,
            }),
            "checks" => Ok(Threshold::CheckRate {
                op,
                rate: parse_rate(value)?,
            }),
            "avg" | "max" => Ok(Threshold::Latency {
                stat: if metric == "avg" {
                    LatencyStat::Avg
                } else {
                    LatencyStat::Max
                },
                op,
                limit: parse_duration(value)?,
            }),
            _ if metric.starts_with("p(") => Ok(Threshold::Latency {
                stat: LatencyStat::Quantile(parse_percentile(metric)?),
                op,
                limit: parse_duration(value)?,
            }),
            _ => Err(ThresholdParseError::UnknownMetric(metric.to_string())),
        }
    }
}

fn parse_rate(value: &str) -> Result<f64, ThresholdParseError> {
    match value.parse::<f64>() {
        Ok(rate) if (0. ..=1.).contains(&rate) => Ok(rate),
        _ => Err(ThresholdParseError::InvalidRate(value.to_string())),
    }
}

fn parse_percentile(metric: &str) -> Result<f64, ThresholdParseError> {
    let err = || ThresholdParseError::InvalidPercentile(metric.to_string());
    let inner = metric
        .strip_prefix("p(")
        .and_then(|m| m.strip_suffix(')'))
        .ok_or_else(err)?;
    match inner.trim().parse::<f64>() {
        Ok(q) if q > 0. && q <= 100. => Ok(q),
        _ => Err(err()),
    }
}

fn parse_duration(value: &str) -> Result<Duration, ThresholdParseError> {
    humantime::parse_duration(value)
        .map_err(|e| ThresholdParseError::InvalidDuration(value.to_string(), e.to_string()))
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::FailureRate { op, rate } => {
                write!(f, "http_req_failed{}{}", op.as_str(), rate)
            }
            Threshold::CheckRate { op, rate } => write!(f, "checks{}{}", op.as_str(), rate),
            Threshold::Latency { stat, op, limit } => {
                match stat {
                    LatencyStat::Avg => write!(f, "avg")?,
                    LatencyStat::Max => write!(f, "max")?,
                    LatencyStat::Quantile(q) => write!(f, "p({q})")?,
                }
                write!(f, "{}{}", op.as_str(), humantime::format_duration(*limit))
            }
        }
    }
}
