use crate::{Threshold, DEFAULT_DURATION, DEFAULT_GRACEFUL_STOP, DEFAULT_VUS};
use std::num::NonZeroU32;
use std::time::Duration;

#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub name: String,
    pub vus: usize,
    pub duration: Duration,
    pub graceful_stop: Duration,
    pub max_tps: Option<NonZeroU32>,
    pub thresholds: Vec<Threshold>,
}

impl ScenarioConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vus: DEFAULT_VUS,
            duration: DEFAULT_DURATION,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            max_tps: None,
            thresholds: vec![Threshold::default()],
        }
    }

    /// Clamp nonsensical values: a run always has at least one virtual user.
    pub fn effective_vus(&self) -> usize {
        self.vus.max(1)
    }
}
