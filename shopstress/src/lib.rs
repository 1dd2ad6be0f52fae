#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Lets the proc-macros refer to `::shopstress` from inside this crate as well.
extern crate self as shopstress;

pub mod scenario;
pub mod shop;
#[doc(hidden)]
pub mod transaction;

pub(crate) mod data;
pub(crate) mod measurement;
pub(crate) mod sampler;

#[doc(hidden)]
pub use shopstress_core as core;

pub use scenario::Scenario;
pub use shopstress_core::{RunStatistics, Threshold};
pub use shopstress_macros::{scenario, transaction};

pub mod prelude {
    pub use crate::scenario::ConfigurableScenario;
    pub use shopstress_core::{CheckStatistics, RunStatistics, Threshold};
    pub use shopstress_macros::{scenario, transaction};
}
