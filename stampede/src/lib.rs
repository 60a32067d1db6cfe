#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod harness;
pub mod rotation;
pub mod scheduler;
pub mod threshold;

#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
pub mod http;

pub(crate) mod aggregate;
pub(crate) mod collector;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod pool;

pub use aggregate::{MetricSnapshot, Snapshot};
pub use collector::{Sample, ITERATION_DURATION};
pub use error::Error;
pub use harness::{ConfigurableHarness, Harness};
pub use scheduler::Stage;
pub use threshold::{RunResult, Threshold, ThresholdOutcome};

pub mod prelude {
    pub use crate::harness::{ConfigurableHarness, Harness};
    pub use crate::scheduler::Stage;
    pub use crate::threshold::RunResult;
    pub use crate::ITERATION_DURATION;

    #[cfg(feature = "http")]
    pub use crate::http::PagePlan;
}
