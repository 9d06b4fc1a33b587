//! Shared data structures for the forecast enhancement pipeline
//!
//! - `forecast`: Forecast / Variable containers and input errors
//! - `policy`: per-variable policy table (transforms, fallback rules,
//!   calibration and confidence defaults, change limits)
//! - `metrics`: enhancement summary metrics

mod forecast;
mod metrics;
pub mod policy;

pub use forecast::*;
pub use metrics::*;
pub use policy::{
    policy_for, CalibrationEntry, ChangeLimit, ConfidenceParams, DeltaNormalization,
    FallbackRule, Transform, VariablePolicy,
};
