//! Bias/variance calibration
//!
//! Rescales each variable's spread around its batch mean and shifts it by a
//! historical bias: `(v - mean)·scale + mean + bias`.

use std::collections::BTreeMap;

use crate::config::EnhancerConfig;
use crate::stats;
use crate::types::{policy_for, CalibrationEntry};

/// Calibration table. Configured entries override the policy defaults;
/// variables with neither get the identity correction.
#[derive(Debug, Clone, Default)]
pub struct CalibrationEngine {
    overrides: BTreeMap<String, CalibrationEntry>,
}

impl CalibrationEngine {
    pub fn new(overrides: BTreeMap<String, CalibrationEntry>) -> Self {
        Self { overrides }
    }

    pub fn from_config(config: &EnhancerConfig) -> Self {
        Self::new(config.calibration.clone())
    }

    pub fn entry(&self, name: &str) -> CalibrationEntry {
        self.overrides
            .get(name)
            .copied()
            .unwrap_or(policy_for(name).calibration)
    }

    /// Apply the correction to one batch. Empty input gives empty output.
    pub fn correct(&self, name: &str, values: &[f64]) -> Vec<f64> {
        if values.is_empty() {
            return Vec::new();
        }
        let CalibrationEntry { bias, scale } = self.entry(name);
        let m = stats::mean(values);
        values.iter().map(|v| (v - m) * scale + m + bias).collect()
    }
}
