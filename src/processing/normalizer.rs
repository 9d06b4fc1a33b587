//! Per-variable range normalization
//!
//! Each recognised variable has a fixed forward/inverse transform pair in the
//! policy table. Unrecognised variables pass through unchanged.

use crate::types::policy_for;

/// Stateless normalizer over the policy table transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Map raw values into the model range.
    ///
    /// Precipitation uses `log1p`, so negative input is outside the contract
    /// and yields NaN below -1.
    pub fn normalize(&self, name: &str, values: &[f64]) -> Vec<f64> {
        let transform = policy_for(name).transform;
        values.iter().map(|&v| transform.forward(v)).collect()
    }

    /// Map model-range values back to physical units.
    pub fn denormalize(&self, name: &str, normalized: &[f64]) -> Vec<f64> {
        let transform = policy_for(name).transform;
        normalized.iter().map(|&n| transform.inverse(n)).collect()
    }
}
