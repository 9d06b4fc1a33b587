//! Batch statistics shared by calibration, constraints and confidence scoring.
//!
//! Thin wrappers over `statrs` that define the empty-batch behaviour once.

use statrs::statistics::Statistics;

/// Arithmetic mean. An empty batch has mean 0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// `max - min` over the batch. An empty batch has range 0.
pub fn range(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    Statistics::max(values.iter()) - Statistics::min(values.iter())
}
