//! Per-sample confidence scoring
//!
//! Confidence drops linearly with the size of the enhancement relative to
//! what is routine for the variable:
//!
//! `confidence = max(0.5, base - change_penalty · normalized_delta)`
//!
//! and never exceeds `base`. How `|delta|` is normalized comes from the
//! variable's policy row.

use std::collections::BTreeMap;

use crate::config::defaults::{CONFIDENCE_FLOOR, FLAT_BATCH_MEAN_OFFSET, UNMATCHED_VARIABLE_CONFIDENCE};
use crate::config::EnhancerConfig;
use crate::stats;
use crate::types::{policy_for, ConfidenceParams, DeltaNormalization, EnhancementTrace, Forecast};

#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    overrides: BTreeMap<String, ConfidenceParams>,
}

impl ConfidenceScorer {
    pub fn new(overrides: BTreeMap<String, ConfidenceParams>) -> Self {
        Self { overrides }
    }

    pub fn from_config(config: &EnhancerConfig) -> Self {
        Self::new(config.confidence.clone())
    }

    pub fn params(&self, name: &str) -> ConfidenceParams {
        self.overrides
            .get(name)
            .copied()
            .unwrap_or(policy_for(name).confidence)
    }

    /// Score one variable against its original values.
    ///
    /// `enhanced` and `original` must have the same length.
    pub fn score(&self, name: &str, enhanced: &[f64], original: &[f64]) -> EnhancementTrace {
        let params = self.params(name);
        let delta: Vec<f64> = enhanced.iter().zip(original).map(|(e, o)| e - o).collect();

        let normalization = policy_for(name).normalization;
        let batch_range = stats::range(original);
        let flat_denominator = stats::mean(original) + FLAT_BATCH_MEAN_OFFSET;

        let confidence = delta
            .iter()
            .zip(original)
            .map(|(d, o)| {
                let magnitude = d.abs();
                let normalized = match normalization {
                    DeltaNormalization::FixedSpan(span) => ratio(magnitude, span),
                    DeltaNormalization::RelativeToOriginal { epsilon } => {
                        ratio(magnitude, o + epsilon)
                    }
                    DeltaNormalization::BatchRange if batch_range > 0.0 => {
                        ratio(magnitude, batch_range)
                    }
                    DeltaNormalization::BatchRange => ratio(magnitude, flat_denominator),
                };
                confidence_from(params, normalized)
            })
            .collect();

        EnhancementTrace { confidence, delta }
    }

    /// Score every enhanced variable. Variables missing from the original
    /// get a flat confidence and zero delta.
    pub fn score_all(
        &self,
        enhanced: &BTreeMap<String, Vec<f64>>,
        original: &Forecast,
    ) -> BTreeMap<String, EnhancementTrace> {
        enhanced
            .iter()
            .map(|(name, values)| {
                let trace = match original.values(name) {
                    Some(orig) => self.score(name, values, orig),
                    None => EnhancementTrace {
                        confidence: vec![UNMATCHED_VARIABLE_CONFIDENCE; values.len()],
                        delta: vec![0.0; values.len()],
                    },
                };
                (name.clone(), trace)
            })
            .collect()
    }
}

/// `magnitude / denominator` where a zero change is always 0 and any change
/// over a non-positive denominator is unbounded.
fn ratio(magnitude: f64, denominator: f64) -> f64 {
    if magnitude == 0.0 {
        0.0
    } else if denominator > 0.0 {
        magnitude / denominator
    } else {
        f64::INFINITY
    }
}

fn confidence_from(params: ConfidenceParams, normalized_delta: f64) -> f64 {
    let penalty = if params.change_penalty == 0.0 {
        0.0
    } else {
        params.change_penalty * normalized_delta
    };
    let score = params.base - penalty;
    if score.is_nan() {
        return CONFIDENCE_FLOOR.min(params.base);
    }
    score.max(CONFIDENCE_FLOOR).min(params.base)
}
