//! Enhancement summary metrics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Forecast;
use crate::stats;

/// Mean confidence and mean absolute delta for one enhanced variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariableMetrics {
    pub confidence: f64,
    pub magnitude: f64,
}

/// Summary of an enhanced forecast, averaged over the variables that carry
/// an enhancement trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancementMetrics {
    pub overall_confidence: f64,
    pub variables_enhanced: usize,
    pub average_enhancement_magnitude: f64,
    pub per_variable: BTreeMap<String, VariableMetrics>,
}

impl EnhancementMetrics {
    /// Compute metrics from a forecast produced by the pipeline.
    ///
    /// Variables without confidence/delta (pass-through variables) are ignored.
    /// A forecast with no enhanced variables yields all-zero metrics.
    pub fn from_forecast(forecast: &Forecast) -> Self {
        let mut per_variable = BTreeMap::new();

        for (name, var) in forecast.variables() {
            let Some(trace) = &var.enhancement else {
                continue;
            };
            let abs_delta: Vec<f64> = trace.delta.iter().map(|d| d.abs()).collect();
            per_variable.insert(
                name.clone(),
                VariableMetrics {
                    confidence: stats::mean(&trace.confidence),
                    magnitude: stats::mean(&abs_delta),
                },
            );
        }

        let count = per_variable.len();
        if count == 0 {
            return Self::default();
        }

        let total_confidence: f64 = per_variable.values().map(|m| m.confidence).sum();
        let total_magnitude: f64 = per_variable.values().map(|m| m.magnitude).sum();

        Self {
            overall_confidence: total_confidence / count as f64,
            variables_enhanced: count,
            average_enhancement_magnitude: total_magnitude / count as f64,
            per_variable,
        }
    }
}
