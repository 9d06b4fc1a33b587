//! Confidence-gated output assembly

use std::collections::BTreeMap;

use crate::types::{EnhancementTrace, Forecast, InputFormatError, Variable};

/// Merges scored enhancements into an output forecast.
///
/// Where a sample's confidence falls below the threshold the original value
/// is restored and its delta zeroed. The computed confidence is kept so the
/// caller can see why the sample was reverted.
#[derive(Debug, Clone, Copy)]
pub struct Assembler {
    threshold: f64,
}

impl Assembler {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            threshold: confidence_threshold,
        }
    }

    /// Build the enhanced forecast.
    ///
    /// Variables of `original` that were not scored are copied unchanged.
    /// Location, radius, time axis and metadata come from `original`.
    pub fn assemble(
        &self,
        original: &Forecast,
        enhanced: BTreeMap<String, Vec<f64>>,
        mut traces: BTreeMap<String, EnhancementTrace>,
    ) -> Result<Forecast, InputFormatError> {
        let mut reverted = 0usize;
        let mut output: Vec<Variable> = Vec::with_capacity(original.variables().len());

        for (name, var) in original.variables() {
            let (Some(values), Some(trace)) = (enhanced.get(name), traces.remove(name)) else {
                output.push(var.clone());
                continue;
            };

            let EnhancementTrace { confidence, delta } = trace;
            let mut gated_values = Vec::with_capacity(values.len());
            let mut gated_delta = Vec::with_capacity(values.len());
            let samples = confidence.iter().zip(&delta).zip(values.iter().zip(&var.values));
            for ((&c, &d), (&enh, &orig)) in samples {
                if c < self.threshold {
                    gated_values.push(orig);
                    gated_delta.push(0.0);
                    reverted += 1;
                } else {
                    gated_values.push(enh);
                    gated_delta.push(d);
                }
            }

            output.push(
                Variable::new(name.clone(), var.units.clone(), gated_values)
                    .with_enhancement(confidence, gated_delta)?,
            );
        }

        // Scored variables with no original counterpart cannot be reverted
        for (name, trace) in traces {
            if let Some(values) = enhanced.get(&name) {
                output.push(
                    Variable::new(name.clone(), "", values.clone())
                        .with_enhancement(trace.confidence, trace.delta)?,
                );
            }
        }

        tracing::debug!(reverted, threshold = self.threshold, "assembled enhanced forecast");
        original.with_variables(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn original() -> Forecast {
        let t0 = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), crate::types::MetadataValue::Text("gfs".into()));
        Forecast::new(
            vec![
                Variable::new("temperature_2m", "K", vec![290.0, 291.0, 292.0]),
                Variable::new("snow_depth", "m", vec![0.1, 0.2, 0.3]),
            ],
            vec![t0, t0 + Duration::hours(1), t0 + Duration::hours(2)],
            12.0,
            34.0,
            7.5,
            metadata,
        )
        .unwrap()
    }

    fn inputs() -> (BTreeMap<String, Vec<f64>>, BTreeMap<String, EnhancementTrace>) {
        let mut enhanced = BTreeMap::new();
        enhanced.insert("temperature_2m".to_string(), vec![291.0, 295.0, 292.5]);
        let mut traces = BTreeMap::new();
        traces.insert(
            "temperature_2m".to_string(),
            EnhancementTrace {
                confidence: vec![0.83, 0.6, 0.84],
                delta: vec![1.0, 4.0, 0.5],
            },
        );
        (enhanced, traces)
    }

    #[test]
    fn test_low_confidence_reverts_value_but_keeps_confidence() {
        let (enhanced, traces) = inputs();
        let out = Assembler::new(0.7).assemble(&original(), enhanced, traces).unwrap();
        let t = out.variable("temperature_2m").unwrap();
        assert_eq!(t.values, vec![291.0, 291.0, 292.5]);
        assert_eq!(t.delta().unwrap(), &[1.0, 0.0, 0.5]);
        assert_eq!(t.confidence().unwrap(), &[0.83, 0.6, 0.84]);
    }

    #[test]
    fn test_threshold_one_restores_original() {
        let (enhanced, traces) = inputs();
        let orig = original();
        let out = Assembler::new(1.0).assemble(&orig, enhanced, traces).unwrap();
        assert_eq!(out.values("temperature_2m"), orig.values("temperature_2m"));
        assert!(out.variable("temperature_2m").unwrap().delta().unwrap().iter().all(|d| *d == 0.0));
    }

    #[test]
    fn test_unscored_variables_and_context_copied() {
        let (enhanced, traces) = inputs();
        let orig = original();
        let out = Assembler::new(0.7).assemble(&orig, enhanced, traces).unwrap();
        assert_eq!(out.variable("snow_depth"), orig.variable("snow_depth"));
        assert!(out.variable("snow_depth").unwrap().enhancement.is_none());
        assert_eq!(out.timestamps(), orig.timestamps());
        assert_eq!(out.latitude(), 12.0);
        assert_eq!(out.longitude(), 34.0);
        assert_eq!(out.radius_miles(), 7.5);
        assert_eq!(out.metadata(), orig.metadata());
    }
}
