//! First-pass enhancement
//!
//! ## Strategies
//!
//! - **ModelBacked**: normalizes the configured variables into a tensor, runs
//!   an external [`InferenceEngine`], splits and denormalizes its first output.
//!   Any failure drops back to the statistical strategy for that call.
//! - **StatisticalFallback**: deterministic calibration plus per-variable
//!   heuristics. Used when no engine is configured.

mod engine;
mod model;
mod statistical;

pub use engine::{InferenceEngine, InferenceError, ModelInputs, Tensor};
pub use model::ModelBacked;
pub use statistical::StatisticalFallback;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::calibration::CalibrationEngine;
use crate::processing::TimeLocationFeatures;
use crate::types::Forecast;

/// Enhancement strategy, selected once at construction.
#[derive(Debug)]
pub enum Enhancer {
    ModelBacked(ModelBacked),
    StatisticalFallback(StatisticalFallback),
}

impl Enhancer {
    /// Model-backed when an engine is supplied, statistical otherwise.
    pub fn new(engine: Option<Arc<dyn InferenceEngine>>, calibration: CalibrationEngine) -> Self {
        let fallback = StatisticalFallback::new(calibration);
        match engine {
            Some(engine) => Self::ModelBacked(ModelBacked::new(engine, fallback)),
            None => Self::StatisticalFallback(fallback),
        }
    }

    /// Get the backend name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::ModelBacked(m) => m.backend_name(),
            Self::StatisticalFallback(_) => "statistical",
        }
    }

    /// One enhanced array per requested variable present in the forecast,
    /// each the same length as the timestamps.
    pub fn enhance(
        &self,
        forecast: &Forecast,
        features: &TimeLocationFeatures,
        variables: &[String],
    ) -> BTreeMap<String, Vec<f64>> {
        match self {
            Self::ModelBacked(m) => m.enhance(forecast, features, variables),
            Self::StatisticalFallback(s) => s.enhance(forecast, features, variables),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{Normalizer, TimeLocationEncoder};
    use crate::types::policy::{PRECIPITATION, TEMPERATURE};
    use crate::types::Variable;
    use chrono::{Duration, TimeZone, Utc};

    /// Returns `normalized + 0.01` for every channel.
    struct Nudge;

    impl InferenceEngine for Nudge {
        fn run(&self, inputs: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
            assert_eq!(inputs.auxiliary.cols(), 6);
            let data = inputs.variables.data().iter().map(|v| v + 0.01).collect();
            Ok(vec![Tensor::new(inputs.variables.rows(), inputs.variables.cols(), data)?])
        }
        fn backend_name(&self) -> &'static str {
            "nudge"
        }
    }

    struct Failing;

    impl InferenceEngine for Failing {
        fn run(&self, _: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
            Err(InferenceError::Engine("device lost".into()))
        }
        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    /// Returns a single column regardless of input.
    struct WrongShape;

    impl InferenceEngine for WrongShape {
        fn run(&self, inputs: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
            Ok(vec![Tensor::new(inputs.variables.rows(), 1, vec![0.0; inputs.variables.rows()])?])
        }
        fn backend_name(&self) -> &'static str {
            "wrong-shape"
        }
    }

    struct NanOutput;

    impl InferenceEngine for NanOutput {
        fn run(&self, inputs: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
            let (r, c) = inputs.variables.shape();
            Ok(vec![Tensor::new(r, c, vec![f64::NAN; r * c])?])
        }
        fn backend_name(&self) -> &'static str {
            "nan"
        }
    }

    fn forecast() -> Forecast {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let ts = (0..4).map(|i| t0 + Duration::hours(i)).collect();
        Forecast::new(
            vec![
                Variable::new(TEMPERATURE, "K", vec![280.0, 281.0, 282.0, 283.0]),
                Variable::new(PRECIPITATION, "mm/hr", vec![0.0, 0.5, 1.5, 3.0]),
            ],
            ts,
            10.0,
            20.0,
            10.0,
            BTreeMap::new(),
        )
        .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(enhancer: &Enhancer, f: &Forecast, vars: &[String]) -> BTreeMap<String, Vec<f64>> {
        let features = TimeLocationEncoder::new().encode(f.timestamps(), f.latitude(), f.longitude());
        enhancer.enhance(f, &features, vars)
    }

    fn statistical(f: &Forecast, vars: &[String]) -> BTreeMap<String, Vec<f64>> {
        run(&Enhancer::new(None, CalibrationEngine::default()), f, vars)
    }

    #[test]
    fn test_model_output_is_denormalized() {
        let f = forecast();
        let vars = names(&[TEMPERATURE, PRECIPITATION]);
        let enhancer = Enhancer::new(Some(Arc::new(Nudge)), CalibrationEngine::default());
        assert_eq!(enhancer.name(), "nudge");

        let out = run(&enhancer, &f, &vars);
        let n = Normalizer::new();
        let expected: Vec<f64> = n
            .normalize(TEMPERATURE, f.values(TEMPERATURE).unwrap())
            .iter()
            .map(|v| v + 0.01)
            .collect();
        let expected = n.denormalize(TEMPERATURE, &expected);
        for (a, b) in out[TEMPERATURE].iter().zip(&expected) {
            assert!((a - b).abs() < 1e-9);
        }
        // +0.01 normalized is +0.5 K
        assert!((out[TEMPERATURE][0] - 280.5).abs() < 1e-9);
    }

    #[test]
    fn test_engine_failure_falls_back() {
        let f = forecast();
        let vars = names(&[TEMPERATURE, PRECIPITATION]);
        let enhancer = Enhancer::new(Some(Arc::new(Failing)), CalibrationEngine::default());
        assert_eq!(run(&enhancer, &f, &vars), statistical(&f, &vars));
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        let f = forecast();
        let vars = names(&[TEMPERATURE, PRECIPITATION]);
        let enhancer = Enhancer::new(Some(Arc::new(WrongShape)), CalibrationEngine::default());
        assert_eq!(run(&enhancer, &f, &vars), statistical(&f, &vars));
    }

    #[test]
    fn test_non_finite_output_falls_back() {
        let f = forecast();
        let vars = names(&[TEMPERATURE]);
        let enhancer = Enhancer::new(Some(Arc::new(NanOutput)), CalibrationEngine::default());
        assert_eq!(run(&enhancer, &f, &vars), statistical(&f, &vars));
    }

    #[test]
    fn test_missing_configured_variable_falls_back() {
        let f = forecast();
        let vars = names(&[TEMPERATURE, "cloud_cover"]);
        let enhancer = Enhancer::new(Some(Arc::new(Nudge)), CalibrationEngine::default());
        let out = run(&enhancer, &f, &vars);
        assert_eq!(out, statistical(&f, &vars));
        assert!(!out.contains_key("cloud_cover"));
    }

    #[test]
    fn test_statistical_name() {
        assert_eq!(Enhancer::new(None, CalibrationEngine::default()).name(), "statistical");
    }
}
