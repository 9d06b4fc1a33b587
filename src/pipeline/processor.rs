//! Core enhancement pass over one forecast batch
//!
//! ```text
//! raw forecast
//!   → Normalizer + TimeLocationEncoder
//!   → Enhancer (model-backed or statistical)
//!   → PhysicsConstraintEngine (if enabled)
//!   → CalibrationEngine
//!   → ConfidenceScorer
//!   → Assembler (confidence gating)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use super::assembler::Assembler;
use crate::calibration::CalibrationEngine;
use crate::confidence::ConfidenceScorer;
use crate::config::EnhancerConfig;
use crate::enhancer::{Enhancer, InferenceEngine};
use crate::physics_engine::PhysicsConstraintEngine;
use crate::processing::TimeLocationEncoder;
use crate::stats;
use crate::types::{Forecast, InputFormatError};

/// One configured enhancement pass. Immutable after construction and safe to
/// share across threads.
#[derive(Debug)]
pub struct EnhancementPipeline {
    variables: Vec<String>,
    encoder: TimeLocationEncoder,
    enhancer: Enhancer,
    physics: Option<PhysicsConstraintEngine>,
    calibration: CalibrationEngine,
    scorer: ConfidenceScorer,
    assembler: Assembler,
}

impl EnhancementPipeline {
    /// Build from configuration. With `engine` the enhancer is model-backed,
    /// otherwise statistical.
    pub fn new(config: &EnhancerConfig, engine: Option<Arc<dyn InferenceEngine>>) -> Self {
        let calibration = CalibrationEngine::from_config(config);
        Self {
            variables: config.pipeline.variables.clone(),
            encoder: TimeLocationEncoder::new(),
            enhancer: Enhancer::new(engine, calibration.clone()),
            physics: config
                .pipeline
                .enable_physics_constraints
                .then(|| PhysicsConstraintEngine::new(config.physics.clone())),
            calibration,
            scorer: ConfidenceScorer::from_config(config),
            assembler: Assembler::new(config.pipeline.confidence_threshold),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.enhancer.name()
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Enhance one forecast. The input is only read.
    pub fn run(&self, forecast: &Forecast) -> Result<Forecast, InputFormatError> {
        let features = self
            .encoder
            .encode(forecast.timestamps(), forecast.latitude(), forecast.longitude());

        let enhanced = self.enhancer.enhance(forecast, &features, &self.variables);
        log_stage("enhance", &enhanced, forecast);

        let constrained = match &self.physics {
            Some(physics) => {
                let out = physics.apply(enhanced, forecast);
                log_stage("physics", &out, forecast);
                out
            }
            None => enhanced,
        };

        let calibrated: BTreeMap<String, Vec<f64>> = constrained
            .iter()
            .map(|(name, values)| (name.clone(), self.calibration.correct(name, values)))
            .collect();
        log_stage("calibrate", &calibrated, forecast);

        let traces = self.scorer.score_all(&calibrated, forecast);
        self.assembler.assemble(forecast, calibrated, traces)
    }
}

fn log_stage(stage: &'static str, values: &BTreeMap<String, Vec<f64>>, original: &Forecast) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    for (name, v) in values {
        let shift = original
            .values(name)
            .map(|o| stats::mean(v) - stats::mean(o))
            .unwrap_or(0.0);
        tracing::debug!(stage, variable = %name, mean = stats::mean(v), mean_shift = shift, "stage output");
    }
}
