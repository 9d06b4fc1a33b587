//! Forecast Enhancement Pipeline
//!
//! ## Stages
//!
//! ```text
//! STAGE 1: Normalize + encode time/location features
//! STAGE 2: First-pass enhancement (model-backed or statistical)
//! STAGE 3: Physics constraints against the original (if enabled)
//! STAGE 4: Bias/variance calibration
//! STAGE 5: Confidence scoring
//! STAGE 6: Confidence-gated assembly
//! ```
//!
//! [`ForecastEnhancer`] wraps one configured [`EnhancementPipeline`] with the
//! result cache and payload parsing.

mod assembler;
mod processor;

pub use assembler::Assembler;
pub use processor::EnhancementPipeline;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ConfigError, EnhancerConfig};
use crate::enhancer::InferenceEngine;
use crate::input::{parse_payload, InputDefaults};
use crate::storage::{CacheError, ForecastCache};
use crate::types::{EnhancementMetrics, Forecast, InputFormatError};

/// Errors surfaced by [`ForecastEnhancer`]
#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    #[error(transparent)]
    Input(#[from] InputFormatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cache unavailable: {0}")]
    Cache(#[from] CacheError),
}

/// An enhanced forecast with its summary metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementResult {
    pub forecast: Forecast,
    pub metrics: EnhancementMetrics,
}

impl EnhancementResult {
    pub fn new(forecast: Forecast) -> Self {
        let metrics = EnhancementMetrics::from_forecast(&forecast);
        Self { forecast, metrics }
    }
}

/// Configured enhancer with optional result cache.
#[derive(Debug)]
pub struct ForecastEnhancer {
    config: EnhancerConfig,
    pipeline: EnhancementPipeline,
    statistical: EnhancementPipeline,
    cache: Option<ForecastCache>,
}

impl ForecastEnhancer {
    /// Validate the config, open the cache if `[cache] dir` is set and build
    /// the pipeline. Without `engine` the statistical strategy is used.
    pub fn new(
        config: EnhancerConfig,
        engine: Option<Arc<dyn InferenceEngine>>,
    ) -> Result<Self, EnhanceError> {
        config.validate()?;

        let cache = match &config.cache.dir {
            Some(dir) => Some(ForecastCache::open(dir, config.cache.max_age_hours)?),
            None => None,
        };

        let pipeline = EnhancementPipeline::new(&config, engine);
        let statistical = EnhancementPipeline::new(&config, None);

        tracing::info!(
            backend = pipeline.backend_name(),
            variables = ?config.pipeline.variables,
            threshold = config.pipeline.confidence_threshold,
            physics = config.pipeline.enable_physics_constraints,
            cache = cache.is_some(),
            "Forecast enhancer initialized"
        );

        Ok(Self {
            config,
            pipeline,
            statistical,
            cache,
        })
    }

    pub fn config(&self) -> &EnhancerConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.pipeline.backend_name()
    }

    pub fn cache(&self) -> Option<&ForecastCache> {
        self.cache.as_ref()
    }

    pub fn input_defaults(&self) -> InputDefaults {
        InputDefaults::from_config(&self.config.pipeline)
    }

    /// Enhance a forecast, serving from and storing into the cache when one
    /// is configured. Cache failures are logged and never fail the call.
    pub fn enhance(&self, forecast: &Forecast) -> Result<Forecast, EnhanceError> {
        let key = self
            .cache
            .as_ref()
            .and_then(|_| ForecastCache::key_for(forecast));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            match cache.get(key) {
                Ok(Some(hit)) => {
                    tracing::info!(key = %key, "Serving enhanced forecast from cache");
                    return Ok(hit);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "Cache read failed, recomputing"),
            }
        }

        let enhanced = self.pipeline.run(forecast)?;

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            match cache.put(key, &enhanced) {
                Ok(()) => tracing::info!(key = %key, "Cached enhanced forecast"),
                Err(e) => tracing::warn!(key = %key, error = %e, "Cache write failed"),
            }
        }

        Ok(enhanced)
    }

    /// Enhance with the statistical strategy regardless of the configured
    /// engine. Bypasses the cache.
    pub fn enhance_statistical_only(&self, forecast: &Forecast) -> Result<Forecast, EnhanceError> {
        Ok(self.statistical.run(forecast)?)
    }

    /// Parse a JSON payload with configured defaults and enhance it.
    pub fn enhance_payload(&self, payload: &serde_json::Value) -> Result<EnhancementResult, EnhanceError> {
        let forecast = parse_payload(payload, &self.input_defaults())?;
        Ok(EnhancementResult::new(self.enhance(&forecast)?))
    }
}
