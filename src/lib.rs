//! Forecast Enhancer: short-range weather forecast post-processing
//!
//! Takes a raw point forecast (named meteorological time series) and returns
//! corrected values with a per-sample confidence score and enhancement delta.
//!
//! ## Architecture
//!
//! - **Processing**: per-variable range normalization and cyclical
//!   time/location features
//! - **Enhancer**: external inference engine with a deterministic
//!   statistical fallback
//! - **Physics Engine**: meteorological validity and change-magnitude limits
//! - **Calibration / Confidence**: bias/scale correction and per-sample scoring
//! - **Pipeline**: confidence-gated assembly, result cache, payload parsing
//! - **API**: Axum service wrapping the pipeline

pub mod api;
pub mod calibration;
pub mod confidence;
pub mod config;
pub mod enhancer;
pub mod export;
pub mod input;
pub mod physics_engine;
pub mod pipeline;
pub mod processing;
pub mod stats;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, EnhancerConfig};

// Re-export commonly used types
pub use types::{
    EnhancementMetrics, EnhancementTrace, Forecast, InputFormatError, MetadataValue, Variable,
};

// Re-export pipeline components
pub use calibration::CalibrationEngine;
pub use confidence::ConfidenceScorer;
pub use enhancer::{Enhancer, InferenceEngine, InferenceError, ModelInputs, Tensor};
pub use physics_engine::PhysicsConstraintEngine;
pub use pipeline::{EnhanceError, EnhancementPipeline, EnhancementResult, ForecastEnhancer};
pub use processing::{Normalizer, TimeLocationEncoder};

// Re-export storage
pub use storage::{CacheError, ForecastCache};
