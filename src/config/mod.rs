//! Enhancer Configuration Module
//!
//! Provides deployment configuration loaded from TOML files: which variables
//! to enhance, the confidence threshold, physics constants, calibration and
//! confidence tables, cache and server settings.
//!
//! ## Loading Order
//!
//! 1. `FORECAST_ENHANCER_CONFIG` environment variable (path to TOML file)
//! 2. `enhancer.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The config is immutable once loaded and is handed to the pipeline at
//! construction:
//!
//! ```ignore
//! let config = EnhancerConfig::load();
//! let enhancer = ForecastEnhancer::new(config, None)?;
//! ```

mod enhancer_config;
pub mod defaults;
pub mod validation;

pub use enhancer_config::*;
