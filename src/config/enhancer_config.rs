//! Enhancer Configuration - pipeline, physics, calibration and confidence
//! tables as operator-tunable TOML values
//!
//! Each struct implements `Default` with the built-in values, so a missing
//! config file or an empty one behaves exactly like the defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::policy::{self, CalibrationEntry, ConfidenceParams};

/// Environment variable pointing at a TOML config file.
pub const CONFIG_ENV_VAR: &str = "FORECAST_ENHANCER_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "enhancer.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for an enhancer deployment.
///
/// Load with `EnhancerConfig::load()` which searches:
/// 1. `$FORECAST_ENHANCER_CONFIG`
/// 2. `./enhancer.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancerConfig {
    /// Which variables to enhance and how results are gated
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Physics constraint constants
    #[serde(default)]
    pub physics: PhysicsConfig,

    /// Per-variable bias/scale overrides (merged over the policy table)
    #[serde(default)]
    pub calibration: BTreeMap<String, CalibrationEntry>,

    /// Per-variable confidence overrides (merged over the policy table)
    #[serde(default)]
    pub confidence: BTreeMap<String, ConfidenceParams>,

    /// Result cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl EnhancerConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FORECAST_ENHANCER_CONFIG` environment variable
    /// 2. `./enhancer.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded enhancer config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded enhancer config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys are logged, not fatal.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Confidence threshold in [0, 1]
    /// - Radius and time window positive
    /// - Confidence base in [0.5, 1] so the 0.5 floor never exceeds it
    /// - Change penalties non-negative, calibration scales positive
    /// - Physics limits positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();
        let p = &self.pipeline;

        if p.variables.is_empty() {
            errors.push("pipeline.variables must name at least one variable".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for v in &p.variables {
            if !seen.insert(v.as_str()) {
                errors.push(format!("pipeline.variables lists '{v}' more than once"));
            }
        }
        if !(0.0..=1.0).contains(&p.confidence_threshold) {
            errors.push(format!(
                "pipeline.confidence_threshold ({}) must be within [0, 1]",
                p.confidence_threshold
            ));
        }
        if !(p.spatial_radius_miles > 0.0) {
            errors.push(format!(
                "pipeline.spatial_radius_miles ({}) must be > 0",
                p.spatial_radius_miles
            ));
        }
        if p.time_window_days == 0 {
            errors.push("pipeline.time_window_days must be >= 1".to_string());
        }

        for (name, entry) in &self.calibration {
            if !entry.bias.is_finite() {
                errors.push(format!("calibration.{name}.bias must be finite"));
            }
            if !(entry.scale.is_finite() && entry.scale > 0.0) {
                errors.push(format!("calibration.{name}.scale ({}) must be > 0", entry.scale));
            }
        }

        for (name, params) in &self.confidence {
            Self::check_confidence(name, params, &mut errors);
        }

        let ph = &self.physics;
        for (label, value) in [
            ("physics.max_temperature_change", ph.max_temperature_change),
            ("physics.max_pressure_change", ph.max_pressure_change),
            ("physics.max_relative_change_fraction", ph.max_relative_change_fraction),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!("{label} ({value}) must be > 0"));
            }
        }
        if !(0.0..=100.0).contains(&ph.min_cloud_cover_when_precipitating) {
            errors.push(format!(
                "physics.min_cloud_cover_when_precipitating ({}) must be within [0, 100]",
                ph.min_cloud_cover_when_precipitating
            ));
        }
        if self.cache.max_age_hours == 0 {
            errors.push("cache.max_age_hours must be >= 1".to_string());
        }
        if self.server.request_timeout_secs == 0 {
            errors.push("server.request_timeout_secs must be >= 1".to_string());
        }

        // Range warnings (non-fatal) and remaining physical checks
        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // Reject NaN/Inf in any config value (sweep all f64 fields via serialization)
        if let Ok(s) = toml::to_string(self) {
            if ["= nan", "= -nan", "= inf", "= -inf"].iter().any(|pat| s.contains(pat)) {
                errors.push("Config contains NaN or Inf values; all values must be finite numbers".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_confidence(name: &str, params: &ConfidenceParams, errors: &mut Vec<String>) {
        if !params.base.is_finite() || !params.change_penalty.is_finite() {
            errors.push(format!(
                "confidence.{name}: values must be finite (got base={}, change_penalty={})",
                params.base, params.change_penalty
            ));
            return;
        }
        if !(0.5..=1.0).contains(&params.base) {
            errors.push(format!(
                "confidence.{name}.base ({:.3}) must be within [0.5, 1]",
                params.base
            ));
        }
        if params.change_penalty < 0.0 {
            errors.push(format!(
                "confidence.{name}.change_penalty ({:.3}) must be >= 0",
                params.change_penalty
            ));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Pipeline
// ============================================================================

/// Core pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Variables to enhance, in model channel order
    #[serde(default = "default_variables")]
    pub variables: Vec<String>,

    /// Forecast horizon in days; later samples are dropped at ingest
    #[serde(default = "default_time_window_days")]
    pub time_window_days: u32,

    /// Spatial radius (miles) assigned to payloads that do not carry one
    #[serde(default = "default_radius")]
    pub spatial_radius_miles: f64,

    /// Apply the physics constraint stage
    #[serde(default = "default_true")]
    pub enable_physics_constraints: bool,

    /// Samples with confidence below this revert to the original value
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_variables() -> Vec<String> {
    policy::DEFAULT_VARIABLES.iter().map(|s| (*s).to_string()).collect()
}
fn default_time_window_days() -> u32 { 7 }
fn default_radius() -> f64 { 10.0 }
fn default_true() -> bool { true }
fn default_confidence_threshold() -> f64 { 0.7 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variables: default_variables(),
            time_window_days: default_time_window_days(),
            spatial_radius_miles: default_radius(),
            enable_physics_constraints: default_true(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

// ============================================================================
// Physics
// ============================================================================

/// Physics constraint constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Humidity change per degree of temperature change (% / K).
    #[serde(default = "default_humidity_coupling")]
    pub humidity_coupling_coefficient: f64,

    /// Precipitation rate (mm/hr) above which cloud cover is raised.
    #[serde(default = "default_precip_cloud_threshold")]
    pub precipitation_cloud_threshold: f64,

    /// Minimum cloud cover (%) where precipitation exceeds the threshold.
    #[serde(default = "default_min_cloud_cover")]
    pub min_cloud_cover_when_precipitating: f64,

    /// Largest allowed per-sample temperature change (K).
    #[serde(default = "default_max_temperature_change")]
    pub max_temperature_change: f64,

    /// Largest allowed per-sample pressure change (Pa).
    #[serde(default = "default_max_pressure_change")]
    pub max_pressure_change: f64,

    /// Largest allowed change for other variables, as a fraction of the
    /// original batch range.
    #[serde(default = "default_max_relative_change")]
    pub max_relative_change_fraction: f64,
}

fn default_humidity_coupling() -> f64 { -0.2 }
fn default_precip_cloud_threshold() -> f64 { 1.0 }
fn default_min_cloud_cover() -> f64 { 70.0 }
fn default_max_temperature_change() -> f64 { 5.0 }
fn default_max_pressure_change() -> f64 { 500.0 }
fn default_max_relative_change() -> f64 { 0.3 }

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            humidity_coupling_coefficient: default_humidity_coupling(),
            precipitation_cloud_threshold: default_precip_cloud_threshold(),
            min_cloud_cover_when_precipitating: default_min_cloud_cover(),
            max_temperature_change: default_max_temperature_change(),
            max_pressure_change: default_max_pressure_change(),
            max_relative_change_fraction: default_max_relative_change(),
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

/// On-disk result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory; caching is disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Snapshots older than this are treated as misses
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u32,
}

fn default_max_age_hours() -> u32 { 6 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_age_hours: default_max_age_hours(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Budget for one enhancement request before the statistical result is returned
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_addr() -> String { "0.0.0.0:8080".to_string() }
fn default_request_timeout() -> u64 { super::defaults::REQUEST_TIMEOUT_SECS }
fn default_max_body_bytes() -> usize { super::defaults::MAX_BODY_BYTES }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}
