//! Per-variable policy table
//!
//! Every stage of the pipeline that treats variables differently (normalization,
//! statistical fallback, change limiting, confidence scoring) looks the variable
//! up here instead of branching on its name. Adding a variable means adding one
//! row to [`POLICY_TABLE`].

use serde::{Deserialize, Serialize};

// ============================================================================
// Variable Names
// ============================================================================

/// 2 m air temperature (K)
pub const TEMPERATURE: &str = "temperature_2m";
/// Precipitation rate (mm/hr)
pub const PRECIPITATION: &str = "precipitation";
/// Mean sea level pressure (Pa)
pub const PRESSURE: &str = "mean_sea_level_pressure";
/// 10 m zonal wind component (m/s)
pub const WIND_U: &str = "wind_u_10m";
/// 10 m meridional wind component (m/s)
pub const WIND_V: &str = "wind_v_10m";
/// Relative humidity (%)
pub const RELATIVE_HUMIDITY: &str = "relative_humidity";
/// Total cloud cover (%)
pub const CLOUD_COVER: &str = "cloud_cover";

/// Default enhancement list. The order is the model channel order.
pub const DEFAULT_VARIABLES: [&str; 7] = [
    TEMPERATURE,
    PRECIPITATION,
    PRESSURE,
    WIND_U,
    WIND_V,
    RELATIVE_HUMIDITY,
    CLOUD_COVER,
];

// ============================================================================
// Table Records
// ============================================================================

/// Bias/scale correction derived from historical model performance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    #[serde(default)]
    pub bias: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 { 1.0 }

impl CalibrationEntry {
    pub const IDENTITY: Self = Self { bias: 0.0, scale: 1.0 };
}

impl Default for CalibrationEntry {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Confidence scoring parameters.
///
/// `confidence = max(0.5, base - change_penalty * normalized_delta)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceParams {
    #[serde(default = "default_base")]
    pub base: f64,
    #[serde(default = "default_change_penalty")]
    pub change_penalty: f64,
}

fn default_base() -> f64 { 0.8 }
fn default_change_penalty() -> f64 { 0.05 }

impl ConfidenceParams {
    pub const DEFAULT: Self = Self { base: 0.8, change_penalty: 0.05 };
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Forward/inverse transform pair mapping raw units into a model-friendly range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// `(v - center) / span`
    Affine { center: f64, span: f64 },
    /// `log1p(v) / span`. Input must be non-negative.
    Log1p { span: f64 },
}

impl Transform {
    pub const IDENTITY: Self = Self::Affine { center: 0.0, span: 1.0 };

    pub fn forward(self, v: f64) -> f64 {
        match self {
            Self::Affine { center, span } => (v - center) / span,
            Self::Log1p { span } => v.ln_1p() / span,
        }
    }

    pub fn inverse(self, n: f64) -> f64 {
        match self {
            Self::Affine { center, span } => n * span + center,
            Self::Log1p { span } => (n * span).exp_m1(),
        }
    }
}

/// Heuristic applied by the statistical fallback after calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackRule {
    /// Add `amplitude * sin(2π·hour/24)`
    DiurnalBump { amplitude: f64 },
    /// Multiply by a constant factor
    Scale(f64),
    /// Keep the calibrated value
    PassThrough,
}

/// How a raw delta is normalized before the confidence penalty is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeltaNormalization {
    /// `|delta| / span`, where the span is the change considered routine
    FixedSpan(f64),
    /// `|delta| / (original + epsilon)` per sample
    RelativeToOriginal { epsilon: f64 },
    /// `|delta| / batch_range`, or `|delta| / (mean + 0.1)` for a flat batch
    BatchRange,
}

/// Which stability band bounds the per-sample change for a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeLimit {
    /// `physics.max_temperature_change`
    Temperature,
    /// `physics.max_pressure_change`
    Pressure,
    /// `physics.max_relative_change_fraction` of the original batch range
    FractionOfRange,
}

/// Policy record for one variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariablePolicy {
    pub name: &'static str,
    /// Units assumed when the input does not state any
    pub units: &'static str,
    pub transform: Transform,
    pub fallback: FallbackRule,
    pub calibration: CalibrationEntry,
    pub confidence: ConfidenceParams,
    pub normalization: DeltaNormalization,
    pub change_limit: ChangeLimit,
    /// Physically valid `(min, max)`, clamped unconditionally by the constraint engine
    pub valid_range: Option<(f64, f64)>,
}

// ============================================================================
// The Table
// ============================================================================

pub const POLICY_TABLE: [VariablePolicy; 7] = [
    VariablePolicy {
        name: TEMPERATURE,
        units: "K",
        transform: Transform::Affine { center: 273.15, span: 50.0 },
        fallback: FallbackRule::DiurnalBump { amplitude: 1.0 },
        calibration: CalibrationEntry { bias: -0.2, scale: 0.95 },
        confidence: ConfidenceParams { base: 0.85, change_penalty: 0.05 },
        normalization: DeltaNormalization::FixedSpan(3.0),
        change_limit: ChangeLimit::Temperature,
        valid_range: None,
    },
    VariablePolicy {
        name: PRECIPITATION,
        units: "mm/hr",
        transform: Transform::Log1p { span: 5.0 },
        fallback: FallbackRule::Scale(1.1),
        calibration: CalibrationEntry { bias: 0.05, scale: 1.1 },
        confidence: ConfidenceParams { base: 0.75, change_penalty: 0.1 },
        normalization: DeltaNormalization::RelativeToOriginal { epsilon: 0.1 },
        change_limit: ChangeLimit::FractionOfRange,
        valid_range: Some((0.0, f64::INFINITY)),
    },
    VariablePolicy {
        name: PRESSURE,
        units: "Pa",
        transform: Transform::Affine { center: 101_325.0, span: 5000.0 },
        fallback: FallbackRule::PassThrough,
        calibration: CalibrationEntry { bias: 0.0, scale: 1.0 },
        confidence: ConfidenceParams { base: 0.9, change_penalty: 0.03 },
        normalization: DeltaNormalization::FixedSpan(300.0),
        change_limit: ChangeLimit::Pressure,
        valid_range: None,
    },
    VariablePolicy {
        name: WIND_U,
        units: "m/s",
        transform: Transform::Affine { center: 0.0, span: 30.0 },
        fallback: FallbackRule::Scale(0.9),
        calibration: CalibrationEntry { bias: 0.0, scale: 0.9 },
        confidence: ConfidenceParams { base: 0.8, change_penalty: 0.07 },
        normalization: DeltaNormalization::BatchRange,
        change_limit: ChangeLimit::FractionOfRange,
        valid_range: None,
    },
    VariablePolicy {
        name: WIND_V,
        units: "m/s",
        transform: Transform::Affine { center: 0.0, span: 30.0 },
        fallback: FallbackRule::Scale(0.9),
        calibration: CalibrationEntry { bias: 0.0, scale: 0.9 },
        confidence: ConfidenceParams { base: 0.8, change_penalty: 0.07 },
        normalization: DeltaNormalization::BatchRange,
        change_limit: ChangeLimit::FractionOfRange,
        valid_range: None,
    },
    VariablePolicy {
        name: RELATIVE_HUMIDITY,
        units: "%",
        transform: Transform::Affine { center: 0.0, span: 100.0 },
        fallback: FallbackRule::PassThrough,
        calibration: CalibrationEntry::IDENTITY,
        confidence: ConfidenceParams { base: 0.8, change_penalty: 0.05 },
        normalization: DeltaNormalization::BatchRange,
        change_limit: ChangeLimit::FractionOfRange,
        valid_range: Some((0.0, 100.0)),
    },
    VariablePolicy {
        name: CLOUD_COVER,
        units: "%",
        transform: Transform::Affine { center: 0.0, span: 100.0 },
        fallback: FallbackRule::PassThrough,
        calibration: CalibrationEntry::IDENTITY,
        confidence: ConfidenceParams { base: 0.75, change_penalty: 0.05 },
        normalization: DeltaNormalization::BatchRange,
        change_limit: ChangeLimit::FractionOfRange,
        valid_range: Some((0.0, 100.0)),
    },
];

/// Policy used for any variable without a row in the table.
pub const DEFAULT_POLICY: VariablePolicy = VariablePolicy {
    name: "",
    units: "",
    transform: Transform::IDENTITY,
    fallback: FallbackRule::PassThrough,
    calibration: CalibrationEntry::IDENTITY,
    confidence: ConfidenceParams::DEFAULT,
    normalization: DeltaNormalization::BatchRange,
    change_limit: ChangeLimit::FractionOfRange,
    valid_range: None,
};

/// Look up the policy for a variable, falling back to [`DEFAULT_POLICY`].
pub fn policy_for(name: &str) -> &'static VariablePolicy {
    POLICY_TABLE
        .iter()
        .find(|p| p.name == name)
        .unwrap_or(&DEFAULT_POLICY)
}

/// Whether the variable has a dedicated row in the table.
pub fn is_recognised(name: &str) -> bool {
    POLICY_TABLE.iter().any(|p| p.name == name)
}
