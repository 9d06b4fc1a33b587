//! Forecast and variable containers
//!
//! A [`Forecast`] is built once through [`Forecast::new`] (or deserialized and
//! then [`Forecast::validate`]d) and never mutated afterwards. Pipeline stages
//! read it and build new per-variable arrays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Errors
// ============================================================================

/// Malformed or unsupported input. Surfaced to the caller, never retried.
#[derive(Debug, thiserror::Error)]
pub enum InputFormatError {
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error reading input: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse timestamp '{0}'")]
    Timestamp(String),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    #[error("variable '{name}' has {actual} samples, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("timestamps must be non-decreasing (index {0})")]
    UnorderedTimestamps(usize),
    #[error("CSV error at line {line}: {reason}")]
    Csv { line: usize, reason: String },
}

impl InputFormatError {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Scalar metadata value carried through the pipeline untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Convert a JSON scalar. Returns `None` for null, arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

// ============================================================================
// Variable
// ============================================================================

/// Per-sample confidence and enhancement delta attached to an enhanced variable.
///
/// Both arrays always have the same length as the variable's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementTrace {
    pub confidence: Vec<f64>,
    pub delta: Vec<f64>,
}

/// A single named meteorological series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub units: String,
    pub values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<EnhancementTrace>,
}

impl Variable {
    pub fn new(name: impl Into<String>, units: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            values,
            enhancement: None,
        }
    }

    /// Attach confidence and delta. Both must match `values` in length.
    pub fn with_enhancement(
        mut self,
        confidence: Vec<f64>,
        delta: Vec<f64>,
    ) -> Result<Self, InputFormatError> {
        for (label, len) in [("confidence", confidence.len()), ("delta", delta.len())] {
            if len != self.values.len() {
                return Err(InputFormatError::LengthMismatch {
                    name: format!("{}.{label}", self.name),
                    expected: self.values.len(),
                    actual: len,
                });
            }
        }
        self.enhancement = Some(EnhancementTrace { confidence, delta });
        Ok(self)
    }

    pub fn confidence(&self) -> Option<&[f64]> {
        self.enhancement.as_ref().map(|e| e.confidence.as_slice())
    }

    pub fn delta(&self) -> Option<&[f64]> {
        self.enhancement.as_ref().map(|e| e.delta.as_slice())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Forecast
// ============================================================================

/// Named per-timestamp variable arrays for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    variables: BTreeMap<String, Variable>,
    timestamps: Vec<DateTime<Utc>>,
    latitude: f64,
    longitude: f64,
    radius_miles: f64,
    #[serde(default)]
    metadata: BTreeMap<String, MetadataValue>,
}

impl Forecast {
    /// Build and validate a forecast.
    ///
    /// Fails when a variable name repeats, when lengths disagree with the
    /// timestamp count, when timestamps go backwards, or when the location or
    /// radius is out of range.
    pub fn new(
        variables: Vec<Variable>,
        timestamps: Vec<DateTime<Utc>>,
        latitude: f64,
        longitude: f64,
        radius_miles: f64,
        metadata: BTreeMap<String, MetadataValue>,
    ) -> Result<Self, InputFormatError> {
        let mut map = BTreeMap::new();
        for var in variables {
            let name = var.name.clone();
            if map.insert(name.clone(), var).is_some() {
                return Err(InputFormatError::field(name, "duplicate variable"));
            }
        }
        let forecast = Self {
            variables: map,
            timestamps,
            latitude,
            longitude,
            radius_miles,
            metadata,
        };
        forecast.validate()?;
        Ok(forecast)
    }

    /// Check every structural invariant. Used after deserializing a snapshot.
    /// Every variable value must be finite.
    pub fn validate(&self) -> Result<(), InputFormatError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(InputFormatError::field(
                "latitude",
                format!("{} is outside [-90, 90]", self.latitude),
            ));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(InputFormatError::field(
                "longitude",
                format!("{} is outside [-180, 180]", self.longitude),
            ));
        }
        if !(self.radius_miles.is_finite() && self.radius_miles > 0.0) {
            return Err(InputFormatError::field(
                "radius_miles",
                format!("{} must be > 0", self.radius_miles),
            ));
        }
        if let Some(i) = self.timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(InputFormatError::UnorderedTimestamps(i + 1));
        }

        let expected = self.timestamps.len();
        for (key, var) in &self.variables {
            if key != &var.name {
                return Err(InputFormatError::field(
                    key.clone(),
                    format!("keyed under a different name ('{}')", var.name),
                ));
            }
            if var.values.len() != expected {
                return Err(InputFormatError::LengthMismatch {
                    name: var.name.clone(),
                    expected,
                    actual: var.values.len(),
                });
            }
            if let Some(i) = var.values.iter().position(|v| !v.is_finite()) {
                return Err(InputFormatError::field(
                    format!("{}[{i}]", var.name),
                    format!("{} is not a finite number", var.values[i]),
                ));
            }
            if let Some(trace) = &var.enhancement {
                if trace.confidence.len() != expected || trace.delta.len() != expected {
                    return Err(InputFormatError::LengthMismatch {
                        name: format!("{}.enhancement", var.name),
                        expected,
                        actual: trace.confidence.len().min(trace.delta.len()),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn variables(&self) -> &BTreeMap<String, Variable> {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Raw values of a variable, if present.
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.variables.get(name).map(|v| v.values.as_slice())
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn radius_miles(&self) -> f64 {
        self.radius_miles
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetadataValue> {
        &self.metadata
    }

    /// Number of timestamps (= samples per variable).
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Build a new forecast sharing this one's location, time axis and
    /// metadata, with a different variable set.
    pub fn with_variables(&self, variables: Vec<Variable>) -> Result<Self, InputFormatError> {
        Self::new(
            variables,
            self.timestamps.clone(),
            self.latitude,
            self.longitude,
            self.radius_miles,
            self.metadata.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hours(n: usize) -> Vec<DateTime<Utc>> {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| t0 + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn test_valid_forecast_builds() {
        let f = Forecast::new(
            vec![Variable::new("temperature_2m", "K", vec![290.0, 291.0, 292.0])],
            hours(3),
            40.0,
            -75.0,
            10.0,
            BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(f.len(), 3);
        assert_eq!(f.values("temperature_2m").unwrap(), &[290.0, 291.0, 292.0]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = Forecast::new(
            vec![Variable::new("temperature_2m", "K", vec![290.0, 291.0])],
            hours(3),
            40.0,
            -75.0,
            10.0,
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, InputFormatError::LengthMismatch { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn test_out_of_range_latitude_rejected() {
        let err = Forecast::new(vec![], hours(1), 91.0, 0.0, 10.0, BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn test_non_positive_radius_rejected() {
        let err = Forecast::new(vec![], hours(1), 0.0, 0.0, 0.0, BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn test_backwards_timestamps_rejected() {
        let mut ts = hours(3);
        ts.swap(1, 2);
        let err = Forecast::new(vec![], ts, 0.0, 0.0, 10.0, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, InputFormatError::UnorderedTimestamps(2)));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = Forecast::new(
                vec![Variable::new("temperature_2m", "K", vec![290.0, bad, 291.0])],
                hours(3),
                40.0,
                -75.0,
                10.0,
                BTreeMap::new(),
            )
            .unwrap_err();
            match err {
                InputFormatError::InvalidField { field, .. } => assert_eq!(field, "temperature_2m[1]"),
                other => panic!("expected InvalidField for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_non_finite_snapshot_fails_validation() {
        let f = Forecast::new(
            vec![Variable::new("cloud_cover", "%", vec![10.0])],
            hours(1),
            0.0,
            0.0,
            10.0,
            BTreeMap::new(),
        )
        .unwrap();
        let mut snapshot = f.clone();
        snapshot.variables.get_mut("cloud_cover").unwrap().values[0] = f64::NAN;
        assert!(matches!(snapshot.validate(), Err(InputFormatError::InvalidField { .. })));
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_equal_timestamps_allowed() {
        let t = hours(1)[0];
        assert!(Forecast::new(vec![], vec![t, t], 0.0, 0.0, 10.0, BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let err = Forecast::new(
            vec![
                Variable::new("cloud_cover", "%", vec![1.0]),
                Variable::new("cloud_cover", "%", vec![2.0]),
            ],
            hours(1),
            0.0,
            0.0,
            10.0,
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_enhancement_length_checked() {
        let v = Variable::new("cloud_cover", "%", vec![1.0, 2.0]);
        assert!(v.clone().with_enhancement(vec![0.9], vec![0.0, 0.0]).is_err());
        let v = v.with_enhancement(vec![0.9, 0.8], vec![0.0, 1.0]).unwrap();
        assert_eq!(v.confidence().unwrap(), &[0.9, 0.8]);
        assert_eq!(v.delta().unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn test_metadata_from_json_scalars_only() {
        assert_eq!(
            MetadataValue::from_json(&serde_json::json!(3)),
            Some(MetadataValue::Integer(3))
        );
        assert_eq!(
            MetadataValue::from_json(&serde_json::json!("gfs")),
            Some(MetadataValue::Text("gfs".into()))
        );
        assert!(MetadataValue::from_json(&serde_json::json!([1, 2])).is_none());
        assert!(MetadataValue::from_json(&serde_json::Value::Null).is_none());
    }
}
