//! Forecast input parsing
//!
//! Accepts a JSON payload (from a `serde_json::Value`, a string or a `.json`
//! file) or a `.csv` file and produces a validated [`Forecast`]. Missing
//! timestamps default to daily steps from today's UTC midnight, and samples
//! past the configured horizon are dropped.

mod csv;
mod payload;
mod timestamps;

pub use csv::parse_csv;
pub use payload::{parse_payload, parse_payload_str};
pub use timestamps::{default_timestamps, parse_timestamp, parse_timestamp_value};

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::types::{policy_for, Forecast, InputFormatError, MetadataValue, Variable};

/// Values taken from configuration when the input does not carry them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputDefaults {
    pub radius_miles: f64,
    pub time_window_days: u32,
}

impl InputDefaults {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            radius_miles: config.spatial_radius_miles,
            time_window_days: config.time_window_days,
        }
    }
}

impl Default for InputDefaults {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Load a forecast from a file, dispatching on its extension.
pub fn load_forecast(path: &Path, defaults: &InputDefaults) -> Result<Forecast, InputFormatError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "json" => {
            let text = std::fs::read_to_string(path)?;
            parse_payload_str(&text, defaults)
        }
        "csv" => {
            let text = std::fs::read_to_string(path)?;
            parse_csv(&text, defaults)
        }
        _ => Err(InputFormatError::UnsupportedFormat(format!(
            "{} (expected .json or .csv)",
            path.display()
        ))),
    }
}

/// Fields gathered by a parser before the forecast is assembled.
#[derive(Debug, Default)]
struct RawForecast {
    latitude: Option<f64>,
    longitude: Option<f64>,
    radius_miles: Option<f64>,
    timestamps: Option<Vec<DateTime<Utc>>>,
    /// name → (values, units)
    variables: BTreeMap<String, (Vec<f64>, Option<String>)>,
    metadata: BTreeMap<String, MetadataValue>,
}

impl RawForecast {
    /// Fill defaults, apply the horizon and validate.
    fn build(self, defaults: &InputDefaults, now: DateTime<Utc>) -> Result<Forecast, InputFormatError> {
        let latitude = self.latitude.unwrap_or_else(|| {
            tracing::warn!("input has no latitude, assuming 0");
            0.0
        });
        let longitude = self.longitude.unwrap_or_else(|| {
            tracing::warn!("input has no longitude, assuming 0");
            0.0
        });
        let radius = self.radius_miles.unwrap_or(defaults.radius_miles);

        let samples = self.variables.values().map(|(v, _)| v.len()).max().unwrap_or(0);
        let mut timestamps = self
            .timestamps
            .unwrap_or_else(|| default_timestamps(samples, now));

        let full_len = timestamps.len();
        let keep = horizon_len(&timestamps, defaults.time_window_days);
        if keep < full_len {
            tracing::warn!(
                dropped = full_len - keep,
                horizon_days = defaults.time_window_days,
                "input extends past the forecast horizon, truncating"
            );
            timestamps.truncate(keep);
        }

        let variables = self
            .variables
            .into_iter()
            .map(|(name, (mut values, units))| {
                // Series that disagree with the time axis fail validation below
                if values.len() == full_len {
                    values.truncate(keep);
                }
                let units = units.unwrap_or_else(|| policy_for(&name).units.to_string());
                Variable::new(name, units, values)
            })
            .collect();

        Forecast::new(variables, timestamps, latitude, longitude, radius, self.metadata)
    }
}

/// Number of leading samples within `first + days`.
fn horizon_len(timestamps: &[DateTime<Utc>], days: u32) -> usize {
    let Some(first) = timestamps.first() else {
        return 0;
    };
    let limit = *first + Duration::days(i64::from(days));
    timestamps.iter().take_while(|t| **t <= limit).count()
}
