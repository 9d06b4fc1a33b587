//! JSON payload parsing
//!
//! ```json
//! {
//!   "latitude": 40.7, "longitude": -74.0,
//!   "timestamps": ["2024-06-01T00:00:00Z", "2024-06-01T01:00:00Z"],
//!   "radius_miles": 10,
//!   "temperature_2m": [290.1, 289.7],
//!   "precipitation": {"data": [0.0, 0.4], "units": "mm/hr"},
//!   "cloud_cover_units": "%",
//!   "cloud_cover": [20, 35],
//!   "source": "gfs",
//!   "metadata": {"run": 6}
//! }
//! ```

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{parse_timestamp_value, InputDefaults, RawForecast};
use crate::types::{Forecast, InputFormatError, MetadataValue};

const LATITUDE_KEYS: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_KEYS: [&str; 2] = ["longitude", "lon"];
const TIMESTAMP_KEYS: [&str; 2] = ["timestamps", "time"];
const RADIUS_KEY: &str = "radius_miles";
const METADATA_KEY: &str = "metadata";
const UNITS_SUFFIX: &str = "_units";

/// Keys written by the exporter that carry no input information.
const EXPORT_ONLY_KEYS: [&str; 1] = ["enhancement_metrics"];

/// Parse a JSON document into a forecast.
pub fn parse_payload_str(text: &str, defaults: &InputDefaults) -> Result<Forecast, InputFormatError> {
    let value: Value = serde_json::from_str(text)?;
    parse_payload(&value, defaults)
}

/// Parse a JSON object into a forecast.
pub fn parse_payload(value: &Value, defaults: &InputDefaults) -> Result<Forecast, InputFormatError> {
    parse_payload_at(value, defaults, Utc::now())
}

pub(crate) fn parse_payload_at(
    value: &Value,
    defaults: &InputDefaults,
    now: DateTime<Utc>,
) -> Result<Forecast, InputFormatError> {
    let obj = value
        .as_object()
        .ok_or_else(|| InputFormatError::field("payload", "expected a JSON object"))?;

    let mut raw = RawForecast {
        latitude: number_at(obj, &LATITUDE_KEYS)?,
        longitude: number_at(obj, &LONGITUDE_KEYS)?,
        radius_miles: number_at(obj, &[RADIUS_KEY])?,
        ..RawForecast::default()
    };

    if let Some((key, ts)) = first_present(obj, &TIMESTAMP_KEYS) {
        let list = ts
            .as_array()
            .ok_or_else(|| InputFormatError::field(key, "expected an array of timestamps"))?;
        raw.timestamps = Some(list.iter().map(parse_timestamp_value).collect::<Result<_, _>>()?);
    }

    let reserved = |k: &str| {
        LATITUDE_KEYS.contains(&k)
            || LONGITUDE_KEYS.contains(&k)
            || TIMESTAMP_KEYS.contains(&k)
            || k == RADIUS_KEY
            || EXPORT_ONLY_KEYS.contains(&k)
    };

    // Variables first, so `<name>_units` can be told apart from metadata.
    let mut scalars = Vec::new();
    for (key, v) in obj {
        if reserved(key) {
            continue;
        }
        match v {
            Value::Array(items) => match numeric_array(key, items) {
                Ok(values) => {
                    raw.variables.insert(key.clone(), (values, None));
                }
                Err(reason) => {
                    tracing::warn!(key = %key, %reason, "ignoring non-numeric array in payload");
                }
            },
            Value::Object(inner) if key == METADATA_KEY => {
                for (mk, mv) in inner {
                    match MetadataValue::from_json(mv) {
                        Some(m) => {
                            raw.metadata.insert(mk.clone(), m);
                        }
                        None => tracing::warn!(key = %mk, "ignoring non-scalar metadata entry"),
                    }
                }
            }
            Value::Object(inner) => match inner.get("data") {
                Some(Value::Array(items)) => {
                    let values = numeric_array(key, items)
                        .map_err(|reason| InputFormatError::field(format!("{key}.data"), reason))?;
                    let units = inner.get("units").and_then(Value::as_str).map(str::to_string);
                    raw.variables.insert(key.clone(), (values, units));
                }
                _ => tracing::warn!(key = %key, "ignoring object without a data array"),
            },
            Value::Null => tracing::warn!(key = %key, "ignoring null payload entry"),
            scalar => scalars.push((key, scalar)),
        }
    }

    for (key, v) in scalars {
        if let (Some(base), Some(units)) = (key.strip_suffix(UNITS_SUFFIX), v.as_str()) {
            if let Some((_, slot)) = raw.variables.get_mut(base) {
                // Inline `{data, units}` wins over a separate `<name>_units` key
                slot.get_or_insert_with(|| units.to_string());
                continue;
            }
        }
        if let Some(m) = MetadataValue::from_json(v) {
            raw.metadata.insert(key.clone(), m);
        }
    }

    raw.build(defaults, now)
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    keys.iter().find_map(|k| obj.get(*k).map(|v| (*k, v)))
}

fn number_at(obj: &Map<String, Value>, keys: &[&'static str]) -> Result<Option<f64>, InputFormatError> {
    match first_present(obj, keys) {
        None => Ok(None),
        Some((key, v)) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| InputFormatError::field(key, format!("expected a number, got {v}"))),
    }
}

fn numeric_array(key: &str, items: &[Value]) -> Result<Vec<f64>, String> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64()
                .ok_or_else(|| format!("{key}[{i}] is not a number ({v})"))
        })
        .collect()
}
