//! JSON export of enhanced forecasts
//!
//! The exported document is itself a valid input payload: variables are
//! `{data, units}` objects (plus `confidence` and `enhancement_delta` when
//! enhanced), and the summary metrics sit under `enhancement_metrics`, which
//! the payload parser skips.

use serde_json::{json, Map, Value};
use std::path::Path;

use crate::types::{EnhancementMetrics, Forecast};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize export: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build the export document.
pub fn to_export_json(forecast: &Forecast) -> Value {
    let mut doc = Map::new();
    doc.insert("latitude".into(), json!(forecast.latitude()));
    doc.insert("longitude".into(), json!(forecast.longitude()));
    doc.insert(
        "timestamps".into(),
        Value::Array(
            forecast
                .timestamps()
                .iter()
                .map(|t| Value::String(t.to_rfc3339()))
                .collect(),
        ),
    );
    doc.insert("radius_miles".into(), json!(forecast.radius_miles()));
    doc.insert("metadata".into(), json!(forecast.metadata()));
    doc.insert(
        "enhancement_metrics".into(),
        json!(EnhancementMetrics::from_forecast(forecast)),
    );

    for (name, var) in forecast.variables() {
        let mut entry = Map::new();
        entry.insert("data".into(), json!(var.values));
        entry.insert("units".into(), json!(var.units));
        if let Some(trace) = &var.enhancement {
            entry.insert("confidence".into(), json!(trace.confidence));
            entry.insert("enhancement_delta".into(), json!(trace.delta));
        }
        doc.insert(name.clone(), Value::Object(entry));
    }

    Value::Object(doc)
}

/// Write the export document as pretty-printed JSON.
pub fn save_to_json(forecast: &Forecast, path: &Path) -> Result<(), ExportError> {
    let text = serde_json::to_string_pretty(&to_export_json(forecast))?;
    std::fs::write(path, text)?;
    tracing::info!(path = %path.display(), variables = forecast.variables().len(), "Saved enhanced forecast");
    Ok(())
}
