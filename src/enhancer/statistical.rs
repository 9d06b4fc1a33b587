//! Deterministic statistical enhancement
//!
//! Calibrates each variable, then applies its policy heuristic: a diurnal
//! bump for temperature, a fixed scale for precipitation and wind, nothing
//! for the rest.

use std::collections::BTreeMap;

use crate::calibration::CalibrationEngine;
use crate::processing::TimeLocationFeatures;
use crate::types::{policy_for, FallbackRule, Forecast};

#[derive(Debug, Clone, Default)]
pub struct StatisticalFallback {
    calibration: CalibrationEngine,
}

impl StatisticalFallback {
    pub fn new(calibration: CalibrationEngine) -> Self {
        Self { calibration }
    }

    /// Enhance every requested variable present in the forecast. Requested
    /// variables the forecast lacks are skipped.
    pub fn enhance(
        &self,
        forecast: &Forecast,
        features: &TimeLocationFeatures,
        variables: &[String],
    ) -> BTreeMap<String, Vec<f64>> {
        let mut out = BTreeMap::new();
        for name in variables {
            let Some(raw) = forecast.values(name) else {
                tracing::debug!(variable = %name, "not in forecast, skipping");
                continue;
            };
            let calibrated = self.calibration.correct(name, raw);
            let enhanced = match policy_for(name).fallback {
                FallbackRule::DiurnalBump { amplitude } => calibrated
                    .iter()
                    .zip(&features.hour_sin)
                    .map(|(v, s)| v + amplitude * s)
                    .collect(),
                FallbackRule::Scale(factor) => calibrated.iter().map(|v| v * factor).collect(),
                FallbackRule::PassThrough => calibrated,
            };
            out.insert(name.clone(), enhanced);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::TimeLocationEncoder;
    use crate::types::policy::{CLOUD_COVER, PRECIPITATION, TEMPERATURE, WIND_V};
    use crate::types::Variable;
    use chrono::{Duration, TimeZone, Utc};

    fn forecast(vars: Vec<(&str, Vec<f64>)>) -> Forecast {
        let n = vars.first().map_or(0, |(_, v)| v.len());
        let t0 = Utc.with_ymd_and_hms(2024, 8, 15, 0, 0, 0).unwrap();
        let ts = (0..n).map(|i| t0 + Duration::hours(i as i64)).collect();
        let vars = vars
            .into_iter()
            .map(|(name, values)| Variable::new(name, "", values))
            .collect();
        Forecast::new(vars, ts, 51.5, 0.0, 10.0, BTreeMap::new()).unwrap()
    }

    fn run(f: &Forecast, names: &[&str]) -> BTreeMap<String, Vec<f64>> {
        let features = TimeLocationEncoder::new().encode(f.timestamps(), f.latitude(), f.longitude());
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        StatisticalFallback::default().enhance(f, &features, &names)
    }

    #[test]
    fn test_constant_temperature_gets_diurnal_cycle() {
        let f = forecast(vec![(TEMPERATURE, vec![300.0; 24])]);
        let out = run(&f, &[TEMPERATURE]);
        let t = &out[TEMPERATURE];
        // calibrated flat batch is 299.8; hour 6 peaks, hour 18 troughs
        assert!((t[0] - 299.8).abs() < 1e-9);
        assert!((t[6] - 300.8).abs() < 1e-9);
        assert!((t[18] - 298.8).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_variables() {
        let f = forecast(vec![
            (PRECIPITATION, vec![1.0, 1.0]),
            (WIND_V, vec![10.0, 10.0]),
        ]);
        let out = run(&f, &[PRECIPITATION, WIND_V]);
        assert!((out[PRECIPITATION][0] - 1.05 * 1.1).abs() < 1e-9);
        assert!((out[WIND_V][1] - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_pass_through_and_missing_variables() {
        let f = forecast(vec![(CLOUD_COVER, vec![20.0, 40.0])]);
        let out = run(&f, &[CLOUD_COVER, TEMPERATURE]);
        assert_eq!(out[CLOUD_COVER], vec![20.0, 40.0]);
        assert!(!out.contains_key(TEMPERATURE));
    }

    #[test]
    fn test_deterministic() {
        let f = forecast(vec![(TEMPERATURE, vec![280.0, 282.5, 279.0])]);
        assert_eq!(run(&f, &[TEMPERATURE]), run(&f, &[TEMPERATURE]));
    }
}
