//! Constraint rules over an enhanced variable set

use std::collections::BTreeMap;

use crate::config::PhysicsConfig;
use crate::stats;
use crate::types::policy::{CLOUD_COVER, PRECIPITATION, RELATIVE_HUMIDITY, TEMPERATURE};
use crate::types::{policy_for, ChangeLimit, Forecast};

/// Applies the physics rules with constants from `[physics]` config.
#[derive(Debug, Clone)]
pub struct PhysicsConstraintEngine {
    config: PhysicsConfig,
}

impl PhysicsConstraintEngine {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }

    /// Apply every rule in order and return the constrained set.
    ///
    /// Only variables present in `enhanced` are touched; the original is read
    /// for coupling baselines and change limits.
    pub fn apply(
        &self,
        mut enhanced: BTreeMap<String, Vec<f64>>,
        original: &Forecast,
    ) -> BTreeMap<String, Vec<f64>> {
        self.clamp_valid_ranges(&mut enhanced);
        self.couple_temperature_humidity(&mut enhanced, original);
        self.couple_precipitation_cloud(&mut enhanced);
        self.limit_change_magnitude(&mut enhanced, original);
        enhanced
    }

    fn clamp_valid_ranges(&self, enhanced: &mut BTreeMap<String, Vec<f64>>) {
        for (name, values) in enhanced.iter_mut() {
            if let Some((lo, hi)) = policy_for(name).valid_range {
                for v in values.iter_mut() {
                    *v = v.clamp(lo, hi);
                }
            }
        }
    }

    /// Warmer air holds more moisture, so relative humidity moves opposite to
    /// the temperature correction. The adjustment is taken from the original
    /// humidity, not the enhanced one.
    fn couple_temperature_humidity(
        &self,
        enhanced: &mut BTreeMap<String, Vec<f64>>,
        original: &Forecast,
    ) {
        let Some(orig_humidity) = original.values(RELATIVE_HUMIDITY) else {
            return;
        };
        let Some(enh_temp) = enhanced.get(TEMPERATURE).cloned() else {
            return;
        };
        let orig_temp = original.values(TEMPERATURE);
        let Some(humidity) = enhanced.get_mut(RELATIVE_HUMIDITY) else {
            return;
        };

        let k = self.config.humidity_coupling_coefficient;
        for (i, h) in humidity.iter_mut().enumerate() {
            let (Some(&base), Some(&t)) = (orig_humidity.get(i), enh_temp.get(i)) else {
                continue;
            };
            let temp_change = orig_temp.and_then(|o| o.get(i)).map_or(0.0, |o| t - o);
            *h = (base + k * temp_change).clamp(0.0, 100.0);
        }
    }

    /// Raise cloud cover where precipitation is heavy. Never lowers it.
    fn couple_precipitation_cloud(&self, enhanced: &mut BTreeMap<String, Vec<f64>>) {
        let Some(precip) = enhanced.get(PRECIPITATION).cloned() else {
            return;
        };
        let Some(cloud) = enhanced.get_mut(CLOUD_COVER) else {
            return;
        };

        let threshold = self.config.precipitation_cloud_threshold;
        let floor = self.config.min_cloud_cover_when_precipitating;
        for (c, p) in cloud.iter_mut().zip(&precip) {
            if *p > threshold {
                *c = c.max(floor);
            }
        }
    }

    /// Bound each sample to the original value ± the variable's stability band.
    fn limit_change_magnitude(
        &self,
        enhanced: &mut BTreeMap<String, Vec<f64>>,
        original: &Forecast,
    ) {
        for (name, values) in enhanced.iter_mut() {
            let Some(orig) = original.values(name) else {
                continue;
            };
            let limit = match policy_for(name).change_limit {
                ChangeLimit::Temperature => self.config.max_temperature_change,
                ChangeLimit::Pressure => self.config.max_pressure_change,
                ChangeLimit::FractionOfRange => {
                    let range = stats::range(orig);
                    if range <= 0.0 {
                        continue;
                    }
                    range * self.config.max_relative_change_fraction
                }
            };
            for (v, o) in values.iter_mut().zip(orig) {
                *v = v.clamp(o - limit, o + limit);
            }
        }
    }
}
