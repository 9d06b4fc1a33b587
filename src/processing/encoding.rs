//! Cyclical time and normalized location features
//!
//! Time of day and time of year are encoded as sine/cosine pairs so that
//! 23:00 sits next to 00:00 and 31 December next to 1 January. Location is a
//! per-batch constant scaled into [-1, 1].

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

/// Number of auxiliary features per sample.
pub const AUX_FEATURE_COUNT: usize = 6;

/// Auxiliary feature names, in the column order handed to the inference engine.
pub const AUX_FEATURE_NAMES: [&str; AUX_FEATURE_COUNT] = [
    "hour_sin", "hour_cos", "day_sin", "day_cos", "latitude", "longitude",
];

const HOURS_PER_DAY: f64 = 24.0;
const DAYS_PER_YEAR: f64 = 365.0;

/// Encoded auxiliary features for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeLocationFeatures {
    pub hour_sin: Vec<f64>,
    pub hour_cos: Vec<f64>,
    pub day_sin: Vec<f64>,
    pub day_cos: Vec<f64>,
    /// `latitude / 90`
    pub latitude: f64,
    /// `longitude / 180`
    pub longitude: f64,
}

impl TimeLocationFeatures {
    pub fn len(&self) -> usize {
        self.hour_sin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hour_sin.is_empty()
    }

    /// One row per sample in [`AUX_FEATURE_NAMES`] order.
    pub fn rows(&self) -> Vec<[f64; AUX_FEATURE_COUNT]> {
        (0..self.len())
            .map(|i| {
                [
                    self.hour_sin[i],
                    self.hour_cos[i],
                    self.day_sin[i],
                    self.day_cos[i],
                    self.latitude,
                    self.longitude,
                ]
            })
            .collect()
    }
}

/// Stateless encoder for timestamps and coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeLocationEncoder;

impl TimeLocationEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Phase of the diurnal cycle, `2π·hour/24`.
    pub fn hour_angle(ts: &DateTime<Utc>) -> f64 {
        2.0 * PI * f64::from(ts.hour()) / HOURS_PER_DAY
    }

    /// Phase of the annual cycle, `2π·(day_of_year - 1)/365`.
    pub fn day_angle(ts: &DateTime<Utc>) -> f64 {
        2.0 * PI * f64::from(ts.ordinal0()) / DAYS_PER_YEAR
    }

    pub fn encode(
        &self,
        timestamps: &[DateTime<Utc>],
        latitude: f64,
        longitude: f64,
    ) -> TimeLocationFeatures {
        let hours: Vec<f64> = timestamps.iter().map(Self::hour_angle).collect();
        let days: Vec<f64> = timestamps.iter().map(Self::day_angle).collect();

        TimeLocationFeatures {
            hour_sin: hours.iter().map(|a| a.sin()).collect(),
            hour_cos: hours.iter().map(|a| a.cos()).collect(),
            day_sin: days.iter().map(|a| a.sin()).collect(),
            day_cos: days.iter().map(|a| a.cos()).collect(),
            latitude: latitude / 90.0,
            longitude: longitude / 180.0,
        }
    }
}
