//! Input feature preparation
//!
//! Maps raw meteorological values into the bounded ranges the learned model
//! expects and derives the auxiliary time/location features fed alongside
//! them. Both are pure functions of the forecast.

mod encoding;
mod normalizer;

pub use encoding::{TimeLocationEncoder, TimeLocationFeatures, AUX_FEATURE_COUNT, AUX_FEATURE_NAMES};
pub use normalizer::Normalizer;
