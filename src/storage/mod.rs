//! Result Storage
//!
//! Persists enhanced forecasts to Sled DB so that repeated requests for the
//! same location and forecast run are served without recomputation.

mod cache;

pub use cache::{CacheError, CachedForecast, ForecastCache};
