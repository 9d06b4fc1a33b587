//! Enhanced forecast cache
//!
//! Persists enhanced forecasts to a sled tree keyed by location and first
//! timestamp. Snapshots older than the configured age are treated as misses.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::config::defaults::{CACHE_KEY_COORD_DECIMALS, CACHE_TREE_NAME};
use crate::types::Forecast;

/// Error type for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt cache entry '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Stored snapshot with the time it was written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedForecast {
    pub cached_at: DateTime<Utc>,
    pub forecast: Forecast,
}

/// On-disk cache of enhanced forecasts
#[derive(Clone)]
pub struct ForecastCache {
    db: Arc<sled::Db>,
    tree: sled::Tree,
    max_age: Duration,
}

impl std::fmt::Debug for ForecastCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastCache")
            .field("entries", &self.tree.len())
            .field("max_age_hours", &self.max_age.num_hours())
            .finish()
    }
}

impl ForecastCache {
    /// Open or create the cache database in `dir`.
    pub fn open<P: AsRef<Path>>(dir: P, max_age_hours: u32) -> Result<Self, CacheError> {
        let path = dir.as_ref();
        let db = sled::open(path)?;
        let tree = db.open_tree(CACHE_TREE_NAME)?;

        tracing::info!(path = %path.display(), entries = tree.len(), "Forecast cache opened");

        Ok(Self {
            db: Arc::new(db),
            tree,
            max_age: Duration::hours(i64::from(max_age_hours)),
        })
    }

    /// `"{lat:.2}_{lon:.2}_{first_timestamp}"`, or `None` for a forecast
    /// without timestamps.
    pub fn key_for(forecast: &Forecast) -> Option<String> {
        let first = forecast.first_timestamp()?;
        Some(format!(
            "{:.prec$}_{:.prec$}_{}",
            forecast.latitude(),
            forecast.longitude(),
            first.to_rfc3339(),
            prec = CACHE_KEY_COORD_DECIMALS
        ))
    }

    /// Look up a fresh snapshot.
    pub fn get(&self, key: &str) -> Result<Option<Forecast>, CacheError> {
        self.get_at(key, Utc::now())
    }

    /// Look up a snapshot as of `now`. Stale entries are removed.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Result<Option<Forecast>, CacheError> {
        let Some(bytes) = self.tree.get(key)? else {
            return Ok(None);
        };

        let cached: CachedForecast =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if now - cached.cached_at > self.max_age {
            tracing::debug!(key, cached_at = %cached.cached_at, "cache entry expired");
            self.tree.remove(key)?;
            return Ok(None);
        }

        cached.forecast.validate().map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Some(cached.forecast))
    }

    /// Store a snapshot stamped with the current time.
    pub fn put(&self, key: &str, forecast: &Forecast) -> Result<(), CacheError> {
        self.put_at(key, forecast, Utc::now())
    }

    pub fn put_at(
        &self,
        key: &str,
        forecast: &Forecast,
        cached_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_vec(&CachedForecast {
            cached_at,
            forecast: forecast.clone(),
        })?;
        self.tree.insert(key, value)?;
        self.db.flush()?;
        tracing::debug!(key, "cached enhanced forecast");
        Ok(())
    }

    /// Insert raw bytes under a key.
    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        self.tree.insert(key, bytes)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
