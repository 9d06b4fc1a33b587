//! System-wide default constants.
//!
//! Numbers that are not operator-tunable per deployment but are shared
//! between modules. Grouped by subsystem for easy discovery.

// ============================================================================
// Confidence
// ============================================================================

/// Confidence never drops below this floor.
pub const CONFIDENCE_FLOOR: f64 = 0.5;

/// Flat confidence assigned to an enhanced variable with no original counterpart.
pub const UNMATCHED_VARIABLE_CONFIDENCE: f64 = 0.8;

/// Added to the batch mean when a flat batch has no range to normalize by.
pub const FLAT_BATCH_MEAN_OFFSET: f64 = 0.1;

// ============================================================================
// Cache
// ============================================================================

/// Decimal places of latitude/longitude used in cache keys.
pub const CACHE_KEY_COORD_DECIMALS: usize = 2;

/// Name of the sled tree holding forecast snapshots.
pub const CACHE_TREE_NAME: &str = "enhanced_forecasts";

// ============================================================================
// Server
// ============================================================================

/// Default budget for one enhancement request (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum request body (bytes). 2 MiB covers a 7-day hourly payload
/// with every variable many times over.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
