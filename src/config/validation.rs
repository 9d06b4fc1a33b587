//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use crate::types::policy;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Sections whose sub-tables are keyed by free-form variable names.
const VARIABLE_KEYED_SECTIONS: [(&str, &[&str]); 2] = [
    ("calibration", &["bias", "scale"]),
    ("confidence", &["base", "change_penalty"]),
];

/// Returns the set of valid dotted key paths for EnhancerConfig, excluding
/// the per-variable tables under `calibration` and `confidence`.
///
/// Maintained manually to match the struct hierarchy in enhancer_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [pipeline]
        "pipeline",
        "pipeline.variables",
        "pipeline.time_window_days",
        "pipeline.spatial_radius_miles",
        "pipeline.enable_physics_constraints",
        "pipeline.confidence_threshold",
        // [physics]
        "physics",
        "physics.humidity_coupling_coefficient",
        "physics.precipitation_cloud_threshold",
        "physics.min_cloud_cover_when_precipitating",
        "physics.max_temperature_change",
        "physics.max_pressure_change",
        "physics.max_relative_change_fraction",
        // [calibration.<variable>] / [confidence.<variable>]
        "calibration",
        "confidence",
        // [cache]
        "cache",
        "cache.dir",
        "cache.max_age_hours",
        // [server]
        "server",
        "server.addr",
        "server.request_timeout_secs",
        "server.max_body_bytes",
    ];
    keys.iter().copied().collect()
}

/// Whether a dotted key belongs to a per-variable table and is well formed.
///
/// `calibration.<any>` and `calibration.<any>.bias|scale` are accepted.
fn is_known_variable_key(key: &str) -> Option<bool> {
    let mut parts = key.splitn(3, '.');
    let section = parts.next()?;
    let (_, leaves) = VARIABLE_KEYED_SECTIONS.iter().find(|(s, _)| *s == section)?;
    let _variable = parts.next()?;
    Some(match parts.next() {
        None => true,
        Some(leaf) => leaves.contains(&leaf),
    })
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 && best.map_or(true, |(_, best_dist)| dist < best_dist) {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        if known.contains(key.as_str()) || is_known_variable_key(&key) == Some(true) {
            continue;
        }
        let suggestion = suggest_correction(&key, &known);
        warnings.push(ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            field: key,
            suggestion,
        });
    }

    warnings
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed EnhancerConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::EnhancerConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let ph = &config.physics;
    let p = &config.pipeline;

    // Precipitation threshold: a negative rate is physically impossible
    if ph.precipitation_cloud_threshold < 0.0 {
        errors.push(format!(
            "physics.precipitation_cloud_threshold = {:.2} cannot be negative",
            ph.precipitation_cloud_threshold
        ));
    }

    // Relative change fraction above 1 lets a single pass move a value by more
    // than the whole batch range
    if ph.max_relative_change_fraction > 1.0 {
        warnings.push(ValidationWarning {
            field: "physics.max_relative_change_fraction".to_string(),
            message: format!(
                "max_relative_change_fraction = {:.2} exceeds the batch range",
                ph.max_relative_change_fraction
            ),
            suggestion: None,
        });
    }

    // Warmer air holds more water, so relative humidity should fall as temperature rises
    if ph.humidity_coupling_coefficient > 0.0 {
        warnings.push(ValidationWarning {
            field: "physics.humidity_coupling_coefficient".to_string(),
            message: format!(
                "humidity_coupling_coefficient = {:.2} raises humidity with temperature",
                ph.humidity_coupling_coefficient
            ),
            suggestion: None,
        });
    }

    // Short-range horizon: beyond ~16 days the input is not a short-range forecast
    if p.time_window_days > 16 {
        warnings.push(ValidationWarning {
            field: "pipeline.time_window_days".to_string(),
            message: format!(
                "time_window_days = {} is outside the short-range horizon (1-16 days)",
                p.time_window_days
            ),
            suggestion: None,
        });
    }

    // Radius: suspicious if wider than a regional domain
    if p.spatial_radius_miles > 500.0 {
        warnings.push(ValidationWarning {
            field: "pipeline.spatial_radius_miles".to_string(),
            message: format!(
                "spatial_radius_miles = {:.1} is outside typical range (0-500 miles)",
                p.spatial_radius_miles
            ),
            suggestion: None,
        });
    }

    // Threshold at the extremes disables gating or reverts every sample
    if p.confidence_threshold <= 0.5 || p.confidence_threshold >= 1.0 {
        warnings.push(ValidationWarning {
            field: "pipeline.confidence_threshold".to_string(),
            message: format!(
                "confidence_threshold = {:.2} {}",
                p.confidence_threshold,
                if p.confidence_threshold <= 0.5 {
                    "never reverts a sample (confidence floor is 0.5)"
                } else {
                    "reverts every sample"
                }
            ),
            suggestion: None,
        });
    }

    // Variables without a policy row get identity transforms
    for name in &p.variables {
        if !policy::is_recognised(name) {
            warnings.push(ValidationWarning {
                field: "pipeline.variables".to_string(),
                message: format!("variable '{name}' has no dedicated policy; defaults apply"),
                suggestion: None,
            });
        }
    }

    // Calibration scales far from 1 are unusual for a bias correction
    for (name, entry) in &config.calibration {
        if entry.scale > 0.0 && !(0.5..=2.0).contains(&entry.scale) {
            warnings.push(ValidationWarning {
                field: format!("calibration.{name}.scale"),
                message: format!(
                    "calibration.{name}.scale = {:.2} is outside typical range (0.5-2.0)",
                    entry.scale
                ),
                suggestion: None,
            });
        }
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
