//! Pipeline Regression Tests
//!
//! Exercises the full enhancement pipeline with the statistical strategy and
//! with mock inference engines (well-behaved, failing, wrong shape, wild
//! output). Asserts on physical validity after constraints, confidence
//! bounds, gating, pass-through and cache behaviour.

use chrono::{Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use forecast_enhancer::config::{EnhancerConfig, PhysicsConfig};
use forecast_enhancer::enhancer::{Enhancer, InferenceEngine, InferenceError, ModelInputs, Tensor};
use forecast_enhancer::physics_engine::PhysicsConstraintEngine;
use forecast_enhancer::processing::{Normalizer, TimeLocationEncoder};
use forecast_enhancer::types::policy::{
    self, CLOUD_COVER, DEFAULT_VARIABLES, PRECIPITATION, PRESSURE, RELATIVE_HUMIDITY,
    TEMPERATURE, WIND_U, WIND_V,
};
use forecast_enhancer::{
    CalibrationEngine, EnhancementPipeline, Forecast, ForecastEnhancer, Variable,
};

// ============================================================================
// Fixtures
// ============================================================================

fn hourly(n: usize) -> Vec<chrono::DateTime<Utc>> {
    let t0 = Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap();
    (0..n).map(|i| t0 + Duration::hours(i as i64)).collect()
}

fn build(vars: Vec<(&str, Vec<f64>)>) -> Forecast {
    let n = vars.first().map_or(0, |(_, v)| v.len());
    let vars = vars
        .into_iter()
        .map(|(name, values)| Variable::new(name, policy::policy_for(name).units, values))
        .collect();
    Forecast::new(vars, hourly(n), 41.88, -87.63, 10.0, BTreeMap::new()).unwrap()
}

/// A realistic 24 h forecast with every recognised variable.
fn full_forecast() -> Forecast {
    let n = 24;
    let series = |f: &dyn Fn(f64) -> f64| (0..n).map(|i| f(i as f64)).collect::<Vec<f64>>();
    build(vec![
        (TEMPERATURE, series(&|h| 295.0 + 4.0 * ((h - 9.0) * std::f64::consts::PI / 12.0).sin())),
        (PRECIPITATION, series(&|h| if (10.0..14.0).contains(&h) { 2.5 } else { 0.0 })),
        (PRESSURE, series(&|h| 101_200.0 - 10.0 * h)),
        (WIND_U, series(&|h| 3.0 + 0.2 * h)),
        (WIND_V, series(&|h| -1.0 + 0.1 * h)),
        (RELATIVE_HUMIDITY, series(&|h| 70.0 - h)),
        (CLOUD_COVER, series(&|h| 20.0 + 2.0 * h)),
    ])
}

fn variables() -> Vec<String> {
    DEFAULT_VARIABLES.iter().map(|s| s.to_string()).collect()
}

fn default_pipeline() -> EnhancementPipeline {
    EnhancementPipeline::new(&EnhancerConfig::default(), None)
}

// ============================================================================
// Mock Engines
// ============================================================================

/// Fills every output cell with the same normalized value.
struct Constant(f64);

impl InferenceEngine for Constant {
    fn run(&self, inputs: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
        let (rows, cols) = inputs.variables.shape();
        Ok(vec![Tensor::new(rows, cols, vec![self.0; rows * cols])?])
    }
    fn backend_name(&self) -> &'static str {
        "constant"
    }
}

/// Echoes the input and counts calls.
#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

impl InferenceEngine for Counting {
    fn run(&self, inputs: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![inputs.variables.clone(), inputs.auxiliary.clone()])
    }
    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

struct Failing;

impl InferenceEngine for Failing {
    fn run(&self, _: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
        Err(InferenceError::Engine("model not loaded".into()))
    }
    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Returns a tensor with one row too few.
struct ShortOutput;

impl InferenceEngine for ShortOutput {
    fn run(&self, inputs: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
        let (rows, cols) = inputs.variables.shape();
        let rows = rows.saturating_sub(1);
        Ok(vec![Tensor::new(rows, cols, vec![0.0; rows * cols])?])
    }
    fn backend_name(&self) -> &'static str {
        "short"
    }
}

struct Empty;

impl InferenceEngine for Empty {
    fn run(&self, _: &ModelInputs) -> Result<Vec<Tensor>, InferenceError> {
        Ok(Vec::new())
    }
    fn backend_name(&self) -> &'static str {
        "empty"
    }
}

/// Enhancer output followed by the physics stage, as the pipeline runs them.
fn constrained(engine: Option<Arc<dyn InferenceEngine>>, forecast: &Forecast) -> BTreeMap<String, Vec<f64>> {
    let features =
        TimeLocationEncoder::new().encode(forecast.timestamps(), forecast.latitude(), forecast.longitude());
    let enhanced = Enhancer::new(engine, CalibrationEngine::default()).enhance(forecast, &features, &variables());
    PhysicsConstraintEngine::new(PhysicsConfig::default()).apply(enhanced, forecast)
}

// ============================================================================
// Normalizer
// ============================================================================

#[test]
fn normalizer_round_trips_within_tolerance() {
    let n = Normalizer::new();
    let forecast = full_forecast();
    for (name, var) in forecast.variables() {
        let back = n.denormalize(name, &n.normalize(name, &var.values));
        for (orig, got) in var.values.iter().zip(&back) {
            let rel = (orig - got).abs() / orig.abs().max(1.0);
            assert!(rel < 1e-5, "{name}: {orig} -> {got}");
        }
    }
}

// ============================================================================
// Physics Stage
// ============================================================================

#[test]
fn constraints_hold_for_wild_engine_output() {
    let forecast = full_forecast();
    for wild in [5.0, -5.0, 0.0, 40.0] {
        let out = constrained(Some(Arc::new(Constant(wild))), &forecast);

        assert!(out[PRECIPITATION].iter().all(|p| *p >= 0.0), "precip < 0 for {wild}");
        for name in [RELATIVE_HUMIDITY, CLOUD_COVER] {
            assert!(
                out[name].iter().all(|v| (0.0..=100.0).contains(v)),
                "{name} out of [0, 100] for {wild}: {:?}",
                out[name]
            );
        }

        let orig_t = forecast.values(TEMPERATURE).unwrap();
        for (e, o) in out[TEMPERATURE].iter().zip(orig_t) {
            assert!((e - o).abs() <= 5.0 + 1e-9, "temperature moved {}", e - o);
        }
        let orig_p = forecast.values(PRESSURE).unwrap();
        for (e, o) in out[PRESSURE].iter().zip(orig_p) {
            assert!((e - o).abs() <= 500.0 + 1e-9, "pressure moved {}", e - o);
        }
    }
}

#[test]
fn heavy_precipitation_raises_cloud_cover() {
    let forecast = build(vec![
        (PRECIPITATION, vec![0.0, 2.0, 5.0]),
        (CLOUD_COVER, vec![10.0, 10.0, 10.0]),
    ]);
    let out = constrained(None, &forecast);
    for (p, c) in out[PRECIPITATION].iter().zip(&out[CLOUD_COVER]) {
        if *p > 1.0 {
            assert!(*c >= 70.0, "cloud {c} with precipitation {p}");
        }
    }
    assert!(out[PRECIPITATION][1] > 1.0);
    assert!(out[PRECIPITATION][2] > 1.0);
}

// ============================================================================
// Full Pipeline
// ============================================================================

#[test]
fn constant_temperature_gets_non_constant_enhancement() {
    let forecast = build(vec![(TEMPERATURE, vec![300.0; 24])]);
    let out = default_pipeline().run(&forecast).unwrap();
    let t = out.variable(TEMPERATURE).unwrap();

    let first = t.values[0];
    assert!(t.values.iter().any(|v| (v - first).abs() > 1e-6), "output is flat");
    for (v, d) in t.values.iter().zip(t.delta().unwrap()) {
        assert!((d - (v - 300.0)).abs() < 1e-9);
    }
}

#[test]
fn confidence_stays_within_floor_and_base() {
    let forecast = full_forecast();
    for engine in [
        None,
        Some(Arc::new(Constant(3.0)) as Arc<dyn InferenceEngine>),
        Some(Arc::new(Constant(-3.0)) as Arc<dyn InferenceEngine>),
    ] {
        let out = EnhancementPipeline::new(&EnhancerConfig::default(), engine)
            .run(&forecast)
            .unwrap();
        for (name, var) in out.variables() {
            let base = policy::policy_for(name).confidence.base;
            for c in var.confidence().unwrap() {
                assert!((0.5..=base).contains(c), "{name} confidence {c} outside [0.5, {base}]");
            }
        }
    }
}

#[test]
fn threshold_one_returns_original_values() {
    let mut config = EnhancerConfig::default();
    config.pipeline.confidence_threshold = 1.0;
    let forecast = full_forecast();

    let out = EnhancementPipeline::new(&config, Some(Arc::new(Constant(2.0))))
        .run(&forecast)
        .unwrap();
    for (name, var) in out.variables() {
        assert_eq!(Some(var.values.as_slice()), forecast.values(name), "{name} not reverted");
        assert!(var.delta().unwrap().iter().all(|d| *d == 0.0));
        assert!(var.confidence().is_some(), "{name} lost its confidence");
    }
}

#[test]
fn gating_reverts_only_low_confidence_samples() {
    let forecast = full_forecast();
    let out = default_pipeline().run(&forecast).unwrap();
    for (name, var) in out.variables() {
        let orig = forecast.values(name).unwrap();
        let conf = var.confidence().unwrap();
        let delta = var.delta().unwrap();
        for i in 0..var.len() {
            if conf[i] < 0.7 {
                assert_eq!(var.values[i], orig[i]);
                assert_eq!(delta[i], 0.0);
            } else {
                assert!((delta[i] - (var.values[i] - orig[i])).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn unconfigured_variable_passes_through() {
    let mut config = EnhancerConfig::default();
    config.pipeline.variables = vec![TEMPERATURE.to_string()];
    let forecast = build(vec![
        (TEMPERATURE, vec![288.0, 289.0, 290.0]),
        ("snow_depth", vec![0.2, 0.25, 0.3]),
        (WIND_U, vec![1.0, 2.0, 3.0]),
    ]);

    let out = EnhancementPipeline::new(&config, None).run(&forecast).unwrap();
    for name in ["snow_depth", WIND_U] {
        let var = out.variable(name).unwrap();
        assert_eq!(var, forecast.variable(name).unwrap());
        assert!(var.enhancement.is_none());
    }
}

#[test]
fn context_is_copied_unchanged() {
    let forecast = full_forecast();
    let out = default_pipeline().run(&forecast).unwrap();
    assert_eq!(out.timestamps(), forecast.timestamps());
    assert_eq!(out.latitude(), forecast.latitude());
    assert_eq!(out.longitude(), forecast.longitude());
    assert_eq!(out.radius_miles(), forecast.radius_miles());
    assert_eq!(out.metadata(), forecast.metadata());
}

#[test]
fn pipeline_without_physics_can_leave_invalid_ranges() {
    let mut config = EnhancerConfig::default();
    config.pipeline.enable_physics_constraints = false;
    config.pipeline.confidence_threshold = 0.0;
    let forecast = full_forecast();

    let out = EnhancementPipeline::new(&config, Some(Arc::new(Constant(5.0))))
        .run(&forecast)
        .unwrap();
    // 5.0 normalized humidity is 500 %, nothing clamps it
    assert!(out.values(RELATIVE_HUMIDITY).unwrap().iter().any(|v| *v > 100.0));
}

// ============================================================================
// Inference Fallback
// ============================================================================

#[test]
fn engine_failures_fall_back_to_statistical() {
    let forecast = full_forecast();
    let statistical = default_pipeline().run(&forecast).unwrap();

    let engines: [Arc<dyn InferenceEngine>; 3] =
        [Arc::new(Failing), Arc::new(ShortOutput), Arc::new(Empty)];
    for engine in engines {
        let name = engine.backend_name();
        let out = EnhancementPipeline::new(&EnhancerConfig::default(), Some(engine))
            .run(&forecast)
            .unwrap();
        assert_eq!(out, statistical, "{name} did not fall back");
    }
}

#[test]
fn missing_configured_variable_falls_back() {
    let engine = Arc::new(Counting::default());
    let forecast = build(vec![(TEMPERATURE, vec![290.0, 291.0])]);
    let out = EnhancementPipeline::new(&EnhancerConfig::default(), Some(engine.clone()))
        .run(&forecast)
        .unwrap();
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(out, default_pipeline().run(&forecast).unwrap());
}

#[test]
fn echo_engine_keeps_values_before_calibration() {
    let engine = Arc::new(Counting::default());
    let mut config = EnhancerConfig::default();
    config.pipeline.variables = vec![PRESSURE.to_string()];
    let forecast = build(vec![(PRESSURE, vec![101_000.0, 101_100.0, 101_300.0])]);

    let out = EnhancementPipeline::new(&config, Some(engine.clone()))
        .run(&forecast)
        .unwrap();
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    // pressure calibration is the identity, so an echo leaves it untouched
    for (e, o) in out.values(PRESSURE).unwrap().iter().zip(forecast.values(PRESSURE).unwrap()) {
        assert!((e - o).abs() < 1e-6);
    }
}

// ============================================================================
// Cache
// ============================================================================

#[test]
fn cached_results_skip_inference() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EnhancerConfig::default();
    config.cache.dir = Some(dir.path().join("cache"));

    let engine = Arc::new(Counting::default());
    let enhancer = ForecastEnhancer::new(config, Some(engine.clone())).unwrap();
    let forecast = full_forecast();

    let first = enhancer.enhance(&forecast).unwrap();
    let second = enhancer.enhance(&forecast).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(enhancer.cache().map(|c| c.len()), Some(1));
}

#[test]
fn statistical_only_bypasses_engine_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EnhancerConfig::default();
    config.cache.dir = Some(dir.path().join("cache"));

    let engine = Arc::new(Counting::default());
    let enhancer = ForecastEnhancer::new(config, Some(engine.clone())).unwrap();
    let forecast = full_forecast();

    let out = enhancer.enhance_statistical_only(&forecast).unwrap();
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(enhancer.cache().map(|c| c.len()), Some(0));
    assert_eq!(out, default_pipeline().run(&forecast).unwrap());
}
