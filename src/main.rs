//! Forecast Enhancer CLI
//!
//! # Usage
//!
//! ```bash
//! # Enhance a payload and write the export next to it
//! forecast-enhancer enhance --input forecast.json
//!
//! # Serve the HTTP API
//! forecast-enhancer serve --addr 0.0.0.0:8080
//!
//! # Validate a config file
//! forecast-enhancer check-config enhancer.toml
//! ```
//!
//! # Environment Variables
//!
//! - `FORECAST_ENHANCER_CONFIG`: Path to the TOML config (default: ./enhancer.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use forecast_enhancer::api::{self, AppState};
use forecast_enhancer::config::{validation, EnhancerConfig};
use forecast_enhancer::export::save_to_json;
use forecast_enhancer::input::{load_forecast, InputDefaults};
use forecast_enhancer::{EnhancementMetrics, ForecastEnhancer};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "forecast-enhancer")]
#[command(about = "Short-range weather forecast enhancement")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config (overrides FORECAST_ENHANCER_CONFIG and ./enhancer.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Enhance a forecast file (.json or .csv) and write the JSON export
    Enhance {
        /// Input forecast file
        #[arg(short, long)]
        input: PathBuf,
        /// Output file (default: <input>_enhanced.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Cache directory (overrides [cache] dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Confidence threshold (overrides [pipeline] confidence_threshold)
        #[arg(long)]
        threshold: Option<f64>,
        /// Disable physics constraints
        #[arg(long)]
        no_physics: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Bind address (overrides [server] addr)
        #[arg(short, long, value_name = "HOST:PORT")]
        addr: Option<String>,
    },

    /// Validate a config file and print any warnings
    CheckConfig {
        /// Config file to validate
        file: PathBuf,
    },
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<EnhancerConfig> {
    match path {
        Some(p) => EnhancerConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(EnhancerConfig::load()),
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "forecast".to_string(), |s| s.to_string_lossy().into_owned());
    input.with_file_name(format!("{stem}_enhanced.json"))
}

fn run_enhance(
    mut config: EnhancerConfig,
    input: &Path,
    output: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    threshold: Option<f64>,
    no_physics: bool,
) -> Result<()> {
    if let Some(dir) = cache_dir {
        config.cache.dir = Some(dir);
    }
    if let Some(t) = threshold {
        config.pipeline.confidence_threshold = t;
    }
    if no_physics {
        config.pipeline.enable_physics_constraints = false;
    }

    let defaults = InputDefaults::from_config(&config.pipeline);
    let forecast = load_forecast(input, &defaults)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    info!(
        path = %input.display(),
        samples = forecast.len(),
        variables = forecast.variables().len(),
        "Loaded forecast"
    );

    let enhancer = ForecastEnhancer::new(config, None)?;
    let enhanced = enhancer.enhance(&forecast)?;
    let metrics = EnhancementMetrics::from_forecast(&enhanced);

    let output = output.unwrap_or_else(|| default_output_path(input));
    save_to_json(&enhanced, &output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_metrics(&metrics);
    println!("Enhanced forecast written to {}", output.display());
    Ok(())
}

fn print_metrics(metrics: &EnhancementMetrics) {
    println!("Variables enhanced:        {}", metrics.variables_enhanced);
    println!("Overall confidence:        {:.3}", metrics.overall_confidence);
    println!("Average enhancement delta: {:.3}", metrics.average_enhancement_magnitude);
    for (name, m) in &metrics.per_variable {
        println!("  {name:<26} confidence {:.3}  |delta| {:.3}", m.confidence, m.magnitude);
    }
}

async fn run_serve(config: EnhancerConfig, addr: Option<String>) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.server.addr.clone());
    let enhancer = Arc::new(ForecastEnhancer::new(config, None)?);

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Forecast Enhancer v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend: {}", enhancer.backend_name());
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    api::serve(AppState::new(enhancer), &addr).await
}

fn run_check_config(file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    // Warnings are logged while parsing; count them for the summary
    let unknown = validation::validate_unknown_keys(&raw).len();
    let config = EnhancerConfig::from_toml_str(&raw)
        .with_context(|| format!("{} is not a valid config", file.display()))?;
    let (_, range_warnings) = validation::validate_physical_ranges(&config);

    println!(
        "{} is valid ({} warning(s))",
        file.display(),
        unknown + range_warnings.len()
    );
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    match args.command {
        SubCommand::CheckConfig { file } => run_check_config(&file),
        SubCommand::Enhance {
            input,
            output,
            cache_dir,
            threshold,
            no_physics,
        } => {
            let config = load_config(args.config.as_deref())?;
            tokio::task::spawn_blocking(move || {
                run_enhance(config, &input, output, cache_dir, threshold, no_physics)
            })
            .await?
        }
        SubCommand::Serve { addr } => {
            let config = load_config(args.config.as_deref())?;
            run_serve(config, addr).await
        }
    }
}
