/// Fidelity analyzer: scores a simulated elevation raster against one library
/// exemplar and writes the metrics CSV plus a three-panel comparison PNG.
///
/// Guardrail results are logged as PASS/FAIL/WARN. They only change the exit
/// status when `--fail-on-guardrail` is given.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use exemplar_core::config::FidelityConfig;
use exemplar_core::guardrail::{
    any_failed, GuardrailThresholds, Verdict, DEFAULT_INTERIOR_DIFF_THRESHOLD_M,
    DEFAULT_MEAN_DIFF_THRESHOLD_M, DEFAULT_SPIKE_WARNING_THRESHOLD_M,
};
use exemplar_core::mask::MaskOptions;
use exemplar_core::png16::load_png16;
use exemplar_core::report::{comparison_image, save_comparison_image, write_metrics_csv};
use exemplar_core::{compare, ExemplarLibrary, HeightField};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fidelity", about = "Score a simulated elevation raster against an exemplar patch")]
struct Args {
    /// Exemplar id in the library (e.g. H01)
    #[arg(long, env = "PLANETARY_STAGEB_ANALYZER_TILE_ID")]
    tile_id: String,

    /// Simulated elevation raster as CSV (rows north to south)
    #[arg(long = "stageb-csv", env = "PLANETARY_STAGEB_ANALYZER_STAGE_CSV")]
    stage_csv: PathBuf,

    /// Exemplar 16-bit grayscale PNG
    #[arg(long, env = "PLANETARY_STAGEB_ANALYZER_EXEMPLAR_PNG")]
    exemplar_png: PathBuf,

    /// Exemplar library JSON
    #[arg(long, env = "PLANETARY_STAGEB_ANALYZER_EXEMPLAR_JSON")]
    exemplar_json: PathBuf,

    /// Output metrics CSV
    #[arg(long, env = "PLANETARY_STAGEB_ANALYZER_METRICS_CSV")]
    metrics_csv: PathBuf,

    /// Output comparison PNG
    #[arg(long, env = "PLANETARY_STAGEB_ANALYZER_COMPARISON_PNG")]
    comparison_png: PathBuf,

    /// Absolute mean-difference guardrail in metres
    #[arg(long, default_value_t = DEFAULT_MEAN_DIFF_THRESHOLD_M, env = "PLANETARY_STAGEB_ANALYZER_MEAN_THRESHOLD")]
    mean_diff_threshold: f64,

    /// Interior max-difference guardrail in metres
    #[arg(long, default_value_t = DEFAULT_INTERIOR_DIFF_THRESHOLD_M, env = "PLANETARY_STAGEB_ANALYZER_INTERIOR_THRESHOLD")]
    interior_diff_threshold: f64,

    /// Warn when any cell differs by more than this many metres
    #[arg(long, default_value_t = DEFAULT_SPIKE_WARNING_THRESHOLD_M, env = "PLANETARY_STAGEB_ANALYZER_SPIKE_THRESHOLD")]
    spike_warning_threshold: f64,

    /// Exclude the tile perimeter and unfilled lowlands from scoring
    #[arg(
        long,
        env = "PLANETARY_STAGEB_ANALYZER_ENABLE_MASK",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    enable_perimeter_mask: bool,

    /// Exit nonzero when a guardrail fails
    #[arg(long)]
    fail_on_guardrail: bool,
}

impl From<Args> for FidelityConfig {
    fn from(args: Args) -> Self {
        Self {
            tile_id: args.tile_id,
            stage_csv: args.stage_csv,
            exemplar_png: args.exemplar_png,
            exemplar_json: args.exemplar_json,
            metrics_csv: args.metrics_csv,
            comparison_png: args.comparison_png,
            thresholds: GuardrailThresholds {
                mean_diff_m: args.mean_diff_threshold,
                interior_diff_m: args.interior_diff_threshold,
                spike_warning_m: args.spike_warning_threshold,
            },
            mask: MaskOptions {
                enabled: args.enable_perimeter_mask,
            },
            fail_on_guardrail: args.fail_on_guardrail,
        }
    }
}

fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = FidelityConfig::from(Args::parse());
    config.validate()?;
    let t = config.thresholds;
    info!(
        mean_m = t.mean_diff_m,
        interior_m = t.interior_diff_m,
        spike_m = t.spike_warning_m,
        mask = config.mask.enabled,
        "guardrails configured"
    );

    let library = ExemplarLibrary::load(&config.exemplar_json)
        .with_context(|| format!("loading exemplar library {}", config.exemplar_json.display()))?;
    let Some(entry) = library.find(&config.tile_id) else {
        bail!("tile id {} not found in exemplar library", config.tile_id);
    };

    let simulated = HeightField::load_csv(&config.stage_csv)
        .with_context(|| format!("reading simulated raster {}", config.stage_csv.display()))?;
    let exemplar = load_png16(&config.exemplar_png, entry.elevation_min_m, entry.elevation_max_m)
        .with_context(|| format!("reading exemplar {}", config.exemplar_png.display()))?;

    let resolution = entry.resolution_or((exemplar.width, exemplar.height));
    let cmp = compare(
        &simulated,
        &exemplar,
        resolution,
        entry.bounds,
        &config.comparison_options(),
    )
    .with_context(|| format!("comparing against exemplar {}", config.tile_id))?;
    let result = &cmp.result;
    info!(
        tile = %config.tile_id,
        mean_diff_m = result.mean_diff_m,
        max_abs_diff_m = result.max_abs_diff_m,
        orientation_mean_deg = result.orientation_mean_deg,
        mask_valid_fraction = result.mask_valid_fraction,
        "comparison scored"
    );
    if result.mask_fell_back {
        warn!("interior mask excluded every cell, scored the full grid instead");
    }

    write_metrics_csv(&config.metrics_csv, result)
        .with_context(|| format!("writing metrics {}", config.metrics_csv.display()))?;
    info!(path = %config.metrics_csv.display(), "metrics written");

    let exemplar_panel = if (exemplar.width, exemplar.height) == (cmp.grid.width(), cmp.grid.height()) {
        &exemplar
    } else {
        &cmp.exemplar
    };
    let img = comparison_image(&cmp.simulated, exemplar_panel, &cmp.masked_diff());
    save_comparison_image(&config.comparison_png, &img)
        .with_context(|| format!("writing comparison image {}", config.comparison_png.display()))?;
    info!(path = %config.comparison_png.display(), "comparison image written");

    for check in &result.guardrails {
        match check.verdict {
            Verdict::Pass => info!("{check}"),
            Verdict::Warn => warn!("{check}"),
            Verdict::Fail => error!("{check}"),
        }
    }

    if config.fail_on_guardrail && any_failed(&result.guardrails) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
