/// Patch cutter: crops every catalog record out of its source tiles,
/// resamples it to a square patch and writes the extraction manifest.
///
/// Records are independent. Failures are collected and listed at the end;
/// the process exits nonzero if any record failed.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use exemplar_core::config::{ExtractionConfig, DEFAULT_PATCH_SIZE};
use exemplar_core::{run_extraction, ResamplingKernel};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "patch_cutter", about = "Crop catalog exemplars out of elevation tiles into square GeoTIFF patches")]
struct Args {
    /// CSV catalog describing exemplar bounding boxes
    #[arg(long, env = "PATCH_CUTTER_CATALOG")]
    catalog: PathBuf,

    /// Directory containing the source GeoTIFF tiles
    #[arg(long, env = "PATCH_CUTTER_TILES_DIR")]
    tiles_dir: PathBuf,

    /// Directory where cropped patches are written
    #[arg(long, env = "PATCH_CUTTER_OUT_DIR")]
    out_dir: PathBuf,

    /// Output patch edge length in pixels (0 keeps native resolution)
    #[arg(long, default_value_t = DEFAULT_PATCH_SIZE, env = "PATCH_CUTTER_SIZE")]
    size: usize,

    /// Resampling kernel: nearest, bilinear, cubic or average
    #[arg(long, default_value = "bilinear", env = "PATCH_CUTTER_RESAMPLING")]
    resampling: ResamplingKernel,

    /// Optional path for the JSON manifest
    #[arg(long, env = "PATCH_CUTTER_MANIFEST")]
    manifest: Option<PathBuf>,
}

impl From<Args> for ExtractionConfig {
    fn from(args: Args) -> Self {
        Self {
            catalog: args.catalog,
            tiles_dir: args.tiles_dir,
            out_dir: args.out_dir,
            size: args.size,
            kernel: args.resampling,
            manifest: args.manifest,
        }
    }
}

fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = ExtractionConfig::from(Args::parse());
    let report = run_extraction(&config)
        .with_context(|| format!("extracting patches from {}", config.catalog.display()))?;

    if report.is_success() {
        info!(patches = report.manifest.exemplars.len(), out_dir = %config.out_dir.display(), "done");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(failed = report.failures.len(), "some records could not be extracted");
        Ok(ExitCode::FAILURE)
    }
}
