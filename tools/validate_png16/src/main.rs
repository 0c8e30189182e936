/// PNG16 validation: decodes an exported exemplar with its library range and
/// checks size and statistics against the library entry. Exits nonzero when
/// any check fails.
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use exemplar_core::png16::validate_png16;
use exemplar_core::ExemplarLibrary;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "validate_png16", about = "Check an exported PNG16 exemplar against its library metadata")]
struct Args {
    /// PNG16 exemplar to check
    png: PathBuf,

    /// Exemplar id in the library (e.g. H01)
    #[arg(long)]
    metadata_id: String,

    /// Exemplar library JSON
    #[arg(
        long,
        default_value = "Content/PlanetaryCreation/Exemplars/ExemplarLibrary.json",
        env = "EXEMPLAR_LIBRARY"
    )]
    library: PathBuf,
}

fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let library = ExemplarLibrary::load(&args.library)
        .with_context(|| format!("loading exemplar library {}", args.library.display()))?;
    let Some(entry) = library.find(&args.metadata_id) else {
        bail!("exemplar {} not found in {}", args.metadata_id, args.library.display());
    };

    let report = validate_png16(&args.png, entry).with_context(|| format!("validating {}", args.png.display()))?;
    let s = report.statistics;
    info!(
        id = %entry.id,
        width = report.width,
        height = report.height,
        min_m = s.min,
        max_m = s.max,
        mean_m = s.mean,
        stddev_m = s.stddev,
        "decoded"
    );

    if report.dimensions_match() {
        info!(width = report.width, height = report.height, "PASS dimensions");
    } else {
        let (w, h) = report.expected_size;
        error!(width = report.width, height = report.height, expected_width = w, expected_height = h, "FAIL dimensions");
    }
    for check in &report.checks {
        // relief checks carry no tolerance: `expected` is the minimum
        if check.passed {
            info!(decoded = check.decoded, expected = check.expected, tolerance = ?check.tolerance, "PASS {}", check.name);
        } else {
            error!(decoded = check.decoded, expected = check.expected, tolerance = ?check.tolerance, "FAIL {}", check.name);
        }
    }

    if report.passed() {
        info!(id = %entry.id, "validation passed");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(id = %entry.id, "validation failed");
        Ok(ExitCode::FAILURE)
    }
}
