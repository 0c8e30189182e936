/// Orientation estimate: prints the dominant grain direction of an exemplar
/// GeoTIFF as JSON, optionally saving it alongside.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use exemplar_core::geotiff::read_geotiff;
use exemplar_core::orientation::{dominant_orientation, DEFAULT_SIGMA_PX};
use exemplar_core::HeightField;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "orientation", about = "Estimate the dominant terrain orientation of a GeoTIFF patch")]
struct Args {
    /// Input GeoTIFF patch
    input: PathBuf,

    /// Optional output JSON path
    output: Option<PathBuf>,

    /// Structure-tensor smoothing radius in pixels
    #[arg(long, default_value_t = DEFAULT_SIGMA_PX, env = "EXEMPLAR_ORIENTATION_SIGMA")]
    sigma: f64,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let raster = read_geotiff(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let field = HeightField {
        data: raster
            .data
            .iter()
            .map(|&v| if raster.is_valid(v) { v as f64 } else { f64::NAN })
            .collect(),
        width: raster.width,
        height: raster.height,
    };

    let orientation = dominant_orientation(&field, args.sigma).rounded();
    let json = serde_json::to_string_pretty(&orientation)?;
    if let Some(out) = &args.output {
        fs::write(out, &json).with_context(|| format!("writing {}", out.display()))?;
        info!(path = %out.display(), "orientation written");
    }
    println!("{json}");
    Ok(())
}
