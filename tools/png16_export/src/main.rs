/// PNG16 export: turns each extracted patch into a 16-bit grayscale texture
/// scaled to its own elevation range, and re-encodes the GeoTIFF next to it
/// with LZW. `--id` limits the run to a subset for regeneration.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use exemplar_core::extract::patch_path;
use exemplar_core::geotiff::{read_geotiff, write_geotiff_compressed, TiffCompression};
use exemplar_core::png16::export_png16;
use exemplar_core::stats::NODATA_FRACTION_LIMIT;
use exemplar_core::Manifest;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "png16_export", about = "Export extracted patches as 16-bit PNG textures and GeoTIFF copies")]
struct Args {
    /// Extraction manifest written by patch_cutter
    #[arg(long, default_value = "StageB_SRTM90/metadata/stageb_manifest.json", env = "EXEMPLAR_MANIFEST")]
    manifest: PathBuf,

    /// Directory holding the cropped patches
    #[arg(long, default_value = "StageB_SRTM90/cropped", env = "EXEMPLAR_CROPPED_DIR")]
    cropped_dir: PathBuf,

    /// Destination for GeoTIFF copies
    #[arg(long, default_value = "Content/PlanetaryCreation/Exemplars/COG", env = "EXEMPLAR_COG_DIR")]
    cog_dir: PathBuf,

    /// Destination for PNG16 textures
    #[arg(long, default_value = "Content/PlanetaryCreation/Exemplars/PNG16", env = "EXEMPLAR_PNG16_DIR")]
    png16_dir: PathBuf,

    /// Only export these exemplar ids (repeatable; default is every manifest entry)
    #[arg(long = "id")]
    ids: Vec<String>,

    /// Regenerate PNG16 textures only, leaving the GeoTIFF copies untouched
    #[arg(long)]
    png16_only: bool,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("loading manifest {} (run patch_cutter first)", args.manifest.display()))?;
    let (selected, unknown) = manifest.select(&args.ids);
    for id in unknown {
        warn!(id, "requested id is not in the manifest");
    }
    info!(exemplars = selected.len(), "converting");

    if !args.png16_only {
        fs::create_dir_all(&args.cog_dir).with_context(|| format!("creating {}", args.cog_dir.display()))?;
    }
    for patch in selected {
        let src = patch_path(&args.cropped_dir, &patch.id);
        if !src.is_file() {
            warn!(id = %patch.id, path = %src.display(), "skipping, source patch not found");
            continue;
        }

        let raster = read_geotiff(&src).with_context(|| format!("reading {}", src.display()))?;
        if !args.png16_only {
            let cog = args.cog_dir.join(format!("{}.tif", patch.id));
            write_geotiff_compressed(&cog, &raster, TiffCompression::Lzw)
                .with_context(|| format!("writing {}", cog.display()))?;
            info!(id = %patch.id, path = %cog.display(), "geotiff written (lzw)");
        }

        let (min, max) = (patch.statistics.min, patch.statistics.max);
        let png = args.png16_dir.join(format!("{}.png", patch.id));
        let export = export_png16(&raster, min, max, &png).with_context(|| format!("writing {}", png.display()))?;

        let nodata_pct = export.nodata_fraction() * 100.0;
        if export.nodata_pixels > 0 {
            warn!(
                id = %patch.id,
                nodata = export.nodata_pixels,
                total = export.total_pixels,
                "{nodata_pct:.1}% of pixels are nodata, filled with minimum elevation"
            );
            if export.nodata_fraction() > NODATA_FRACTION_LIMIT {
                error!(id = %patch.id, "nodata exceeds threshold, this exemplar should not be used");
            }
        }
        info!(id = %patch.id, path = %png.display(), min_m = min, max_m = max, "png16 written");
    }

    info!(
        cog_dir = %args.cog_dir.display(),
        png16_dir = %args.png16_dir.display(),
        "conversion complete"
    );
    Ok(())
}
