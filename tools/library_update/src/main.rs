/// Library update: merges the extraction manifest into the exemplar library
/// JSON consumed by the terrain amplification stage.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use exemplar_core::config::DEFAULT_PATCH_SIZE;
use exemplar_core::library::{entry_from_patch, LibraryLayout, Upsert};
use exemplar_core::{ExemplarLibrary, Manifest};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "library_update", about = "Upsert extracted exemplars into the exemplar library JSON")]
struct Args {
    /// Extraction manifest written by patch_cutter
    #[arg(long, default_value = "StageB_SRTM90/metadata/stageb_manifest.json", env = "EXEMPLAR_MANIFEST")]
    manifest: PathBuf,

    /// Library JSON to create or update
    #[arg(
        long,
        default_value = "Content/PlanetaryCreation/Exemplars/ExemplarLibrary.json",
        env = "EXEMPLAR_LIBRARY"
    )]
    library: PathBuf,

    /// Patch edge length recorded as the entry resolution
    #[arg(long, default_value_t = DEFAULT_PATCH_SIZE, env = "EXEMPLAR_PATCH_SIZE")]
    patch_size: usize,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("loading manifest {} (run patch_cutter first)", args.manifest.display()))?;

    let (mut library, existed) = ExemplarLibrary::load_or_default(&args.library)
        .with_context(|| format!("loading library {}", args.library.display()))?;
    if existed {
        info!(entries = library.exemplars.len(), "loaded existing library");
    } else {
        info!("creating new exemplar library");
    }

    let layout = LibraryLayout {
        patch_size: args.patch_size,
        ..LibraryLayout::default()
    };
    for patch in &manifest.exemplars {
        if !patch.usable {
            warn!(id = %patch.id, nodata_fraction = patch.nodata_fraction, "skipping unusable patch");
            continue;
        }
        let entry = entry_from_patch(patch, &layout);
        let name = entry.name.clone().unwrap_or_default();
        match library.upsert(entry) {
            Upsert::Added => info!(id = %patch.id, %name, "added"),
            Upsert::Updated => info!(id = %patch.id, %name, "updated"),
        }
    }
    library.sort();
    library
        .save(&args.library)
        .with_context(|| format!("writing library {}", args.library.display()))?;

    info!(path = %args.library.display(), total = library.exemplars.len(), "exemplar library updated");
    for (region, count) in library.region_counts() {
        info!(region, count, "region total");
    }
    Ok(())
}
