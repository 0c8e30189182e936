/// Post-extraction pipeline: runs png16_export and then library_update,
/// stopping at the first step that fails.
///
/// Steps are the sibling binaries installed next to this executable, each run
/// with its own defaults and environment.
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

const STEPS: [(&str, &str); 2] = [
    ("png16_export", "Convert to GeoTIFF copies and PNG16"),
    ("library_update", "Update exemplar library"),
];

#[derive(Parser, Debug)]
#[command(name = "process_exemplars", about = "Run the exemplar post-processing steps in order")]
struct Args {
    /// Directory holding the step binaries (defaults to this executable's directory)
    #[arg(long, env = "EXEMPLAR_BIN_DIR")]
    bin_dir: Option<PathBuf>,
}

fn step_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}{}", env::consts::EXE_SUFFIX))
}

fn main() -> Result<ExitCode> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let bin_dir = match args.bin_dir {
        Some(dir) => dir,
        None => {
            let exe = env::current_exe().context("locating current executable")?;
            match exe.parent() {
                Some(dir) => dir.to_path_buf(),
                None => bail!("executable {} has no parent directory", exe.display()),
            }
        }
    };

    for (name, description) in STEPS {
        let path = step_path(&bin_dir, name);
        if !path.is_file() {
            bail!("step binary not found: {}", path.display());
        }
        info!(step = name, "{description}");
        let status = Command::new(&path)
            .status()
            .with_context(|| format!("launching {}", path.display()))?;
        if !status.success() {
            error!(step = name, code = ?status.code(), "{description} failed");
            return Ok(ExitCode::FAILURE);
        }
        info!(step = name, "{description} completed");
    }

    info!("processing complete");
    Ok(ExitCode::SUCCESS)
}
