//! Run configuration, built once at the process boundary and passed down.
//!
//! Library code never reads the environment; the binaries resolve flags and
//! environment fallbacks with clap and hand the result over here.

use std::path::{Path, PathBuf};

use crate::error::{ExemplarError, Result};
use crate::fidelity::ComparisonOptions;
use crate::guardrail::GuardrailThresholds;
use crate::mask::MaskOptions;
use crate::resample::ResamplingKernel;

pub const DEFAULT_PATCH_SIZE: usize = 512;

fn require_file(label: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ExemplarError::Configuration(format!("{label} not specified")));
    }
    if !path.is_file() {
        return Err(ExemplarError::Configuration(format!(
            "{label} not found: {}",
            path.display()
        )));
    }
    Ok(())
}

fn require_dir(label: &str, path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(ExemplarError::Configuration(format!(
            "{label} is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

fn require_output(label: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ExemplarError::Configuration(format!("{label} not specified")));
    }
    Ok(())
}

/// Patch extraction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub catalog: PathBuf,
    pub tiles_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Output edge length; 0 keeps native resolution.
    pub size: usize,
    pub kernel: ResamplingKernel,
    pub manifest: Option<PathBuf>,
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<()> {
        require_file("catalog", &self.catalog)?;
        require_dir("tiles directory", &self.tiles_dir)?;
        require_output("output directory", &self.out_dir)?;
        if let Some(manifest) = &self.manifest {
            require_output("manifest path", manifest)?;
        }
        Ok(())
    }
}

/// Fidelity analyzer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FidelityConfig {
    pub tile_id: String,
    pub stage_csv: PathBuf,
    pub exemplar_png: PathBuf,
    pub exemplar_json: PathBuf,
    pub metrics_csv: PathBuf,
    pub comparison_png: PathBuf,
    pub thresholds: GuardrailThresholds,
    pub mask: MaskOptions,
    /// Exit nonzero when a guardrail fails.
    pub fail_on_guardrail: bool,
}

impl FidelityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tile_id.trim().is_empty() {
            return Err(ExemplarError::Configuration("tile id not specified".to_string()));
        }
        require_file("simulated raster CSV", &self.stage_csv)?;
        require_file("exemplar PNG", &self.exemplar_png)?;
        require_file("exemplar library JSON", &self.exemplar_json)?;
        require_output("metrics CSV path", &self.metrics_csv)?;
        require_output("comparison PNG path", &self.comparison_png)?;
        self.thresholds.validate()
    }

    pub fn comparison_options(&self) -> ComparisonOptions {
        ComparisonOptions {
            mask: self.mask,
            thresholds: self.thresholds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extraction_config_requires_existing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("catalog.csv");
        let mut cfg = ExtractionConfig {
            catalog: catalog.clone(),
            tiles_dir: dir.path().to_path_buf(),
            out_dir: dir.path().join("out"),
            size: DEFAULT_PATCH_SIZE,
            kernel: ResamplingKernel::default(),
            manifest: None,
        };
        assert!(matches!(cfg.validate(), Err(ExemplarError::Configuration(_))));
        fs::write(&catalog, "id\n").unwrap();
        assert!(cfg.validate().is_ok());
        cfg.tiles_dir = dir.path().join("missing");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fidelity_config_rejects_blank_id_and_bad_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["stage.csv", "ex.png", "lib.json"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let mut cfg = FidelityConfig {
            tile_id: "H01".into(),
            stage_csv: dir.path().join("stage.csv"),
            exemplar_png: dir.path().join("ex.png"),
            exemplar_json: dir.path().join("lib.json"),
            metrics_csv: dir.path().join("out/metrics.csv"),
            comparison_png: dir.path().join("out/cmp.png"),
            thresholds: GuardrailThresholds::default(),
            mask: MaskOptions::default(),
            fail_on_guardrail: false,
        };
        assert!(cfg.validate().is_ok());

        cfg.thresholds.mean_diff_m = f64::NAN;
        assert!(cfg.validate().is_err());
        cfg.thresholds = GuardrailThresholds::default();
        cfg.tile_id = "  ".into();
        assert!(cfg.validate().is_err());
    }
}
