//! Batch patch extraction: catalog → tiles → window → resample → statistics.
//!
//! Records are processed in catalog order. A record's own failure never stops
//! the batch; it is collected with its id and reported at the end. Only
//! configuration errors abort the run.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::catalog::{parse_catalog, ExemplarRecord};
use crate::config::ExtractionConfig;
use crate::error::{ExemplarError, Result};
use crate::geotiff::write_geotiff;
use crate::manifest::{Manifest, PatchResult, PixelSize};
use crate::resample::resample;
use crate::stats::{compute_statistics, is_usable, NODATA_FRACTION_LIMIT};
use crate::tiles::open_tiles;
use crate::window::extract_window;

#[derive(Debug)]
pub struct RecordFailure {
    pub id: String,
    pub error: ExemplarError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub manifest: Manifest,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extract, resample, write and summarise one record.
///
/// The returned entry may be unusable (too much nodata); the caller decides
/// how to report it.
pub fn process_record(record: &ExemplarRecord, config: &ExtractionConfig) -> Result<PatchResult> {
    record.bounds.validate()?;
    let window = {
        let source = open_tiles(&record.tiles, &config.tiles_dir)?;
        extract_window(&source, &record.bounds)?
    };
    info!(
        id = %record.id,
        width = window.width,
        height = window.height,
        "extracted window"
    );

    let patch = resample(&window, config.size, config.kernel)?;
    let statistics = compute_statistics(&patch.data, patch.nodata)?;
    let nodata_fraction = patch.nodata_fraction();
    if nodata_fraction > NODATA_FRACTION_LIMIT {
        error!(
            id = %record.id,
            nodata_pct = nodata_fraction * 100.0,
            "nodata exceeds {:.0}% threshold, patch is not usable",
            NODATA_FRACTION_LIMIT * 100.0
        );
    } else if nodata_fraction > 0.0 {
        warn!(id = %record.id, nodata_pct = nodata_fraction * 100.0, "patch contains nodata");
    }

    let out_path = patch_path(&config.out_dir, &record.id);
    write_geotiff(&out_path, &patch)?;
    let output_path = fs::canonicalize(&out_path).map_err(|e| ExemplarError::io(&out_path, e))?;

    let (x_deg, y_deg) = patch.pixel_size();
    Ok(PatchResult {
        id: record.id.clone(),
        region: record.region.clone(),
        feature: record.feature.clone(),
        tiles: record.tiles.clone(),
        bounds: window.bounds().into(),
        pixel_size: PixelSize { x_deg, y_deg },
        output_path,
        statistics,
        nodata_fraction,
        usable: is_usable(nodata_fraction),
    })
}

/// Process every record, collecting per-record failures.
pub fn run_batch(records: &[ExemplarRecord], config: &ExtractionConfig) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for record in records {
        match process_record(record, config) {
            Ok(entry) => {
                info!(id = %entry.id, path = %entry.output_path.display(), "extracted patch");
                if !entry.usable {
                    report.failures.push(RecordFailure {
                        id: entry.id.clone(),
                        error: ExemplarError::DataIntegrity(format!(
                            "nodata fraction {:.4} exceeds {NODATA_FRACTION_LIMIT}",
                            entry.nodata_fraction
                        )),
                    });
                }
                report.manifest.exemplars.push(entry);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(id = %record.id, error = %e, "record failed");
                report.failures.push(RecordFailure {
                    id: record.id.clone(),
                    error: e,
                });
            }
        }
    }
    Ok(report)
}

/// Validate the configuration, run the whole catalog and write the manifest.
pub fn run_extraction(config: &ExtractionConfig) -> Result<BatchReport> {
    config.validate()?;
    let records = parse_catalog(&config.catalog)?;
    info!(records = records.len(), catalog = %config.catalog.display(), "loaded catalog");

    let report = run_batch(&records, config)?;
    if let Some(path) = &config.manifest {
        report.manifest.save(path)?;
        info!(path = %path.display(), entries = report.manifest.exemplars.len(), "manifest written");
    }
    log_summary(&report, records.len());
    Ok(report)
}

fn log_summary(report: &BatchReport, total: usize) {
    let failed = report.failures.len();
    if failed == 0 {
        info!(total, "all records extracted");
        return;
    }
    warn!(total, failed, "batch finished with failures");
    for f in &report.failures {
        warn!(id = %f.id, kind = ?f.error.kind(), "{}", f.error);
    }
}

/// Path of the patch written for `id`.
pub fn patch_path(out_dir: &Path, id: &str) -> PathBuf {
    out_dir.join(format!("{id}.tif"))
}
