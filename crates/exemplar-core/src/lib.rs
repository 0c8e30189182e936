//! Exemplar patch extraction and fidelity scoring for terrain synthesis.

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod fidelity;
pub mod geo;
pub mod geotiff;
mod gradient;
pub mod grid;
pub mod guardrail;
pub mod heightfield;
pub mod library;
pub mod manifest;
pub mod mask;
pub mod orientation;
pub mod png16;
pub mod raster;
pub mod report;
pub mod resample;
pub mod sampler;
pub mod stats;
pub mod tiles;
pub mod window;

pub use catalog::{parse_catalog, ExemplarRecord};
pub use config::{ExtractionConfig, FidelityConfig};
pub use error::{ErrorKind, ExemplarError, Result};
pub use extract::{run_batch, run_extraction, BatchReport, RecordFailure};
pub use fidelity::{compare, orientation_delta, Comparison, ComparisonOptions, FidelityResult};
pub use geo::{Affine, Bounds};
pub use guardrail::{GuardrailCheck, GuardrailThresholds, Verdict};
pub use heightfield::HeightField;
pub use library::{ExemplarLibrary, LibraryEntry};
pub use manifest::{Manifest, PatchResult};
pub use raster::RasterWindow;
pub use resample::ResamplingKernel;
pub use stats::PatchStatistics;
