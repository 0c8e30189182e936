//! Exemplar library JSON: the catalogue of finished exemplars consumed by the
//! terrain pipeline and by the fidelity analyzer.
//!
//! Unknown keys are carried through a load/save cycle untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExemplarError, Result};
use crate::geo::Bounds;
use crate::manifest::PatchResult;

pub const LIBRARY_VERSION: &str = "1.0";
pub const LIBRARY_DESCRIPTION: &str = "Stage B exemplar terrain library for continental amplification";
pub const DATA_SOURCE: &str = "SRTM GL1 (NASA/USGS)";
pub const ATTRIBUTION: &str = "NASA Shuttle Radar Topography Mission (SRTM) Global 1 arc-second V003. \
DOI: 10.5067/MEaSUREs/SRTM/SRTMGL1.003";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width_px: usize,
    pub height_px: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_size_deg: Option<f64>,
}

/// One library entry. Only `id`, the elevation range, `bounds` and
/// `resolution` matter for fidelity comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cog_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub png16_path: Option<String>,
    pub elevation_min_m: f64,
    pub elevation_max_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_mean_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_stddev_m: Option<f64>,
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_tiles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LibraryEntry {
    /// Nominal `(width, height)`, falling back to `decoded` when the entry
    /// has no resolution block.
    pub fn resolution_or(&self, decoded: (usize, usize)) -> (usize, usize) {
        self.resolution
            .map(|r| (r.width_px, r.height_px))
            .unwrap_or(decoded)
    }
}

/// Where library assets live, relative to the consuming project's content root.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryLayout {
    pub cog_dir: String,
    pub png16_dir: String,
    /// Patch edge length in pixels recorded in `resolution`.
    pub patch_size: usize,
}

impl Default for LibraryLayout {
    fn default() -> Self {
        Self {
            cog_dir: "PlanetaryCreation/Exemplars/COG".to_string(),
            png16_dir: "PlanetaryCreation/Exemplars/PNG16".to_string(),
            patch_size: 512,
        }
    }
}

/// Build a library entry from one manifest record.
pub fn entry_from_patch(patch: &PatchResult, layout: &LibraryLayout) -> LibraryEntry {
    let id = patch.id.clone();
    LibraryEntry {
        name: Some(format!("{} - {}", patch.region, patch.feature)),
        region: patch.region.clone(),
        feature: Some(patch.feature.clone()),
        cog_path: Some(format!("{}/{id}.tif", layout.cog_dir)),
        png16_path: Some(format!("{}/{id}.png", layout.png16_dir)),
        elevation_min_m: patch.statistics.min,
        elevation_max_m: patch.statistics.max,
        elevation_mean_m: Some(patch.statistics.mean),
        elevation_stddev_m: Some(patch.statistics.stddev),
        bounds: patch.bounds.into(),
        resolution: Some(Resolution {
            width_px: layout.patch_size,
            height_px: layout.patch_size,
            pixel_size_deg: Some(patch.pixel_size.x_deg),
        }),
        source_tiles: patch.tiles.clone(),
        data_source: Some(DATA_SOURCE.to_string()),
        attribution: Some(ATTRIBUTION.to_string()),
        extra: Map::new(),
        id,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemplarLibrary {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exemplars: Vec<LibraryEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> String {
    LIBRARY_VERSION.to_string()
}

impl Default for ExemplarLibrary {
    fn default() -> Self {
        Self {
            version: default_version(),
            description: LIBRARY_DESCRIPTION.to_string(),
            exemplars: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl ExemplarLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ExemplarError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| ExemplarError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path`, or start an empty library when it does not exist yet.
    /// The flag reports whether the file existed.
    pub fn load_or_default(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ExemplarError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ExemplarError::io(parent, e))?;
        }
        fs::write(path, json).map_err(|e| ExemplarError::io(path, e))
    }

    pub fn find(&self, id: &str) -> Option<&LibraryEntry> {
        self.exemplars.iter().find(|e| e.id == id)
    }

    /// Replace the entry with the same id in place, or append.
    pub fn upsert(&mut self, entry: LibraryEntry) -> Upsert {
        match self.exemplars.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                *existing = entry;
                Upsert::Updated
            }
            None => {
                self.exemplars.push(entry);
                Upsert::Added
            }
        }
    }

    /// Order entries by `(region, id)`.
    pub fn sort(&mut self) {
        self.exemplars
            .sort_by(|a, b| (a.region.as_str(), a.id.as_str()).cmp(&(b.region.as_str(), b.id.as_str())));
    }

    pub fn region_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for e in &self.exemplars {
            *counts.entry(e.region.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
