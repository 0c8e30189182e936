//! Extraction manifest: one entry per processed catalog record, in catalog order.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExemplarError, Result};
use crate::geo::Bounds;
use crate::stats::PatchStatistics;

/// Bounds in rasterio's `(left, bottom, right, top)` naming.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ManifestBounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl From<Bounds> for ManifestBounds {
    fn from(b: Bounds) -> Self {
        Self {
            left: b.west,
            bottom: b.south,
            right: b.east,
            top: b.north,
        }
    }
}

impl From<ManifestBounds> for Bounds {
    fn from(b: ManifestBounds) -> Self {
        Bounds::new(b.left, b.right, b.bottom, b.top)
    }
}

/// `y_deg` is negative for north-up patches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    pub x_deg: f64,
    pub y_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchResult {
    pub id: String,
    pub region: String,
    pub feature: String,
    pub tiles: Vec<String>,
    pub bounds: ManifestBounds,
    pub pixel_size: PixelSize,
    pub output_path: PathBuf,
    pub statistics: PatchStatistics,
    #[serde(default)]
    pub nodata_fraction: f64,
    #[serde(default = "default_usable")]
    pub usable: bool,
}

fn default_usable() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub exemplars: Vec<PatchResult>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| ExemplarError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| ExemplarError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pretty-printed JSON, parent directories created as needed.
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

    /// Entries whose id is in `ids`, in manifest order, plus the requested ids
    /// the manifest does not contain. An empty `ids` selects everything.
    pub fn select<'a, S: AsRef<str>>(&'a self, ids: &'a [S]) -> (Vec<&'a PatchResult>, Vec<&'a str>) {
        if ids.is_empty() {
            return (self.exemplars.iter().collect(), Vec::new());
        }
        let wanted = |id: &str| ids.iter().any(|w| AsRef::<str>::as_ref(w) == id);
        let selected = self.exemplars.iter().filter(|p| wanted(&p.id)).collect();
        let unknown = ids
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|id| !self.exemplars.iter().any(|p| p.id == *id))
            .collect();
        (selected, unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> PatchResult {
        PatchResult {
            id: "H01".into(),
            region: "Himalayan".into(),
            feature: "Everest massif".into(),
            tiles: vec!["N27E086".into()],
            bounds: Bounds::new(86.7, 87.1, 27.8, 28.2).into(),
            pixel_size: PixelSize {
                x_deg: 0.4 / 512.0,
                y_deg: -0.4 / 512.0,
            },
            output_path: PathBuf::from("/data/H01.tif"),
            statistics: PatchStatistics {
                min: 4100.0,
                max: 8848.0,
                mean: 5600.0,
                stddev: 700.0,
            },
            nodata_fraction: 0.0,
            usable: true,
        }
    }

    #[test]
    fn json_uses_rasterio_field_names() {
        let manifest = Manifest {
            exemplars: vec![entry()],
        };
        let json = serde_json::to_value(&manifest).unwrap();
        let e = &json["exemplars"][0];
        assert_eq!(e["bounds"]["left"], 86.7);
        assert_eq!(e["bounds"]["top"], 28.2);
        assert!(e["pixel_size"]["y_deg"].as_f64().unwrap() < 0.0);
        assert_eq!(e["statistics"]["max"], 8848.0);
        assert_eq!(e["usable"], true);
    }

    #[test]
    fn saved_manifest_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata").join("manifest.json");
        let manifest = Manifest {
            exemplars: vec![entry()],
        };
        manifest.save(&path).unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), manifest);
    }

    #[test]
    fn older_manifest_without_usability_fields_loads() {
        let text = r#"{"exemplars":[{"id":"A","region":"R","feature":"F","tiles":["T"],
            "bounds":{"left":0,"bottom":0,"right":1,"top":1},
            "pixel_size":{"x_deg":0.5,"y_deg":-0.5},"output_path":"/a.tif",
            "statistics":{"min":0,"max":1,"mean":0.5,"stddev":0.5}}]}"#;
        let manifest: Manifest = serde_json::from_str(text).unwrap();
        assert!(manifest.exemplars[0].usable);
        assert_eq!(manifest.exemplars[0].nodata_fraction, 0.0);
    }

    #[test]
    fn select_keeps_manifest_order_and_reports_unknown_ids() {
        let mut second = entry();
        second.id = "A01".into();
        let manifest = Manifest {
            exemplars: vec![entry(), second],
        };

        let (all, unknown) = manifest.select::<String>(&[]);
        assert_eq!(all.len(), 2);
        assert!(unknown.is_empty());

        let (picked, unknown) = manifest.select(&["A01", "Z99", "H01"]);
        let ids: Vec<_> = picked.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["H01", "A01"]);
        assert_eq!(unknown, vec!["Z99"]);
    }
}
