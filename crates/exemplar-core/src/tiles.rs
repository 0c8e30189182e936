//! Tile lookup and multi-tile mosaicking.
//!
//! Source tiles are GeoTIFFs named `{tile_id}*.tif` inside one directory.
//! When a record spans several tiles they are merged onto the first tile's
//! grid (pixel size and nodata sentinel) covering the union of all extents.
//! Per-tile rasters are owned values consumed by the merge, so every one of
//! them is dropped once the mosaic exists, or as soon as any step fails.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ExemplarError, Result};
use crate::geo::{Affine, Bounds};
use crate::geotiff::read_geotiff;
use crate::raster::RasterWindow;

/// Resolve exactly one `{tile_id}*.tif` file in `dir`.
pub fn locate_tile(tile_id: &str, dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|e| ExemplarError::io(dir, e))?;
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ExemplarError::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(tile_id) && name.ends_with(".tif") && entry.path().is_file() {
            candidates.push(entry.path());
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(ExemplarError::TileNotFound {
            tile_id: tile_id.to_string(),
            dir: dir.to_path_buf(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(ExemplarError::AmbiguousTile {
            tile_id: tile_id.to_string(),
            candidates: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Load the raster covering all `tile_ids`, merging when there is more than one.
pub fn open_tiles(tile_ids: &[String], dir: &Path) -> Result<RasterWindow> {
    let paths = tile_ids
        .iter()
        .map(|id| locate_tile(id, dir))
        .collect::<Result<Vec<_>>>()?;

    match paths.as_slice() {
        [] => Err(ExemplarError::Configuration("no tile paths resolved".to_string())),
        [single] => read_geotiff(single),
        many => {
            let mut sources = Vec::with_capacity(many.len());
            for path in many {
                debug!(path = %path.display(), "reading tile for mosaic");
                sources.push(read_geotiff(path)?);
            }
            let mosaic = merge_tiles(sources)?;
            info!(
                tiles = many.len(),
                width = mosaic.width,
                height = mosaic.height,
                "merged tiles into mosaic"
            );
            Ok(mosaic)
        }
    }
}

/// Merge rasters onto the first raster's resolution over their union extent.
///
/// Destination cells take the first valid source sample (in input order) whose
/// pixel contains the cell centre; cells no source covers keep the template's
/// nodata value (NaN when the template has none).
pub fn merge_tiles(sources: Vec<RasterWindow>) -> Result<RasterWindow> {
    let Some(template) = sources.first() else {
        return Err(ExemplarError::Configuration("no rasters to merge".to_string()));
    };
    let x_res = template.transform.a.abs();
    let y_res = template.transform.e.abs();
    if x_res == 0.0 || y_res == 0.0 {
        return Err(ExemplarError::Geometry("template tile has zero pixel size".to_string()));
    }
    let nodata = template.nodata;

    let extent = sources
        .iter()
        .map(RasterWindow::bounds)
        .reduce(|acc, b| acc.union(&b))
        .unwrap_or_else(|| template.bounds());
    extent.validate()?;

    let width = (extent.lon_range() / x_res).round().max(1.0) as usize;
    let height = (extent.lat_range() / y_res).round().max(1.0) as usize;
    let transform = Affine::north_up(extent.west, extent.north, x_res, y_res);
    let mut mosaic = RasterWindow::empty(width, height, transform, nodata);

    for source in sources {
        paste(&mut mosaic, &source)?;
    }
    Ok(mosaic)
}

fn paste(mosaic: &mut RasterWindow, source: &RasterWindow) -> Result<()> {
    let inverse = source
        .transform
        .inverse()
        .ok_or_else(|| ExemplarError::Geometry("tile transform is not invertible".to_string()))?;
    let src_bounds = source.bounds();
    let Some((rows, cols)) = overlap_cells(mosaic, &src_bounds) else {
        return Ok(());
    };

    for row in rows {
        for col in cols.clone() {
            let current = mosaic.get(row, col);
            if mosaic.is_valid(current) {
                continue;
            }
            let (x, y) = mosaic.transform.apply(col as f64 + 0.5, row as f64 + 0.5);
            let (sc, sr) = inverse.apply(x, y);
            if sc < 0.0 || sr < 0.0 {
                continue;
            }
            let (sc, sr) = (sc.floor() as usize, sr.floor() as usize);
            if sc >= source.width || sr >= source.height {
                continue;
            }
            let value = source.get(sr, sc);
            if source.is_valid(value) {
                mosaic.set(row, col, value);
            }
        }
    }
    Ok(())
}

/// Row and column ranges of `mosaic` cells that can fall inside `bounds`.
fn overlap_cells(
    mosaic: &RasterWindow,
    bounds: &Bounds,
) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let inverse = mosaic.transform.inverse()?;
    let (c0, r0) = inverse.apply(bounds.west, bounds.north);
    let (c1, r1) = inverse.apply(bounds.east, bounds.south);
    let clamp_w = |v: f64| v.clamp(0.0, mosaic.width as f64) as usize;
    let clamp_h = |v: f64| v.clamp(0.0, mosaic.height as f64) as usize;
    let cols = clamp_w(c0.min(c1).floor())..clamp_w(c0.max(c1).ceil());
    let rows = clamp_h(r0.min(r1).floor())..clamp_h(r0.max(r1).ceil());
    (!cols.is_empty() && !rows.is_empty()).then_some((rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(west: f64, north: f64, value: f32) -> RasterWindow {
        let t = Affine::north_up(west, north, 0.25, 0.25);
        RasterWindow::from_data(vec![value; 16], 4, 4, t, Some(-32768.0)).unwrap()
    }

    #[test]
    fn side_by_side_tiles_merge_into_union() {
        let merged = merge_tiles(vec![tile(0.0, 1.0, 10.0), tile(1.0, 1.0, 20.0)]).unwrap();
        assert_eq!((merged.width, merged.height), (8, 4));
        assert_eq!(merged.bounds(), Bounds::new(0.0, 2.0, 0.0, 1.0));
        assert_eq!(merged.get(0, 0), 10.0);
        assert_eq!(merged.get(3, 7), 20.0);
        assert_eq!(merged.nodata_fraction(), 0.0);
    }

    #[test]
    fn gaps_keep_nodata_and_first_tile_wins_overlap() {
        let mut first = tile(0.0, 1.0, 10.0);
        first.set(2, 3, -32768.0);
        let diagonal = tile(0.5, 0.5, 30.0);
        let merged = merge_tiles(vec![first, diagonal]).unwrap();
        assert_eq!((merged.width, merged.height), (6, 6));
        // overlap: first tile valid sample wins
        assert_eq!(merged.get(3, 2), 10.0);
        // hole in the first tile is filled by the second
        assert_eq!(merged.get(2, 3), 30.0);
        // top-right corner is covered by neither tile
        assert!(!merged.is_valid(merged.get(0, 5)));
    }

    #[test]
    fn finer_tile_is_sampled_onto_the_first_tiles_grid() {
        let coarse = tile(0.0, 1.0, 10.0);
        let fine_data = (0..64).map(|i| i as f32).collect();
        let fine = RasterWindow::from_data(fine_data, 8, 8, Affine::north_up(1.0, 1.0, 0.125, 0.125), Some(-32768.0)).unwrap();

        let merged = merge_tiles(vec![coarse, fine]).unwrap();
        assert_eq!((merged.width, merged.height), (8, 4));
        assert_eq!((merged.transform.a, merged.transform.e), (0.25, -0.25));
        assert_eq!(merged.get(2, 1), 10.0);
        // cell centre (1.125, 0.875) lands in fine pixel (row 1, col 1)
        assert_eq!(merged.get(0, 4), 9.0);
        assert_eq!(merged.get(3, 7), 63.0);
        assert_eq!(merged.nodata_fraction(), 0.0);
    }

    #[test]
    fn half_pixel_offset_tile_rounds_the_mosaic_width() {
        let offset = tile(1.125, 1.0, 40.0);
        let merged = merge_tiles(vec![tile(0.0, 1.0, 10.0), offset]).unwrap();
        // 2.125° / 0.25° = 8.5 columns, rounded up
        assert_eq!((merged.width, merged.height), (9, 4));
        assert_eq!(merged.transform.c, 0.0);
        assert_eq!(merged.get(0, 3), 10.0);
        assert_eq!(merged.get(0, 4), 40.0);
        assert_eq!(merged.get(0, 7), 40.0);
        // centre 2.125 sits on the offset tile's east edge
        assert!(!merged.is_valid(merged.get(0, 8)));
    }

    #[test]
    fn locate_requires_exactly_one_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("N27E086.tif"), b"").unwrap();
        fs::write(dir.path().join("N27E087_a.tif"), b"").unwrap();
        fs::write(dir.path().join("N27E087_b.tif"), b"").unwrap();
        fs::write(dir.path().join("N27E088.hgt"), b"").unwrap();

        assert!(locate_tile("N27E086", dir.path()).unwrap().ends_with("N27E086.tif"));
        assert!(matches!(
            locate_tile("N27E087", dir.path()),
            Err(ExemplarError::AmbiguousTile { .. })
        ));
        assert!(matches!(
            locate_tile("N27E088", dir.path()),
            Err(ExemplarError::TileNotFound { .. })
        ));
    }
}
