//! Single-band GeoTIFF reading and writing on top of the pure-Rust `tiff` crate.
//!
//! Only geographic rasters are supported. Georeferencing is read from
//! `ModelPixelScale` + `ModelTiepoint` (or `ModelTransformation`), nodata from
//! the GDAL nodata ASCII tag. Written patches carry EPSG:4326 geokeys.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::compression::{Compression, Deflate, Lzw};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::TiffResult;

use crate::error::{ExemplarError, Result};
use crate::geo::Affine;
use crate::raster::RasterWindow;

// GeoTIFF tag ids (not all tiff releases name them)
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// GeoKeys
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const EPSG_WGS84: u16 = 4326;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Decode a GeoTIFF into memory. Multi-band files keep band 1 only.
pub fn read_geotiff(path: &Path) -> Result<RasterWindow> {
    let file = File::open(path).map_err(|e| ExemplarError::io(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| ExemplarError::tiff(path, e))?
        .with_limits(Limits::unlimited());

    let (w, h) = decoder.dimensions().map_err(|e| ExemplarError::tiff(path, e))?;
    let (width, height) = (w as usize, h as usize);
    if width == 0 || height == 0 {
        return Err(ExemplarError::Geometry(format!(
            "{} has zero dimensions",
            path.display()
        )));
    }

    let transform = read_transform(&mut decoder)
        .map_err(|e| ExemplarError::tiff(path, e))?
        .ok_or_else(|| ExemplarError::Tiff {
            path: path.to_path_buf(),
            message: "missing GeoTIFF georeferencing tags".to_string(),
        })?;
    let nodata = read_nodata(&mut decoder).map_err(|e| ExemplarError::tiff(path, e))?;

    let image = decoder.read_image().map_err(|e| ExemplarError::tiff(path, e))?;
    let samples = decoded_to_f32(image).ok_or_else(|| ExemplarError::Tiff {
        path: path.to_path_buf(),
        message: "unsupported sample type".to_string(),
    })?;

    let pixels = width * height;
    let data = if samples.len() == pixels {
        samples
    } else if pixels > 0 && samples.len() % pixels == 0 {
        let bands = samples.len() / pixels;
        samples.into_iter().step_by(bands).collect()
    } else {
        return Err(ExemplarError::Tiff {
            path: path.to_path_buf(),
            message: format!("decoded {} samples for {width}×{height}", samples.len()),
        });
    };

    RasterWindow::from_data(data, width, height, transform, nodata)
}

fn decoded_to_f32(image: DecodingResult) -> Option<Vec<f32>> {
    let out = match image {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return None,
    };
    Some(out)
}

fn find_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> TiffResult<Option<Vec<f64>>> {
    decoder
        .find_tag(tag(code))?
        .map(|v| v.into_f64_vec())
        .transpose()
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<Option<Affine>> {
    let mut transform = if let Some(m) = find_f64_vec(decoder, MODEL_TRANSFORMATION)?.filter(|m| m.len() >= 8) {
        Affine::new(m[0], m[1], m[3], m[4], m[5], m[7])
    } else {
        let scale = find_f64_vec(decoder, MODEL_PIXEL_SCALE)?;
        let tie = find_f64_vec(decoder, MODEL_TIEPOINT)?;
        match (scale, tie) {
            (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
                let (sx, sy) = (s[0], s[1]);
                let (i, j, x, y) = (t[0], t[1], t[3], t[4]);
                Affine::new(sx, 0.0, x - i * sx, 0.0, -sy, y + j * sy)
            }
            _ => return Ok(None),
        }
    };

    // PixelIsPoint ties refer to pixel centres; shift to the corner convention.
    if raster_type(decoder)? == Some(RASTER_PIXEL_IS_POINT) {
        transform = transform.translated(-0.5, -0.5);
    }
    Ok(Some(transform))
}

fn raster_type<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<Option<u16>> {
    let Some(keys) = decoder.find_tag(tag(GEO_KEY_DIRECTORY))? else {
        return Ok(None);
    };
    let keys = keys.into_u16_vec()?;
    // Header is 4 shorts, followed by (id, location, count, value) quads.
    Ok(keys
        .get(4..)
        .unwrap_or(&[])
        .chunks_exact(4)
        .find(|k| k[0] == GT_RASTER_TYPE_GEO_KEY && k[1] == 0)
        .map(|k| k[3]))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<Option<f32>> {
    let Some(value) = decoder.find_tag(tag(GDAL_NODATA))? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let parsed = text
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse::<f64>()
        .ok()
        .map(|v| v as f32)
        .filter(|v| !v.is_nan());
    Ok(parsed)
}

/// Strip compression for written GeoTIFFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    /// zlib deflate; used for extracted patches.
    #[default]
    Deflate,
    /// Used for the exported library copies.
    Lzw,
}

/// Write `raster` as a deflate-compressed single-band f32 GeoTIFF, creating
/// parent directories.
pub fn write_geotiff(path: &Path, raster: &RasterWindow) -> Result<()> {
    write_geotiff_compressed(path, raster, TiffCompression::Deflate)
}

pub fn write_geotiff_compressed(path: &Path, raster: &RasterWindow, compression: TiffCompression) -> Result<()> {
    if raster.width == 0 || raster.height == 0 {
        return Err(ExemplarError::Geometry(format!(
            "refusing to write empty raster to {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ExemplarError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| ExemplarError::io(path, e))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| ExemplarError::tiff(path, e))?;
    match compression {
        TiffCompression::Deflate => encode(&mut encoder, raster, Deflate::default()),
        TiffCompression::Lzw => encode(&mut encoder, raster, Lzw),
    }
    .map_err(|e| ExemplarError::tiff(path, e))
}

fn encode<W: Write + Seek, D: Compression>(
    encoder: &mut TiffEncoder<W>,
    raster: &RasterWindow,
    compression: D,
) -> TiffResult<()> {
    let mut image =
        encoder.new_image_with_compression::<Gray32Float, D>(raster.width as u32, raster.height as u32, compression)?;
    write_geo_tags(image.encoder(), raster)?;
    image.write_data(&raster.data)
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    raster: &RasterWindow,
) -> TiffResult<()> {
    let t = raster.transform;
    if t.b == 0.0 && t.d == 0.0 {
        let scale = [t.a, -t.e, 0.0];
        dir.write_tag(tag(MODEL_PIXEL_SCALE), scale.as_slice())?;
        let tiepoint = [0.0, 0.0, 0.0, t.c, t.f, 0.0];
        dir.write_tag(tag(MODEL_TIEPOINT), tiepoint.as_slice())?;
    } else {
        let matrix = [
            t.a, t.b, 0.0, t.c, //
            t.d, t.e, 0.0, t.f, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(tag(MODEL_TRANSFORMATION), matrix.as_slice())?;
    }

    let geokeys: [u16; 16] = [
        1, 1, 0, 3, //
        GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC, //
        GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA, //
        GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, EPSG_WGS84,
    ];
    dir.write_tag(tag(GEO_KEY_DIRECTORY), geokeys.as_slice())?;

    if let Some(nodata) = raster.nodata {
        let text = format!("{nodata}");
        dir.write_tag(tag(GDAL_NODATA), text.as_str())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_patch_reads_back_with_georeferencing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("patch.tif");
        let t = Affine::north_up(86.0, 28.0, 0.25, 0.5);
        let data: Vec<f32> = (0..12).map(|i| i as f32 * 10.0).collect();
        let mut raster = RasterWindow::from_data(data, 4, 3, t, Some(-32768.0)).unwrap();
        raster.set(1, 1, -32768.0);

        write_geotiff(&path, &raster).unwrap();
        let back = read_geotiff(&path).unwrap();

        assert_eq!((back.width, back.height), (4, 3));
        assert_eq!(back.transform, t);
        assert_eq!(back.nodata, Some(-32768.0));
        assert_eq!(back.get(2, 3), 110.0);
        assert!(!back.is_valid(back.get(1, 1)));
    }

    fn compression_tag(path: &Path) -> u32 {
        let mut decoder = Decoder::new(BufReader::new(File::open(path).unwrap())).unwrap();
        decoder.get_tag_u32(Tag::Compression).unwrap()
    }

    #[test]
    fn compressed_patches_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let t = Affine::north_up(-70.0, -32.0, 1.0 / 64.0, 1.0 / 64.0);
        let data: Vec<f32> = (0..64 * 48).map(|i| 2000.0 + (i % 64) as f32 * 3.5).collect();
        let raster = RasterWindow::from_data(data, 64, 48, t, Some(-9999.0)).unwrap();

        let deflated = dir.path().join("patch.tif");
        write_geotiff(&deflated, &raster).unwrap();
        assert_eq!(compression_tag(&deflated), 8);

        let lzw = dir.path().join("cog").join("patch.tif");
        write_geotiff_compressed(&lzw, &raster, TiffCompression::Lzw).unwrap();
        assert_eq!(compression_tag(&lzw), 5);

        for path in [&deflated, &lzw] {
            let back = read_geotiff(path).unwrap();
            assert_eq!((back.width, back.height), (64, 48));
            assert_eq!(back.transform, t);
            assert_eq!(back.nodata, Some(-9999.0));
            assert_eq!(back.data, raster.data);
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_geotiff(Path::new("/nonexistent/N00E000.tif")).unwrap_err();
        assert!(matches!(err, ExemplarError::Io { .. }));
    }
}
