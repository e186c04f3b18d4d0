//! Minimal GeoTIFF support: chunky multi-band read, single-band f32/u8 write.
//!
//! Georeferencing uses ModelPixelScale + ModelTiepoint (tie at the NW corner)
//! in EPSG:4326. TIFF rows run north→south; [`Raster`] rows run south→north,
//! so rows are flipped on both paths.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::warn;

use crate::error::{GeoExportError, Result};
use crate::geometry::BBox;
use crate::raster::{Band, Raster};

/// GeoKeyDirectory: version 1.1.0 with 3 keys (model type geographic,
/// raster type pixel-is-area, geographic type WGS 84).
const GEO_KEYS_WGS84: [u16; 16] = [1, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326];

fn samples_to_f32(img: DecodingResult) -> Result<Vec<f32>> {
    #[allow(unreachable_patterns)]
    let v = match img {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return Err(GeoExportError::UnsupportedRaster("unknown sample format".into())),
    };
    Ok(v)
}

/// Read every band of a chunky (pixel-interleaved) GeoTIFF. Bands are named
/// `b1..bN` in file order; samples equal to the GDAL nodata value become NaN.
pub fn read(path: &Path) -> Result<Raster> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let (w, h) = decoder.dimensions()?;
    let (w, h) = (w as usize, h as usize);

    let samples = match decoder.find_tag(Tag::SamplesPerPixel)? {
        Some(v) => v.into_u32()? as usize,
        None => 1,
    };
    if let Some(planar) = decoder.find_tag(Tag::PlanarConfiguration)? {
        if planar.into_u32()? != 1 {
            return Err(GeoExportError::UnsupportedRaster(format!(
                "{}: planar band layout",
                path.display()
            )));
        }
    }
    let scale = decoder.find_tag(Tag::ModelPixelScaleTag)?.map(|v| v.into_f64_vec()).transpose()?;
    let tie = decoder.find_tag(Tag::ModelTiepointTag)?.map(|v| v.into_f64_vec()).transpose()?;
    let nodata = decoder
        .find_tag(Tag::GdalNodata)?
        .map(|v| v.into_string())
        .transpose()?
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse::<f32>().ok());

    let bounds = match (scale.as_deref(), tie.as_deref()) {
        (Some([sx, sy, ..]), Some([i, j, _, x, y, ..])) => {
            let min_lon = x - i * sx;
            let max_lat = y + j * sy;
            BBox::new(min_lon, max_lat - h as f64 * sy, min_lon + w as f64 * sx, max_lat)
        }
        _ => {
            warn!(path = %path.display(), "no georeferencing tags; using pixel coordinates");
            BBox::new(0.0, 0.0, w as f64, h as f64)
        }
    };

    // The decoder only understands 1, 3 or 4 interleaved samples.
    if let Err(e) = decoder.colortype() {
        return Err(GeoExportError::UnsupportedRaster(format!(
            "{}: {samples}-sample pixels ({e}); export a JSON raster instead",
            path.display()
        )));
    }
    let raw = samples_to_f32(decoder.read_image()?)?;
    if raw.len() != w * h * samples {
        return Err(GeoExportError::UnsupportedRaster(format!(
            "{}: {} samples for {w}×{h}×{samples}",
            path.display(),
            raw.len()
        )));
    }

    let mut raster = Raster::new(w, h, bounds, &[], 0.0);
    for s in 0..samples {
        let mut data = Vec::with_capacity(w * h);
        for row in (0..h).rev() {
            for col in 0..w {
                let v = raw[(row * w + col) * samples + s];
                data.push(match nodata {
                    Some(nd) if v == nd => f32::NAN,
                    _ => v,
                });
            }
        }
        raster.bands.push(Band { name: format!("b{}", s + 1), data });
    }
    Ok(raster)
}

fn single_band<'a>(raster: &'a Raster, path: &Path) -> Result<&'a Band> {
    match raster.bands.as_slice() {
        [band] => Ok(band),
        bands => Err(GeoExportError::UnsupportedRaster(format!(
            "{}: GeoTIFF output takes one band, got {}",
            path.display(),
            bands.len()
        ))),
    }
}

/// Row-major samples reordered north-up.
fn north_up<T: Copy>(raster: &Raster, data: &[T]) -> Vec<T> {
    (0..raster.height)
        .rev()
        .flat_map(|row| data[row * raster.width..(row + 1) * raster.width].iter().copied())
        .collect()
}

fn write_image<C>(path: &Path, raster: &Raster, data: &[C::Inner], nodata: &str) -> Result<()>
where
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
{
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let mut image = encoder.new_image::<C>(raster.width as u32, raster.height as u32)?;
    let (dx, dy) = raster.pixel_size();
    let dir = image.encoder();
    dir.write_tag(Tag::ModelPixelScaleTag, &[dx, dy, 0.0][..])?;
    dir.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, raster.min_lon, raster.max_lat, 0.0][..])?;
    dir.write_tag(Tag::GeoKeyDirectoryTag, &GEO_KEYS_WGS84[..])?;
    dir.write_tag(Tag::GdalNodata, nodata)?;
    image.write_data(data)?;
    Ok(())
}

/// Single-band Float32 GeoTIFF; NaN is the nodata value.
pub fn write_f32(path: &Path, raster: &Raster) -> Result<()> {
    let band = single_band(raster, path)?;
    let data = north_up(raster, &band.data);
    write_image::<colortype::Gray32Float>(path, raster, &data, "nan")
}

/// Single-band UInt8 GeoTIFF for class maps; NaN is written as class 0.
pub fn write_u8(path: &Path, raster: &Raster) -> Result<()> {
    let band = single_band(raster, path)?;
    let data: Vec<u8> = north_up(raster, &band.data)
        .into_iter()
        .map(|v| if v.is_nan() { 0 } else { v.clamp(0.0, 255.0) as u8 })
        .collect();
    write_image::<colortype::Gray8>(path, raster, &data, "0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tiff::tags::{PhotometricInterpretation, SampleFormat};

    fn ramp() -> Raster {
        // Value = row index, so orientation mistakes are visible.
        let data = (0..12).map(|i| (i / 4) as f32).collect();
        Raster::from_band("v", 4, 3, BBox::new(29.0, -2.0, 31.0, -1.4), data).unwrap()
    }

    #[test]
    fn f32_keeps_orientation_bounds_and_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.tif");
        let mut r = ramp();
        r.set(0, 2, 3, f32::NAN);
        write_f32(&path, &r).unwrap();

        let back = read(&path).unwrap();
        assert_eq!((back.width, back.height), (4, 3));
        assert_relative_eq!(back.min_lon, 29.0, epsilon = 1e-9);
        assert_relative_eq!(back.max_lat, -1.4, epsilon = 1e-9);
        assert_relative_eq!(back.min_lat, -2.0, epsilon = 1e-9);
        assert_eq!(back.get(0, 0, 0), 0.0);
        assert_eq!(back.get(0, 2, 0), 2.0);
        assert!(back.get(0, 2, 3).is_nan());
    }

    #[test]
    fn u8_writes_nan_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.tif");
        let mut r = ramp();
        r.map_values(|v| v + 1.0);
        r.set(0, 1, 1, f32::NAN);
        write_u8(&path, &r).unwrap();

        let back = read(&path).unwrap();
        // 0 is the declared nodata, so it comes back as NaN.
        assert!(back.get(0, 1, 1).is_nan());
        assert_eq!(back.get(0, 2, 2), 3.0);
    }

    /// Six interleaved Float32 samples, the layout of an optical composite.
    struct SixBand;
    impl colortype::ColorType for SixBand {
        type Inner = f32;
        const TIFF_VALUE: PhotometricInterpretation = PhotometricInterpretation::BlackIsZero;
        const BITS_PER_SAMPLE: &'static [u16] = &[32; 6];
        const SAMPLE_FORMAT: &'static [SampleFormat] = &[SampleFormat::IEEEFP; 6];
    }

    #[test]
    fn chunky_bands_are_split_and_flipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        // 2×2 north-up, sample s of pixel p is 10·s + p.
        let data: Vec<f32> = (0..4).flat_map(|p| (0..3).map(move |s| (10 * s + p) as f32)).collect();
        let file = File::create(&path).unwrap();
        TiffEncoder::new(file).unwrap().write_image::<colortype::RGB32Float>(2, 2, &data).unwrap();

        let r = read(&path).unwrap();
        assert_eq!(r.band_names(), vec!["b1", "b2", "b3"]);
        // Row 0 is the southern (last written) row.
        assert_eq!(r.bands[0].data, vec![2.0, 3.0, 0.0, 1.0]);
        assert_eq!(r.bands[2].data, vec![22.0, 23.0, 20.0, 21.0]);
    }

    #[test]
    fn unsupported_sample_counts_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("six.tif");
        let file = File::create(&path).unwrap();
        TiffEncoder::new(file).unwrap().write_image::<SixBand>(1, 1, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
        assert!(matches!(read(&path), Err(GeoExportError::UnsupportedRaster(m)) if m.contains("6-sample")));
    }

    #[test]
    fn multi_band_write_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let r = Raster::new(2, 2, BBox::new(0.0, 0.0, 1.0, 1.0), &["a", "b"], 0.0);
        assert!(matches!(
            write_f32(&dir.path().join("x.tif"), &r),
            Err(GeoExportError::UnsupportedRaster(_))
        ));
    }
}
