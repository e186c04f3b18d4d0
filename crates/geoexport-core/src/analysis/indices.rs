//! Per-pixel spectral indices and robust normalization.
//!
//! Every function works element-wise on equally long slices; NaN inputs
//! produce NaN outputs.
use crate::error::{GeoExportError, Result};
use crate::raster::Raster;

const EPS: f64 = 1e-6;

fn zip2(a: &[f32], b: &[f32], f: impl Fn(f64, f64) -> f64) -> Vec<f32> {
    a.iter().zip(b).map(|(&x, &y)| f(x as f64, y as f64) as f32).collect()
}

fn zip3(a: &[f32], b: &[f32], c: &[f32], f: impl Fn(f64, f64, f64) -> f64) -> Vec<f32> {
    a.iter()
        .zip(b)
        .zip(c)
        .map(|((&x, &y), &z)| f(x as f64, y as f64, z as f64) as f32)
        .collect()
}

pub fn ndvi(nir: &[f32], red: &[f32]) -> Vec<f32> {
    zip2(nir, red, |n, r| (n - r) / (n + r + EPS))
}

/// Disease-water stress index.
pub fn dswi(nir: &[f32], swir1: &[f32]) -> Vec<f32> {
    zip2(nir, swir1, |n, s| n / (s + EPS))
}

pub fn ndwi(nir: &[f32], swir1: &[f32]) -> Vec<f32> {
    zip2(nir, swir1, |n, s| (n - s) / (n + s + EPS))
}

pub fn brightness(b2: &[f32], b4: &[f32], b8: &[f32]) -> Vec<f32> {
    zip3(b2, b4, b8, |a, b, c| (a * a + b * b + c * c).sqrt() / 3.0)
}

pub fn redness(b4: &[f32], b3: &[f32], b2: &[f32]) -> Vec<f32> {
    zip3(b4, b3, b2, |r, g, b| r * r / (g * b + EPS))
}

/// Plant senescence reflectance index.
pub fn psri(b4: &[f32], b2: &[f32], b5: &[f32]) -> Vec<f32> {
    zip3(b4, b2, b5, |r, b, re| (r - b) / (re + EPS))
}

/// Percentile `p` (0..=100) of sorted values, interpolating linearly
/// between closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = p / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Clip to the 2nd..98th percentile of the valid values, then scale to
/// [0, 1]. With `invert`, high inputs map near 0.
pub fn normalize(values: &[f32], invert: bool) -> Vec<f32> {
    let mut valid: Vec<f64> = values.iter().filter(|v| !v.is_nan()).map(|&v| v as f64).collect();
    if valid.is_empty() {
        return vec![f32::NAN; values.len()];
    }
    valid.sort_by(|a, b| a.total_cmp(b));
    let lo = percentile(&valid, 2.0);
    let hi = percentile(&valid, 98.0);
    let range = hi - lo + EPS;
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                return f32::NAN;
            }
            let n = ((v as f64).clamp(lo, hi) - lo) / range;
            (if invert { 1.0 - n } else { n }) as f32
        })
        .collect()
}

/// The six composite bands, by position: B2, B3, B4, B5, B8, B11.
pub struct CompositeBands<'a> {
    pub blue: &'a [f32],
    pub green: &'a [f32],
    pub red: &'a [f32],
    pub red_edge: &'a [f32],
    pub nir: &'a [f32],
    pub swir1: &'a [f32],
}

impl<'a> CompositeBands<'a> {
    /// Band names are not trusted: GeoTIFF inputs only carry positions.
    pub fn from_raster(r: &'a Raster) -> Result<Self> {
        match r.bands.as_slice() {
            [b2, b3, b4, b5, b8, b11, ..] => Ok(Self {
                blue: &b2.data,
                green: &b3.data,
                red: &b4.data,
                red_edge: &b5.data,
                nir: &b8.data,
                swir1: &b11.data,
            }),
            bands => Err(GeoExportError::UnsupportedRaster(format!(
                "composite needs 6 bands (B2,B3,B4,B5,B8,B11), got {}",
                bands.len()
            ))),
        }
    }
}

/// Normalized indices for one year. Each is oriented so that higher means
/// more degraded, except `ndvi` which stays a greenness score.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub ndvi: Vec<f32>,
    pub dswi: Vec<f32>,
    pub ndwi: Vec<f32>,
    pub bright: Vec<f32>,
    pub redness: Vec<f32>,
    pub psri: Vec<f32>,
}

impl Snapshot {
    pub fn from_composite(r: &Raster) -> Result<Self> {
        let b = CompositeBands::from_raster(r)?;
        Ok(Self {
            ndvi: normalize(&ndvi(b.nir, b.red), false),
            dswi: normalize(&dswi(b.nir, b.swir1), false),
            ndwi: normalize(&ndwi(b.nir, b.swir1), true),
            bright: normalize(&brightness(b.blue, b.red, b.nir), false),
            redness: normalize(&redness(b.red, b.green, b.blue), false),
            psri: normalize(&psri(b.red, b.blue, b.red_edge), false),
        })
    }
}
