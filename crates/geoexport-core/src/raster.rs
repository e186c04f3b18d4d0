use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GeoExportError, Result};
use crate::geometry::{BBox, Geometry, LatLon};

/// NaN marks a masked / no-data sample. serde_json writes non-finite floats
/// as `null`, so reading maps `null` back to NaN.
fn null_as_nan_vec<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<f32>, D::Error> {
    let v: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f32::NAN)).collect())
}

/// One named channel of a raster, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    #[serde(deserialize_with = "null_as_nan_vec")]
    pub data: Vec<f32>,
}

/// A multi-band raster on a regular lon/lat grid.
/// Row 0 is the southernmost row (S→N); pixel (r, c) covers the cell
/// `[min_lon + c·dx, min_lon + (c+1)·dx] × [min_lat + r·dy, min_lat + (r+1)·dy]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    pub bands: Vec<Band>,
    pub width: usize,
    pub height: usize,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Raster {
    /// Create a raster with the given band names, every sample set to `fill`.
    pub fn new(width: usize, height: usize, bounds: BBox, band_names: &[&str], fill: f32) -> Self {
        Self {
            bands: band_names
                .iter()
                .map(|n| Band { name: n.to_string(), data: vec![fill; width * height] })
                .collect(),
            width,
            height,
            min_lon: bounds.min_lon,
            max_lon: bounds.max_lon,
            min_lat: bounds.min_lat,
            max_lat: bounds.max_lat,
        }
    }

    /// Single-band raster from existing row-major data.
    pub fn from_band(name: &str, width: usize, height: usize, bounds: BBox, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(GeoExportError::GridMismatch(format!(
                "band '{name}' has {} samples, expected {}×{}",
                data.len(),
                width,
                height
            )));
        }
        let mut r = Self::new(width, height, bounds, &[], 0.0);
        r.bands.push(Band { name: name.to_string(), data });
        Ok(r)
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }

    /// Pixel size in degrees, (dx, dy).
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            (self.max_lon - self.min_lon) / self.width.max(1) as f64,
            (self.max_lat - self.min_lat) / self.height.max(1) as f64,
        )
    }

    pub fn pixel_center(&self, row: usize, col: usize) -> LatLon {
        let (dx, dy) = self.pixel_size();
        LatLon::new(self.min_lat + (row as f64 + 0.5) * dy, self.min_lon + (col as f64 + 0.5) * dx)
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        self.bands[band].data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, band: usize, row: usize, col: usize, val: f32) {
        self.bands[band].data[row * self.width + col] = val;
    }

    /// True when both rasters share dimensions and bounds.
    pub fn same_grid(&self, other: &Raster) -> bool {
        const EPS: f64 = 1e-9;
        self.width == other.width
            && self.height == other.height
            && (self.min_lon - other.min_lon).abs() < EPS
            && (self.max_lon - other.max_lon).abs() < EPS
            && (self.min_lat - other.min_lat).abs() < EPS
            && (self.max_lat - other.max_lat).abs() < EPS
    }

    /// Keep only the named bands, in the requested order.
    pub fn select(&self, names: &[String], source_id: &str) -> Result<Raster> {
        let bands = names
            .iter()
            .map(|n| {
                self.band(n).cloned().ok_or_else(|| GeoExportError::UnknownBand {
                    source_id: source_id.to_string(),
                    band: n.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Raster { bands, ..self.empty_like() })
    }

    /// Same grid, no bands.
    pub fn empty_like(&self) -> Raster {
        Raster {
            bands: Vec::new(),
            width: self.width,
            height: self.height,
            min_lon: self.min_lon,
            max_lon: self.max_lon,
            min_lat: self.min_lat,
            max_lat: self.max_lat,
        }
    }

    /// The sub-grid of whole cells covering `bbox`, or `None` when the two
    /// do not overlap.
    pub fn crop(&self, bbox: &BBox) -> Option<Raster> {
        const EPS: f64 = 1e-9;
        let (dx, dy) = self.pixel_size();
        let span = |lo: f64, hi: f64, origin: f64, step: f64, n: usize| {
            let first = (((lo - origin) / step + EPS).floor().max(0.0) as usize).min(n);
            let last = (((hi - origin) / step - EPS).ceil().max(0.0) as usize).min(n);
            (first < last).then_some((first, last))
        };
        let (c0, c1) = span(bbox.min_lon, bbox.max_lon, self.min_lon, dx, self.width)?;
        let (r0, r1) = span(bbox.min_lat, bbox.max_lat, self.min_lat, dy, self.height)?;
        let width = c1 - c0;
        let bands = self
            .bands
            .iter()
            .map(|b| Band {
                name: b.name.clone(),
                data: (r0..r1).flat_map(|r| b.data[r * self.width + c0..r * self.width + c1].iter().copied()).collect(),
            })
            .collect();
        Some(Raster {
            bands,
            width,
            height: r1 - r0,
            min_lon: self.min_lon + c0 as f64 * dx,
            max_lon: self.min_lon + c1 as f64 * dx,
            min_lat: self.min_lat + r0 as f64 * dy,
            max_lat: self.min_lat + r1 as f64 * dy,
        })
    }

    /// Unset every pixel whose centre falls outside `geom`.
    pub fn clip(&mut self, geom: &Geometry) {
        let gb = geom.bbox();
        for r in 0..self.height {
            for c in 0..self.width {
                let p = self.pixel_center(r, c);
                if !gb.contains(p) || !geom.contains(p) {
                    for band in &mut self.bands {
                        band.data[r * self.width + c] = f32::NAN;
                    }
                }
            }
        }
    }

    /// Apply `f` to every valid sample of every band; NaN stays NaN.
    pub fn map_values(&mut self, f: impl Fn(f32) -> f32) {
        for band in &mut self.bands {
            for v in band.data.iter_mut().filter(|v| !v.is_nan()) {
                *v = f(*v);
            }
        }
    }

    /// Number of pixels with at least one valid band.
    pub fn valid_pixels(&self) -> usize {
        (0..self.width * self.height)
            .filter(|&i| self.bands.iter().any(|b| !b.data[i].is_nan()))
            .count()
    }
}
