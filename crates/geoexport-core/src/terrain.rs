//! Terrain slope and percent-slope classification.
//!
//! Slope uses Horn's (1981) 3×3 weighted finite-difference gradient. Edge
//! cells replicate their nearest interior neighbour so the output covers the
//! full grid; any NaN in the 3×3 window yields NaN.
use serde::{Deserialize, Serialize};

use crate::error::{GeoExportError, Result};
use crate::raster::Raster;

/// Isotropic cellsize (metres) derived from the raster's geographic bounds.
/// Falls back to 30 m when bounds are degenerate (zero extent).
pub(crate) fn cellsize_m(r: &Raster) -> f64 {
    let lat_extent = (r.max_lat - r.min_lat).abs();
    let lon_extent = (r.max_lon - r.min_lon).abs();
    let cy = if r.height > 0 {
        lat_extent / r.height as f64 * 111_320.0
    } else {
        0.0
    };
    let mid_lat = (r.min_lat + r.max_lat) / 2.0;
    let cx = if r.width > 0 {
        lon_extent / r.width as f64 * 111_320.0 * mid_lat.to_radians().cos()
    } else {
        0.0
    };
    let avg = (cy + cx) / 2.0;
    if avg < 1e-3 { 30.0 } else { avg }
}

/// Horn (1981) weighted 3×3 gradient at cell `(r, c)` of `band`.
///
/// ```text
///   NW(-1,-1)  N(-1, 0)  NE(-1,+1)
///   W ( 0,-1)  *         E ( 0,+1)
///   SW(+1,-1)  S(+1, 0)  SE(+1,+1)
/// ```
///
/// `dz/dx = ((NE + 2E + SE) − (NW + 2W + SW)) / (8 · cellsize)`
/// `dz/dy = ((NW + 2N + NE) − (SW + 2S + SE)) / (8 · cellsize)`
///
/// Neighbour indices are clamped to the grid.
fn horn_gradient(r: &Raster, band: usize, row: usize, col: usize, cellsize: f64) -> (f64, f64) {
    let at = |dr: isize, dc: isize| -> f64 {
        let rr = (row as isize + dr).clamp(0, r.height as isize - 1) as usize;
        let cc = (col as isize + dc).clamp(0, r.width as isize - 1) as usize;
        r.get(band, rr, cc) as f64
    };
    let nw = at(-1, -1);
    let n  = at(-1,  0);
    let ne = at(-1,  1);
    let w  = at( 0, -1);
    let e  = at( 0,  1);
    let sw = at( 1, -1);
    let s  = at( 1,  0);
    let se = at( 1,  1);

    let dz_dx = ((ne + 2.0 * e + se) - (nw + 2.0 * w + sw)) / (8.0 * cellsize);
    let dz_dy = ((nw + 2.0 * n + ne) - (sw + 2.0 * s + se)) / (8.0 * cellsize);
    (dz_dx, dz_dy)
}

/// Slope in degrees of the first band of `dem`, as a single `slope` band.
pub fn slope_degrees(dem: &Raster) -> Result<Raster> {
    if dem.bands.is_empty() || dem.width == 0 || dem.height == 0 {
        return Err(GeoExportError::EmptyInput("elevation raster has no data".into()));
    }
    let cellsize = cellsize_m(dem);
    let mut data = Vec::with_capacity(dem.width * dem.height);
    for row in 0..dem.height {
        for col in 0..dem.width {
            let (dz_dx, dz_dy) = horn_gradient(dem, 0, row, col, cellsize);
            let slope_rad = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan();
            data.push(slope_rad.to_degrees() as f32);
        }
    }
    Raster::from_band("slope", dem.width, dem.height, dem.bbox(), data)
}

/// Percent slope: `tan(degrees) · 100`.
#[inline]
pub fn percent_slope(deg: f32) -> f32 {
    (deg as f64).to_radians().tan() as f32 * 100.0
}

/// Ordered upper bounds (percent slope) of every class but the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeThresholds(pub Vec<f32>);

impl Default for SlopeThresholds {
    fn default() -> Self {
        Self(vec![5.0, 10.0, 15.0, 20.0, 30.0])
    }
}

impl SlopeThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(GeoExportError::InvalidConfig("slope thresholds are empty".into()));
        }
        if self.0.windows(2).any(|w| w[0] >= w[1]) || self.0.iter().any(|t| !t.is_finite()) {
            return Err(GeoExportError::InvalidConfig(format!(
                "slope thresholds must be finite and strictly increasing: {:?}",
                self.0
            )));
        }
        Ok(())
    }

    /// Number of classes produced, thresholds + 1.
    pub fn n_classes(&self) -> u8 {
        self.0.len() as u8 + 1
    }

    /// Class of percent slope `v`: the first class whose upper bound is ≥ v,
    /// else the last class. Boundary values fall in the lower class.
    /// NaN maps to 0 (no data).
    pub fn classify(&self, v: f32) -> u8 {
        if v.is_nan() {
            return 0;
        }
        self.0
            .iter()
            .position(|&t| v <= t)
            .map(|i| i as u8 + 1)
            .unwrap_or_else(|| self.n_classes())
    }

    /// Human-readable class ranges, e.g. `"2 = 5–10%"`.
    pub fn legend(&self) -> Vec<String> {
        let mut lo = 0.0f32;
        let mut out = Vec::with_capacity(self.0.len() + 1);
        for (i, &t) in self.0.iter().enumerate() {
            out.push(format!("{} = {}–{}%", i + 1, lo, t));
            lo = t;
        }
        out.push(format!("{} = >{}%", self.n_classes(), lo));
        out
    }
}

/// Classify a slope-in-degrees raster into percent-slope classes.
/// The result is a single `slope_class` band; no-data pixels stay NaN.
pub fn classify_slope_degrees(slope: &Raster, thresholds: &SlopeThresholds) -> Result<Raster> {
    let band = slope
        .bands
        .first()
        .ok_or_else(|| GeoExportError::EmptyInput("slope raster has no bands".into()))?;
    let data = band
        .data
        .iter()
        .map(|&d| if d.is_nan() { f32::NAN } else { thresholds.classify(percent_slope(d)) as f32 })
        .collect();
    Raster::from_band("slope_class", slope.width, slope.height, slope.bbox(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    /// Planar ramp rising eastward at `target_deg`, ~30 m pixels at the equator.
    fn make_ramp(n: usize, target_deg: f64) -> Raster {
        let pixel_deg = 30.0 / 111_320.0;
        let extent = n as f64 * pixel_deg;
        let cellsize = pixel_deg * 111_320.0;
        let rise = cellsize * target_deg.to_radians().tan();
        let data = (0..n * n).map(|i| ((i % n) as f64 * rise) as f32).collect();
        Raster::from_band("elevation", n, n, BBox::new(0.0, 0.0, extent, extent), data).unwrap()
    }

    #[test]
    fn ramp_slope_matches_target_in_interior() {
        let slope = slope_degrees(&make_ramp(16, 12.0)).unwrap();
        // cellsize averages cx and cy; at the equator they agree to ~1e-6.
        assert_relative_eq!(slope.get(0, 8, 8), 12.0, epsilon = 0.05);
    }

    #[test]
    fn flat_field_has_zero_slope() {
        let dem = Raster::new(5, 5, BBox::new(0.0, 0.0, 0.01, 0.01), &["elevation"], 1500.0);
        let slope = slope_degrees(&dem).unwrap();
        assert!(slope.bands[0].data.iter().all(|&s| s.abs() < 1e-6));
    }

    #[test]
    fn percent_slope_of_45_degrees_is_100() {
        assert_relative_eq!(percent_slope(45.0), 100.0, epsilon = 1e-3);
        assert_eq!(percent_slope(0.0), 0.0);
    }

    #[test]
    fn classify_boundaries_fall_in_lower_class() {
        let t = SlopeThresholds::default();
        assert_eq!(t.classify(0.0), 1);
        assert_eq!(t.classify(5.0), 1);
        assert_eq!(t.classify(5.0001), 2);
        assert_eq!(t.classify(10.0), 2);
        assert_eq!(t.classify(15.0), 3);
        assert_eq!(t.classify(20.0), 4);
        assert_eq!(t.classify(30.0), 5);
        assert_eq!(t.classify(30.5), 6);
        assert_eq!(t.classify(1e6), 6);
        assert_eq!(t.classify(f32::NAN), 0);
    }

    #[test]
    fn classify_is_monotonic() {
        let t = SlopeThresholds::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut values: Vec<f32> = (0..2000).map(|_| rng.gen_range(0.0..80.0)).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        for pair in values.windows(2) {
            assert!(t.classify(pair[0]) <= t.classify(pair[1]));
        }
    }

    #[test]
    fn thresholds_must_increase() {
        assert!(SlopeThresholds::default().validate().is_ok());
        assert!(SlopeThresholds(vec![5.0, 5.0]).validate().is_err());
        assert!(SlopeThresholds(vec![]).validate().is_err());
    }

    #[test]
    fn legend_lists_every_class() {
        let legend = SlopeThresholds::default().legend();
        assert_eq!(legend.len(), 6);
        assert_eq!(legend[0], "1 = 0–5%");
        assert_eq!(legend[5], "6 = >30%");
    }

    #[test]
    fn classify_slope_degrees_keeps_nodata() {
        let slope = Raster::from_band(
            "slope",
            3,
            1,
            BBox::new(0.0, 0.0, 3.0, 1.0),
            vec![1.0, f32::NAN, 40.0],
        )
        .unwrap();
        let classes = classify_slope_degrees(&slope, &SlopeThresholds::default()).unwrap();
        assert_eq!(classes.get(0, 0, 0), 1.0);
        assert!(classes.get(0, 0, 1).is_nan());
        // tan(40°)·100 ≈ 83.9% → class 6
        assert_eq!(classes.get(0, 0, 2), 6.0);
    }
}
