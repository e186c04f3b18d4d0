//! Per-pixel linear trend across a yearly stack.
#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::error::{GeoExportError, Result};

/// Ordinary least-squares slope of `y` against `x`. Returns 0 for fewer
/// than two samples or a degenerate `x`.
pub fn linear_slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let sx: f64 = x.iter().sum();
    let sy: f64 = y.iter().sum();
    let sxx: f64 = x.iter().map(|v| v * v).sum();
    let sxy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let denom = n * sxx - sx * sx;
    if denom.abs() < 1e-14 {
        return 0.0;
    }
    (n * sxy - sx * sy) / denom
}

/// Slope per unit year at every pixel of `stack` (one layer per entry of
/// `years`, all the same length). Pixels with any NaN sample are NaN.
pub fn pixel_trend(years: &[i32], stack: &[Vec<f32>]) -> Result<Vec<f32>> {
    if years.len() != stack.len() {
        return Err(GeoExportError::GridMismatch(format!(
            "{} years for {} layers",
            years.len(),
            stack.len()
        )));
    }
    let Some(first) = stack.first() else {
        return Err(GeoExportError::EmptyInput("no layers to fit a trend".into()));
    };
    let n = first.len();
    if stack.iter().any(|layer| layer.len() != n) {
        return Err(GeoExportError::GridMismatch("trend layers differ in size".into()));
    }
    // Centre x so sxx − sx² stays well-conditioned for calendar years.
    let mean = years.iter().map(|&y| y as f64).sum::<f64>() / years.len() as f64;
    let x: Vec<f64> = years.iter().map(|&y| y as f64 - mean).collect();

    let fit = |i: usize| -> f32 {
        let y: Vec<f64> = stack.iter().map(|layer| layer[i] as f64).collect();
        if y.iter().any(|v| v.is_nan()) {
            f32::NAN
        } else {
            linear_slope(&x, &y) as f32
        }
    };

    #[cfg(feature = "threading")]
    let out = (0..n).into_par_iter().map(fit).collect();
    #[cfg(not(feature = "threading"))]
    let out = (0..n).map(fit).collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_linear_slope() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = vec![1.0, 3.0, 5.0, 7.0];
        assert_relative_eq!(linear_slope(&x, &y), 2.0, epsilon = 1e-12);
        assert_eq!(linear_slope(&[1.0], &[4.0]), 0.0);
    }

    #[test]
    fn recovers_known_trend_per_pixel() {
        let years = [2018, 2019, 2020, 2021, 2022, 2023];
        let mut rng = StdRng::seed_from_u64(11);
        let slopes: Vec<f32> = (0..50).map(|_| rng.gen_range(-0.05..0.05)).collect();
        let stack: Vec<Vec<f32>> = years
            .iter()
            .map(|&yr| slopes.iter().map(|s| 0.5 + s * (yr - 2018) as f32).collect())
            .collect();
        let fitted = pixel_trend(&years, &stack).unwrap();
        for (f, s) in fitted.iter().zip(&slopes) {
            assert_relative_eq!(*f, *s, epsilon = 1e-5);
        }
    }

    #[test]
    fn any_nan_sample_gives_nan() {
        let stack = vec![vec![0.1, 0.2], vec![f32::NAN, 0.3], vec![0.3, 0.4]];
        let t = pixel_trend(&[2019, 2020, 2021], &stack).unwrap();
        assert!(t[0].is_nan());
        assert_relative_eq!(t[1], 0.1, epsilon = 1e-6);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        assert!(pixel_trend(&[2020], &[]).is_err());
        assert!(pixel_trend(&[], &[]).is_err());
        assert!(pixel_trend(&[2020, 2021], &[vec![0.0], vec![0.0, 1.0]]).is_err());
    }
}
