//! Resampling kernels for the warp engine.
//!
//! Source positions are continuous pixel coordinates: pixel `(row, col)`
//! covers `[col, col + 1) x [row, row + 1)`, so its centre is at
//! `(col + 0.5, row + 0.5)`.

use crate::types::{is_nodata_value, PrepError};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Available resampling kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResamplingKernel {
    Nearest,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
    Max,
    Min,
    Median,
    FirstQuartile,
    ThirdQuartile,
}

/// Accepted names, first entry per kernel is canonical
const KERNEL_NAMES: &[(&str, ResamplingKernel)] = &[
    ("nearest", ResamplingKernel::Nearest),
    ("bilinear", ResamplingKernel::Bilinear),
    ("cubic", ResamplingKernel::Cubic),
    ("cubic_spline", ResamplingKernel::CubicSpline),
    ("cubic-spline", ResamplingKernel::CubicSpline),
    ("lanczos", ResamplingKernel::Lanczos),
    ("average", ResamplingKernel::Average),
    ("mode", ResamplingKernel::Mode),
    ("max", ResamplingKernel::Max),
    ("min", ResamplingKernel::Min),
    ("med", ResamplingKernel::Median),
    ("median", ResamplingKernel::Median),
    ("q1", ResamplingKernel::FirstQuartile),
    ("first-quartile", ResamplingKernel::FirstQuartile),
    ("q3", ResamplingKernel::ThirdQuartile),
    ("third-quartile", ResamplingKernel::ThirdQuartile),
];

impl ResamplingKernel {
    pub fn name(&self) -> &'static str {
        KERNEL_NAMES
            .iter()
            .find(|(_, kernel)| kernel == self)
            .map(|(name, _)| *name)
            .unwrap_or("nearest")
    }

    /// Canonical names of every kernel
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for (name, kernel) in KERNEL_NAMES {
            if kernel.name() == *name {
                names.push(name);
            }
        }
        names
    }

    /// Kernels that summarise all source pixels under the target pixel
    pub fn is_aggregating(&self) -> bool {
        matches!(
            self,
            ResamplingKernel::Average
                | ResamplingKernel::Mode
                | ResamplingKernel::Max
                | ResamplingKernel::Min
                | ResamplingKernel::Median
                | ResamplingKernel::FirstQuartile
                | ResamplingKernel::ThirdQuartile
        )
    }

    /// Sample `src` at a point (interpolating kernels) or over a source-space
    /// window (aggregating kernels). Returns `None` when no valid source pixel
    /// contributes.
    pub fn sample(
        &self,
        src: &ArrayView2<'_, f64>,
        nodata: Option<f64>,
        point: (f64, f64),
        window: Option<&SourceWindow>,
    ) -> Option<f64> {
        let (x, y) = point;
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        match self {
            ResamplingKernel::Nearest => sample_nearest(src, nodata, x, y),
            ResamplingKernel::Bilinear => convolve(src, nodata, x, y, 1, linear_weight),
            ResamplingKernel::Cubic => convolve(src, nodata, x, y, 2, cubic_weight),
            ResamplingKernel::CubicSpline => convolve(src, nodata, x, y, 2, bspline_weight),
            ResamplingKernel::Lanczos => convolve(src, nodata, x, y, 3, lanczos_weight),
            _ => {
                let fallback;
                let window = match window {
                    Some(w) => w,
                    None => {
                        fallback = SourceWindow::around(x, y, 0.5, 0.5);
                        &fallback
                    }
                };
                self.aggregate(src, nodata, window)
            }
        }
    }

    fn aggregate(
        &self,
        src: &ArrayView2<'_, f64>,
        nodata: Option<f64>,
        window: &SourceWindow,
    ) -> Option<f64> {
        if *self == ResamplingKernel::Average {
            return window_average(src, nodata, window);
        }

        let mut values = window_values(src, nodata, window);
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        match self {
            ResamplingKernel::Min => values.first().copied(),
            ResamplingKernel::Max => values.last().copied(),
            ResamplingKernel::Median => Some(quantile(&values, 0.5)),
            ResamplingKernel::FirstQuartile => Some(quantile(&values, 0.25)),
            ResamplingKernel::ThirdQuartile => Some(quantile(&values, 0.75)),
            ResamplingKernel::Mode => Some(mode(&values)),
            _ => None,
        }
    }
}

impl std::str::FromStr for ResamplingKernel {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        KERNEL_NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, kernel)| *kernel)
            .ok_or_else(|| {
                PrepError::Config(format!(
                    "Invalid resampling method '{}', expected one of: {}",
                    s,
                    ResamplingKernel::names().join(", ")
                ))
            })
    }
}

impl std::fmt::Display for ResamplingKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Footprint of a target pixel in source pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWindow {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl SourceWindow {
    pub fn around(x: f64, y: f64, half_width: f64, half_height: f64) -> Self {
        Self {
            x_min: x - half_width,
            x_max: x + half_width,
            y_min: y - half_height,
            y_max: y + half_height,
        }
    }

    /// Bounding window of a set of corner positions
    pub fn from_corners(corners: &[(f64, f64)]) -> Option<Self> {
        if corners.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) || corners.is_empty() {
            return None;
        }
        Some(Self {
            x_min: corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min),
            x_max: corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max),
            y_min: corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min),
            y_max: corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max),
        })
    }

    /// Integer pixel range touched by the window, clamped to the source
    fn pixel_range(&self, rows: usize, cols: usize) -> Option<(usize, usize, usize, usize)> {
        let x0 = self.x_min.floor().max(0.0);
        let y0 = self.y_min.floor().max(0.0);
        // Always cover at least the pixel holding the window's lower corner
        let x1 = self.x_max.ceil().max(x0 + 1.0).min(cols as f64);
        let y1 = self.y_max.ceil().max(y0 + 1.0).min(rows as f64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as usize, x1 as usize, y0 as usize, y1 as usize))
    }
}

fn valid_at(src: &ArrayView2<'_, f64>, nodata: Option<f64>, row: isize, col: isize) -> Option<f64> {
    let (rows, cols) = src.dim();
    if row < 0 || col < 0 || row as usize >= rows || col as usize >= cols {
        return None;
    }
    let value = src[[row as usize, col as usize]];
    if value.is_nan() || is_nodata_value(value, nodata) {
        None
    } else {
        Some(value)
    }
}

fn sample_nearest(src: &ArrayView2<'_, f64>, nodata: Option<f64>, x: f64, y: f64) -> Option<f64> {
    valid_at(src, nodata, y.floor() as isize, x.floor() as isize)
}

/// Separable convolution of the taps around `(x, y)`.
///
/// Taps that are out of bounds or nodata are skipped and the remaining weights
/// renormalised.
fn convolve(
    src: &ArrayView2<'_, f64>,
    nodata: Option<f64>,
    x: f64,
    y: f64,
    radius: isize,
    weight: fn(f64) -> f64,
) -> Option<f64> {
    // Corner-based to centre-based coordinates
    let cx = x - 0.5;
    let cy = y - 0.5;
    let ix = cx.floor() as isize;
    let iy = cy.floor() as isize;
    let dx = cx - ix as f64;
    let dy = cy - iy as f64;

    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    for j in (1 - radius)..=radius {
        let wy = weight(dy - j as f64);
        if wy == 0.0 {
            continue;
        }
        for i in (1 - radius)..=radius {
            let wx = weight(dx - i as f64);
            if wx == 0.0 {
                continue;
            }
            if let Some(value) = valid_at(src, nodata, iy + j, ix + i) {
                sum += wx * wy * value;
                weight_sum += wx * wy;
            }
        }
    }

    if weight_sum.abs() < 1e-12 {
        None
    } else {
        Some(sum / weight_sum)
    }
}

fn linear_weight(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        1.0 - t
    } else {
        0.0
    }
}

/// Keys cubic convolution, a = -0.5
fn cubic_weight(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (A + 2.0) * t * t * t - (A + 3.0) * t * t + 1.0
    } else if t < 2.0 {
        A * t * t * t - 5.0 * A * t * t + 8.0 * A * t - 4.0 * A
    } else {
        0.0
    }
}

/// Cubic B-spline
fn bspline_weight(t: f64) -> f64 {
    let t = t.abs();
    if t <= 1.0 {
        (4.0 - 6.0 * t * t + 3.0 * t * t * t) / 6.0
    } else if t < 2.0 {
        let u = 2.0 - t;
        u * u * u / 6.0
    } else {
        0.0
    }
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        let px = std::f64::consts::PI * x;
        px.sin() / px
    }
}

/// Lanczos, a = 3
fn lanczos_weight(t: f64) -> f64 {
    const A: f64 = 3.0;
    let t = t.abs();
    if t < A {
        sinc(t) * sinc(t / A)
    } else {
        0.0
    }
}

/// Area-weighted mean over the window, skipping nodata
fn window_average(src: &ArrayView2<'_, f64>, nodata: Option<f64>, window: &SourceWindow) -> Option<f64> {
    let (rows, cols) = src.dim();
    let (x0, x1, y0, y1) = window.pixel_range(rows, cols)?;

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for row in y0..y1 {
        let oy = ((row + 1) as f64).min(window.y_max) - (row as f64).max(window.y_min);
        // Degenerate windows still count the pixel they sit in
        let oy = if oy > 0.0 { oy } else { 1.0 };
        for col in x0..x1 {
            let value = match valid_at(src, nodata, row as isize, col as isize) {
                Some(v) => v,
                None => continue,
            };
            let ox = ((col + 1) as f64).min(window.x_max) - (col as f64).max(window.x_min);
            let ox = if ox > 0.0 { ox } else { 1.0 };
            weighted_sum += ox * oy * value;
            total_weight += ox * oy;
        }
    }

    if total_weight > 0.0 {
        Some(weighted_sum / total_weight)
    } else {
        None
    }
}

fn window_values(src: &ArrayView2<'_, f64>, nodata: Option<f64>, window: &SourceWindow) -> Vec<f64> {
    let (rows, cols) = src.dim();
    let mut values = Vec::new();
    if let Some((x0, x1, y0, y1)) = window.pixel_range(rows, cols) {
        for row in y0..y1 {
            for col in x0..x1 {
                if let Some(v) = valid_at(src, nodata, row as isize, col as isize) {
                    values.push(v);
                }
            }
        }
    }
    values
}

/// Nearest-rank quantile of sorted values: the `ceil(q * n)`-th value
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q * sorted.len() as f64).ceil().max(1.0) as usize;
    sorted[rank.min(sorted.len()) - 1]
}

/// Most frequent value of sorted values; ties go to the smallest
fn mode(sorted: &[f64]) -> f64 {
    let mut best = sorted[0];
    let mut best_count = 0;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if j - i > best_count {
            best_count = j - i;
            best = sorted[i];
        }
        i = j;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn ramp() -> Array2<f64> {
        Array2::from_shape_fn((8, 8), |(r, c)| (r * 8 + c) as f64)
    }

    #[test]
    fn test_kernel_names_roundtrip() {
        for name in ResamplingKernel::names() {
            let kernel: ResamplingKernel = name.parse().unwrap();
            assert_eq!(kernel.name(), name);
        }
        assert_eq!(ResamplingKernel::names().len(), 12);
        assert_eq!("MED".parse::<ResamplingKernel>().unwrap(), ResamplingKernel::Median);
        for (alias, kernel) in [
            ("cubic-spline", ResamplingKernel::CubicSpline),
            ("median", ResamplingKernel::Median),
            ("first-quartile", ResamplingKernel::FirstQuartile),
            ("Third-Quartile", ResamplingKernel::ThirdQuartile),
        ] {
            assert_eq!(alias.parse::<ResamplingKernel>().unwrap(), kernel);
        }
        assert!("gauss".parse::<ResamplingKernel>().is_err());
    }

    #[test]
    fn test_weights_partition_of_unity() {
        for &d in &[0.0, 0.2, 0.5, 0.9] {
            let cubic: f64 = (-1..=2).map(|i| cubic_weight(d - i as f64)).sum();
            let spline: f64 = (-1..=2).map(|i| bspline_weight(d - i as f64)).sum();
            let linear: f64 = (0..=1).map(|i| linear_weight(d - i as f64)).sum();
            assert_relative_eq!(cubic, 1.0, epsilon = 1e-12);
            assert_relative_eq!(spline, 1.0, epsilon = 1e-12);
            assert_relative_eq!(linear, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_interpolators_exact_at_pixel_centres() {
        let src = ramp();
        let view = src.view();
        for kernel in [
            ResamplingKernel::Nearest,
            ResamplingKernel::Bilinear,
            ResamplingKernel::Cubic,
            ResamplingKernel::Lanczos,
        ] {
            let v = kernel.sample(&view, None, (3.5, 4.5), None).unwrap();
            assert_relative_eq!(v, src[[4, 3]], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        let src = array![[0.0, 10.0], [20.0, 30.0]];
        let v = ResamplingKernel::Bilinear
            .sample(&src.view(), None, (1.0, 1.0), None)
            .unwrap();
        assert_relative_eq!(v, 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bilinear_skips_nodata_taps() {
        let src = array![[0.0, -1.0], [20.0, 30.0]];
        let v = ResamplingKernel::Bilinear
            .sample(&src.view(), Some(-1.0), (1.0, 1.0), None)
            .unwrap();
        assert_relative_eq!(v, (0.0 + 20.0 + 30.0) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_bounds_is_none() {
        let src = ramp();
        assert!(ResamplingKernel::Nearest
            .sample(&src.view(), None, (-0.5, 2.0), None)
            .is_none());
        assert!(ResamplingKernel::Bilinear
            .sample(&src.view(), None, (20.0, 2.0), None)
            .is_none());
    }

    #[test]
    fn test_aggregating_kernels() {
        let src = array![
            [1.0, 2.0, 2.0, 9.0],
            [3.0, 4.0, 5.0, 9.0],
            [9.0, 9.0, 9.0, 9.0]
        ];
        let view = src.view();
        let window = SourceWindow {
            x_min: 0.0,
            x_max: 3.0,
            y_min: 0.0,
            y_max: 2.0,
        };
        let sample = |k: ResamplingKernel| k.sample(&view, None, (1.5, 1.0), Some(&window)).unwrap();
        assert_relative_eq!(sample(ResamplingKernel::Average), 17.0 / 6.0, epsilon = 1e-12);
        assert_eq!(sample(ResamplingKernel::Min), 1.0);
        assert_eq!(sample(ResamplingKernel::Max), 5.0);
        assert_eq!(sample(ResamplingKernel::Mode), 2.0);
        // sorted: 1 2 2 3 4 5, ranks ceil(q * 6)
        assert_eq!(sample(ResamplingKernel::Median), 2.0);
        assert_eq!(sample(ResamplingKernel::FirstQuartile), 2.0);
        assert_eq!(sample(ResamplingKernel::ThirdQuartile), 4.0);
    }

    #[test]
    fn test_quantile_nearest_rank() {
        let sorted = [1.0, 2.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&sorted, 0.5), 2.0);
        assert_eq!(quantile(&sorted, 0.25), 2.0);
        assert_eq!(quantile(&sorted, 0.75), 4.0);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 5.0);
        let odd = [1.0, 3.0, 7.0, 8.0, 9.0];
        assert_eq!(quantile(&odd, 0.5), 7.0);
        assert_eq!(quantile(&[4.0], 0.75), 4.0);
    }

    #[test]
    fn test_average_partial_pixel_weights() {
        let src = array![[0.0, 10.0]];
        let window = SourceWindow {
            x_min: 0.5,
            x_max: 2.0,
            y_min: 0.0,
            y_max: 1.0,
        };
        let v = ResamplingKernel::Average
            .sample(&src.view(), None, (1.25, 0.5), Some(&window))
            .unwrap();
        // weights 0.5 and 1.0
        assert_relative_eq!(v, 10.0 / 1.5, epsilon = 1e-12);
    }
}
