use crate::core::projection::CoordinateTransformer;
use crate::core::resample::{ResamplingKernel, SourceWindow};
use crate::types::{GeoGrid, GridTemplate, PixelType, PrepError, PrepResult};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Sentinel-2 digital numbers are reflectance scaled by this factor
pub const TOA_SCALE_FACTOR: f64 = 10000.0;

/// Convert digital numbers to top-of-atmosphere reflectance.
///
/// Output is Float32; nodata pixels keep the unscaled sentinel.
pub fn to_toa_reflectance(grid: &GeoGrid) -> PrepResult<GeoGrid> {
    log::debug!("Scaling {} band(s) to TOA reflectance", grid.band_count());
    let scaled = grid.data().mapv(|v| {
        if grid.is_nodata(v) {
            v
        } else {
            v / TOA_SCALE_FACTOR
        }
    });
    grid.with_data(scaled, grid.nodata(), PixelType::Float32)
}

/// Warp configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprojectParams {
    pub kernel: ResamplingKernel,
}

impl Default for ReprojectParams {
    fn default() -> Self {
        Self {
            kernel: ResamplingKernel::Nearest,
        }
    }
}

/// Warps grids onto a target template
pub struct Reprojector {
    params: ReprojectParams,
}

/// Target pixel centres and corners expressed in source pixel coordinates
struct SourceLookup {
    centres: Array2<(f64, f64)>,
    corners: Array2<(f64, f64)>,
}

impl SourceLookup {
    fn window(&self, row: usize, col: usize) -> Option<SourceWindow> {
        SourceWindow::from_corners(&[
            self.corners[[row, col]],
            self.corners[[row, col + 1]],
            self.corners[[row + 1, col]],
            self.corners[[row + 1, col + 1]],
        ])
    }
}

impl Reprojector {
    pub fn new(params: ReprojectParams) -> Self {
        Self { params }
    }

    pub fn with_kernel(kernel: ResamplingKernel) -> Self {
        Self::new(ReprojectParams { kernel })
    }

    /// Resample every band of `source` onto `target`.
    ///
    /// Pixels with no valid source sample hold the source nodata value, or 0
    /// when the source declares none.
    pub fn reproject(&self, source: &GeoGrid, target: &GridTemplate) -> PrepResult<GeoGrid> {
        if target.rows == 0 || target.cols == 0 {
            return Err(PrepError::Processing(
                "Target template has no pixels".to_string(),
            ));
        }
        log::info!(
            "Reprojecting {}x{} -> {}x{} ({} resampling)",
            source.rows(),
            source.cols(),
            target.rows,
            target.cols,
            self.params.kernel
        );

        let lookup = self.build_lookup(source, target)?;
        let fill = source.nodata().unwrap_or(0.0);
        let kernel = self.params.kernel;

        let mut output = Array3::from_elem((source.band_count(), target.rows, target.cols), fill);
        for (band_index, mut out_band) in output.axis_iter_mut(Axis(0)).enumerate() {
            let src = source.band(band_index);
            let rows = sample_rows(kernel, &src, source.nodata(), &lookup, fill);
            for (r, row) in rows.into_iter().enumerate() {
                for (c, value) in row.into_iter().enumerate() {
                    out_band[[r, c]] = value;
                }
            }
        }

        GeoGrid::new(
            output,
            target.transform,
            target.crs.clone(),
            Some(fill),
            source.pixel_type(),
        )
    }

    /// Map target centres and corners into source pixel space
    fn build_lookup(&self, source: &GeoGrid, target: &GridTemplate) -> PrepResult<SourceLookup> {
        let transformer = CoordinateTransformer::new(&target.crs, source.crs())?;
        let inverse = source.transform().inverse()?;

        let to_source = |positions: Vec<(f64, f64)>| -> PrepResult<Vec<(f64, f64)>> {
            let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = positions
                .into_iter()
                .map(|(u, v)| target.transform.apply(u, v))
                .unzip();
            transformer.transform_points_lossy(&mut xs, &mut ys)?;
            Ok(xs
                .into_iter()
                .zip(ys)
                .map(|(x, y)| {
                    if x.is_finite() && y.is_finite() {
                        inverse.apply(x, y)
                    } else {
                        (f64::NAN, f64::NAN)
                    }
                })
                .collect())
        };

        let (rows, cols) = (target.rows, target.cols);
        let centre_positions: Vec<(f64, f64)> = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (c as f64 + 0.5, r as f64 + 0.5)))
            .collect();
        let centres = Array2::from_shape_vec((rows, cols), to_source(centre_positions)?)
            .map_err(|e| PrepError::Processing(format!("Shape error: {}", e)))?;

        let corners = if self.params.kernel.is_aggregating() {
            let corner_positions: Vec<(f64, f64)> = (0..=rows)
                .flat_map(|r| (0..=cols).map(move |c| (c as f64, r as f64)))
                .collect();
            Array2::from_shape_vec((rows + 1, cols + 1), to_source(corner_positions)?)
                .map_err(|e| PrepError::Processing(format!("Shape error: {}", e)))?
        } else {
            Array2::from_elem((0, 0), (f64::NAN, f64::NAN))
        };

        Ok(SourceLookup { centres, corners })
    }
}

fn sample_row(
    kernel: ResamplingKernel,
    src: &ArrayView2<'_, f64>,
    nodata: Option<f64>,
    lookup: &SourceLookup,
    fill: f64,
    row: usize,
) -> Vec<f64> {
    let cols = lookup.centres.ncols();
    (0..cols)
        .map(|col| {
            let window = if kernel.is_aggregating() {
                match lookup.window(row, col) {
                    Some(w) => Some(w),
                    None => return fill,
                }
            } else {
                None
            };
            kernel
                .sample(src, nodata, lookup.centres[[row, col]], window.as_ref())
                .unwrap_or(fill)
        })
        .collect()
}

#[cfg(feature = "parallel")]
fn sample_rows(
    kernel: ResamplingKernel,
    src: &ArrayView2<'_, f64>,
    nodata: Option<f64>,
    lookup: &SourceLookup,
    fill: f64,
) -> Vec<Vec<f64>> {
    use rayon::prelude::*;

    (0..lookup.centres.nrows())
        .into_par_iter()
        .map(|row| sample_row(kernel, src, nodata, lookup, fill, row))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn sample_rows(
    kernel: ResamplingKernel,
    src: &ArrayView2<'_, f64>,
    nodata: Option<f64>,
    lookup: &SourceLookup,
    fill: f64,
) -> Vec<Vec<f64>> {
    (0..lookup.centres.nrows())
        .map(|row| sample_row(kernel, src, nodata, lookup, fill, row))
        .collect()
}

/// Stack single- or multi-band grids into one grid, in the given order.
///
/// All inputs must share transform, CRS and dimensions.
pub fn stack_bands(grids: &[GeoGrid]) -> PrepResult<GeoGrid> {
    let first = grids
        .first()
        .ok_or_else(|| PrepError::Processing("No bands to stack".to_string()))?;
    let template = first.template();

    for (i, grid) in grids.iter().enumerate().skip(1) {
        if grid.template() != template {
            return Err(PrepError::Processing(format!(
                "Band {} does not share the grid of the first band ({}x{} vs {}x{})",
                i,
                grid.rows(),
                grid.cols(),
                template.rows,
                template.cols
            )));
        }
    }

    let views: Vec<_> = grids.iter().map(|g| g.data().view()).collect();
    let stacked = ndarray::concatenate(Axis(0), &views)
        .map_err(|e| PrepError::Processing(format!("Cannot stack bands: {}", e)))?;

    log::debug!("Stacked {} band(s)", stacked.dim().0);
    first.with_data(stacked, first.nodata(), first.pixel_type())
}
