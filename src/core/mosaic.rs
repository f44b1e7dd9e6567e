use crate::types::{GeoGrid, GeoTransform, PrepError, PrepResult};
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

/// How overlapping inputs are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Earlier inputs win
    First,
    /// Later inputs overwrite earlier ones
    Last,
}

impl std::str::FromStr for MergeStrategy {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(MergeStrategy::First),
            "last" => Ok(MergeStrategy::Last),
            _ => Err(PrepError::Config(format!(
                "Invalid merge strategy '{}', expected 'first' or 'last'",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MosaicParams {
    /// Value written where no input contributes
    pub nodata: f64,
    pub strategy: MergeStrategy,
}

impl Default for MosaicParams {
    fn default() -> Self {
        Self {
            nodata: 0.0,
            strategy: MergeStrategy::Last,
        }
    }
}

/// Merges north-up grids sharing a CRS and band count into one grid that spans
/// their union at the finest input resolution
pub struct MosaicCompositor {
    params: MosaicParams,
}

/// Number of pixels needed to span `length`, tolerating float noise
fn pixel_count(length: f64, resolution: f64) -> usize {
    let n = length / resolution;
    let rounded = n.round();
    if (n - rounded).abs() < 1e-6 {
        rounded.max(1.0) as usize
    } else {
        n.ceil().max(1.0) as usize
    }
}

impl MosaicCompositor {
    pub fn new(params: MosaicParams) -> Self {
        Self { params }
    }

    fn validate(&self, grids: &[GeoGrid]) -> PrepResult<()> {
        let first = grids
            .first()
            .ok_or_else(|| PrepError::Processing("No grids to merge".to_string()))?;

        for (i, grid) in grids.iter().enumerate() {
            let gt = grid.transform();
            if !gt.is_north_up() || gt.pixel_width <= 0.0 || gt.pixel_height >= 0.0 {
                return Err(PrepError::Processing(format!(
                    "Mosaic input {} is not north-up",
                    i
                )));
            }
            if grid.crs() != first.crs() {
                return Err(PrepError::Processing(format!(
                    "Mosaic input {} has CRS {} but the first input has {}",
                    i,
                    grid.crs(),
                    first.crs()
                )));
            }
            if grid.band_count() != first.band_count() {
                return Err(PrepError::Processing(format!(
                    "Mosaic input {} has {} band(s), expected {}",
                    i,
                    grid.band_count(),
                    first.band_count()
                )));
            }
        }
        Ok(())
    }

    pub fn merge(&self, grids: &[GeoGrid]) -> PrepResult<GeoGrid> {
        self.validate(grids)?;
        let first = &grids[0];

        let extent = grids
            .iter()
            .skip(1)
            .fold(first.extent(), |acc, g| acc.union(&g.extent()));
        let res_x = grids
            .iter()
            .map(|g| g.transform().pixel_width)
            .fold(f64::INFINITY, f64::min);
        let res_y = grids
            .iter()
            .map(|g| g.transform().pixel_height.abs())
            .fold(f64::INFINITY, f64::min);

        let cols = pixel_count(extent.width(), res_x);
        let rows = pixel_count(extent.height(), res_y);
        let transform = GeoTransform::north_up(extent.min_x, extent.max_y, res_x, -res_y);
        let bands = first.band_count();

        log::info!(
            "Merging {} grid(s) into {}x{}x{} mosaic",
            grids.len(),
            bands,
            rows,
            cols
        );

        let mut output = Array3::from_elem((bands, rows, cols), self.params.nodata);
        let mut written = Array3::from_elem((bands, rows, cols), false);

        for grid in grids {
            self.place(grid, &transform, &mut output, &mut written)?;
        }

        GeoGrid::new(
            output,
            transform,
            first.crs().clone(),
            Some(self.params.nodata),
            first.pixel_type(),
        )
    }

    /// Copy the valid pixels of `grid` into the output, nearest-neighbour on
    /// output pixel centres
    fn place(
        &self,
        grid: &GeoGrid,
        out_transform: &GeoTransform,
        output: &mut Array3<f64>,
        written: &mut Array3<bool>,
    ) -> PrepResult<()> {
        let (_, rows, cols) = output.dim();
        let out_inverse = out_transform.inverse()?;
        let in_inverse = grid.transform().inverse()?;
        let extent = grid.extent();

        // Output window touched by this input
        let (c0, r0) = out_inverse.apply(extent.min_x, extent.max_y);
        let (c1, r1) = out_inverse.apply(extent.max_x, extent.min_y);
        let c0 = c0.floor().max(0.0) as usize;
        let r0 = r0.floor().max(0.0) as usize;
        let c1 = (c1.ceil().max(0.0) as usize).min(cols);
        let r1 = (r1.ceil().max(0.0) as usize).min(rows);

        for band in 0..grid.band_count() {
            let src = grid.band(band);
            let mut out_band = output.index_axis_mut(Axis(0), band);
            let mut done = written.index_axis_mut(Axis(0), band);

            for row in r0..r1 {
                for col in c0..c1 {
                    if self.params.strategy == MergeStrategy::First && done[[row, col]] {
                        continue;
                    }
                    let (x, y) = out_transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                    let (sc, sr) = in_inverse.apply(x, y);
                    if sc < 0.0 || sr < 0.0 {
                        continue;
                    }
                    let (sc, sr) = (sc.floor() as usize, sr.floor() as usize);
                    if sc >= grid.cols() || sr >= grid.rows() {
                        continue;
                    }
                    let value = src[[sr, sc]];
                    if value.is_nan() || grid.is_nodata(value) {
                        continue;
                    }
                    out_band[[row, col]] = value;
                    done[[row, col]] = true;
                }
            }
        }
        Ok(())
    }
}

impl Default for MosaicCompositor {
    fn default() -> Self {
        Self::new(MosaicParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Crs, PixelType};
    use ndarray::Array2;

    fn tile(x0: f64, y0: f64, size: usize, res: f64, value: f64) -> GeoGrid {
        GeoGrid::single_band(
            Array2::from_elem((size, size), value),
            GeoTransform::north_up(x0, y0, res, -res),
            Crs::from_epsg(32633),
            Some(0.0),
            PixelType::Float32,
        )
        .unwrap()
    }

    #[test]
    fn test_pixel_count_tolerates_noise() {
        assert_eq!(pixel_count(100.0000000001, 10.0), 10);
        assert_eq!(pixel_count(101.0, 10.0), 11);
        assert_eq!(pixel_count(0.0, 10.0), 1);
    }

    #[test]
    fn test_disjoint_inputs_keep_values_and_gap_is_nodata() {
        // Two 4x4 tiles with a 2-pixel gap between them
        let west = tile(0.0, 40.0, 4, 10.0, 1.0);
        let east = tile(60.0, 40.0, 4, 10.0, 2.0);
        let merged = MosaicCompositor::default().merge(&[west, east]).unwrap();

        assert_eq!(merged.cols(), 10);
        assert_eq!(merged.rows(), 4);
        let band = merged.band(0);
        for row in 0..4 {
            for col in 0..4 {
                assert_eq!(band[[row, col]], 1.0);
            }
            assert_eq!(band[[row, 4]], 0.0);
            assert_eq!(band[[row, 5]], 0.0);
            for col in 6..10 {
                assert_eq!(band[[row, col]], 2.0);
            }
        }
        assert_eq!(merged.nodata(), Some(0.0));
    }

    #[test]
    fn test_overlap_strategy() {
        let a = tile(0.0, 40.0, 4, 10.0, 1.0);
        let b = tile(20.0, 40.0, 4, 10.0, 2.0);

        let last = MosaicCompositor::default().merge(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(last.band(0)[[0, 2]], 2.0);

        let first = MosaicCompositor::new(MosaicParams {
            nodata: 0.0,
            strategy: MergeStrategy::First,
        })
        .merge(&[a, b])
        .unwrap();
        assert_eq!(first.band(0)[[0, 2]], 1.0);
        assert_eq!(first.band(0)[[0, 5]], 2.0);
    }

    #[test]
    fn test_nodata_never_overwrites() {
        let a = tile(0.0, 20.0, 2, 10.0, 1.0);
        let b = tile(0.0, 20.0, 2, 10.0, 0.0);
        let merged = MosaicCompositor::default().merge(&[a, b]).unwrap();
        assert!(merged.band(0).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_finest_resolution_and_validation() {
        let coarse = tile(0.0, 40.0, 2, 20.0, 3.0);
        let fine = tile(40.0, 40.0, 4, 10.0, 4.0);
        let merged = MosaicCompositor::default().merge(&[coarse, fine.clone()]).unwrap();
        assert_eq!(merged.transform().pixel_width, 10.0);
        assert_eq!(merged.cols(), 8);
        assert_eq!(merged.band(0)[[3, 3]], 3.0);

        let other_crs = GeoGrid::single_band(
            Array2::from_elem((2, 2), 1.0),
            GeoTransform::north_up(0.0, 40.0, 10.0, -10.0),
            Crs::from_epsg(32634),
            None,
            PixelType::Float32,
        )
        .unwrap();
        assert!(MosaicCompositor::default().merge(&[fine, other_crs]).is_err());
        assert!(MosaicCompositor::default().merge(&[]).is_err());
    }
}
