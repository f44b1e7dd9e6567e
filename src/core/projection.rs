use crate::types::{Crs, PrepError, PrepResult};
use gdal::spatial_ref::{CoordTransform, SpatialRef};

/// Point transformation between two coordinate reference systems.
///
/// Both sides use traditional GIS axis order (x/easting/longitude first), so
/// geographic coordinates always travel as (longitude, latitude). Identical CRS
/// definitions short-circuit to the identity without touching PROJ.
pub struct CoordinateTransformer {
    inner: Option<CoordTransform>,
}

impl CoordinateTransformer {
    pub fn new(source: &Crs, target: &Crs) -> PrepResult<Self> {
        let inner = if source == target {
            None
        } else {
            let source_srs = Self::gis_ordered(source)?;
            let target_srs = Self::gis_ordered(target)?;
            Some(CoordTransform::new(&source_srs, &target_srs)?)
        };

        log::debug!(
            "Coordinate transform {} -> {} ({})",
            source,
            target,
            if inner.is_none() { "identity" } else { "PROJ" }
        );

        Ok(Self { inner })
    }

    /// Transformer from `crs` to geographic WGS84 longitude/latitude
    pub fn to_wgs84(crs: &Crs) -> PrepResult<Self> {
        Self::new(crs, &Crs::wgs84())
    }

    /// Transformer from geographic WGS84 longitude/latitude to `crs`
    pub fn from_wgs84(crs: &Crs) -> PrepResult<Self> {
        Self::new(&Crs::wgs84(), crs)
    }

    fn gis_ordered(crs: &Crs) -> PrepResult<SpatialRef> {
        let mut srs = crs.to_spatial_ref()?;
        srs.set_axis_mapping_strategy(
            gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER,
        );
        Ok(srs)
    }

    pub fn is_identity(&self) -> bool {
        self.inner.is_none()
    }

    /// Transform coordinates in place; fails if any point fails
    pub fn transform_points(&self, xs: &mut [f64], ys: &mut [f64]) -> PrepResult<()> {
        if xs.len() != ys.len() {
            return Err(PrepError::Geometry(format!(
                "Coordinate arrays differ in length ({} vs {})",
                xs.len(),
                ys.len()
            )));
        }
        let transform = match &self.inner {
            Some(t) => t,
            None => return Ok(()),
        };
        if xs.is_empty() {
            return Ok(());
        }
        let mut zs = vec![0.0; xs.len()];
        transform.transform_coords(xs, ys, &mut zs)?;
        Ok(())
    }

    /// Transform coordinates in place, marking points that cannot be
    /// transformed as NaN instead of failing the whole batch.
    ///
    /// Returns the number of failed points.
    pub fn transform_points_lossy(&self, xs: &mut [f64], ys: &mut [f64]) -> PrepResult<usize> {
        let original_x = xs.to_vec();
        let original_y = ys.to_vec();
        if self.transform_points(xs, ys).is_ok() {
            return Ok(0);
        }

        let mut failed = 0;
        for i in 0..xs.len() {
            let mut x = [original_x[i]];
            let mut y = [original_y[i]];
            match self.transform_points(&mut x, &mut y) {
                Ok(()) if x[0].is_finite() && y[0].is_finite() => {
                    xs[i] = x[0];
                    ys[i] = y[0];
                }
                _ => {
                    xs[i] = f64::NAN;
                    ys[i] = f64::NAN;
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            log::debug!("{} of {} points could not be transformed", failed, xs.len());
        }
        Ok(failed)
    }

    pub fn transform_point(&self, x: f64, y: f64) -> PrepResult<(f64, f64)> {
        let mut xs = [x];
        let mut ys = [y];
        self.transform_points(&mut xs, &mut ys)?;
        Ok((xs[0], ys[0]))
    }
}

/// CRS of a GDAL spatial reference, as `EPSG:<code>` when an EPSG authority
/// code is attached and as WKT otherwise
pub fn crs_from_spatial_ref(srs: &SpatialRef) -> PrepResult<Crs> {
    match (srs.auth_name(), srs.auth_code()) {
        (Ok(name), Ok(code)) if name.eq_ignore_ascii_case("EPSG") && code > 0 => {
            Ok(Crs::from_epsg(code as u32))
        }
        _ => Ok(Crs::new(srs.to_wkt()?)),
    }
}
