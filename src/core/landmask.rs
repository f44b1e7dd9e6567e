//! Land masking against coastline polygons

use crate::core::footprint::Footprint;
use crate::core::geometry::{gdal_to_multipolygon, pixels_inside, transform_polygons};
use crate::core::projection::{crs_from_spatial_ref, CoordinateTransformer};
use crate::types::{Crs, GeoGrid, PixelType, PrepError, PrepResult};
use gdal::vector::LayerAccess;
use gdal::Dataset;
use geo::{BoundingRect, Intersects, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// High resolution land polygons
pub const DETAILED_LAND_FILE: &str = "land_polygons.shp";
/// Coarse GSHHS intermediate resolution shoreline
pub const COARSE_LAND_FILE: &str = "GSHHS_i_L1.shp";

/// Land polygon path inside an include directory
pub fn land_file_in(include_dir: &Path, detailed: bool) -> PathBuf {
    include_dir.join(if detailed {
        DETAILED_LAND_FILE
    } else {
        COARSE_LAND_FILE
    })
}

/// Land polygons in their native CRS
#[derive(Debug, Clone)]
pub struct LandPolygons {
    polygons: Vec<Polygon<f64>>,
    crs: Crs,
}

impl LandPolygons {
    pub fn new(polygons: Vec<Polygon<f64>>, crs: Crs) -> Self {
        Self { polygons, crs }
    }

    /// Read every polygonal feature of the first layer of a vector dataset
    pub fn from_file<P: AsRef<Path>>(path: P) -> PrepResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PrepError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Land polygon file not found: {}", path.display()),
            )));
        }
        log::info!("Loading land polygons from {}", path.display());

        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layer(0)?;

        let crs = match layer.spatial_ref() {
            Some(srs) => crs_from_spatial_ref(&srs)?,
            None => {
                log::warn!("Land polygons carry no CRS, assuming WGS84");
                Crs::wgs84()
            }
        };

        let mut polygons = Vec::new();
        let mut skipped = 0;
        for feature in layer.features() {
            let geometry = match feature.geometry() {
                Some(g) => g,
                None => continue,
            };
            match gdal_to_multipolygon(geometry) {
                Ok(multi) => polygons.extend(multi.0),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            log::debug!("Skipped {} non-polygonal land feature(s)", skipped);
        }
        log::info!("Loaded {} land polygon(s)", polygons.len());

        Ok(Self { polygons, crs })
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Polygons intersecting a geographic footprint, still in the land CRS
    pub fn intersecting(&self, footprint: &Footprint) -> PrepResult<MultiPolygon<f64>> {
        let area = MultiPolygon(vec![footprint.to_polygon()]);
        let area = transform_polygons(&area, &CoordinateTransformer::from_wgs84(&self.crs)?)?;
        let area_rect = area.bounding_rect();

        let selected: Vec<Polygon<f64>> = self
            .polygons
            .iter()
            .filter(|polygon| {
                // Cheap rectangle rejection before the exact test
                let rect_hit = match (polygon.bounding_rect(), area_rect) {
                    (Some(a), Some(b)) => a.intersects(&b),
                    _ => false,
                };
                rect_hit && polygon.intersects(&area)
            })
            .cloned()
            .collect();

        log::debug!("{} land polygon(s) intersect the footprint", selected.len());
        Ok(MultiPolygon(selected))
    }
}

/// What to do with the pixels covered by land
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LandMaskParams {
    /// Keep only land pixels instead of removing them
    pub keep_land: bool,
    /// Return a UInt16 raster with 1 where pixels are removed
    pub mask_only: bool,
}

/// Mask `grid` against land polygons.
///
/// Returns `Ok(None)` when no land polygon touches the raster footprint.
/// Removed pixels take the grid's nodata value, or 0 without one.
pub fn apply_land_mask(
    grid: &GeoGrid,
    footprint: &Footprint,
    land: &LandPolygons,
    params: &LandMaskParams,
) -> PrepResult<Option<GeoGrid>> {
    let intersecting = land.intersecting(footprint)?;
    if intersecting.0.is_empty() {
        log::info!("There are no lands within the raster");
        return Ok(None);
    }

    let to_grid = CoordinateTransformer::new(land.crs(), grid.crs())?;
    let projected = transform_polygons(&intersecting, &to_grid)?;
    let on_land = pixels_inside(grid.transform(), grid.rows(), grid.cols(), &projected)?;
    let removed = if params.keep_land {
        on_land.mapv(|inside| !inside)
    } else {
        on_land
    };
    log::info!(
        "Land mask removes {} of {} pixels",
        removed.iter().filter(|&&r| r).count(),
        removed.len()
    );

    if params.mask_only {
        let mask = removed.mapv(|r| if r { 1.0 } else { 0.0 });
        return GeoGrid::single_band(
            mask,
            *grid.transform(),
            grid.crs().clone(),
            None,
            PixelType::UInt16,
        )
        .map(Some);
    }

    let fill = grid.nodata().unwrap_or(0.0);
    let mut data = grid.data().clone();
    for mut band in data.outer_iter_mut() {
        ndarray::Zip::from(&mut band)
            .and(&removed)
            .for_each(|value, &r| {
                if r {
                    *value = fill;
                }
            });
    }
    grid.with_data(data, Some(fill), grid.pixel_type()).map(Some)
}
