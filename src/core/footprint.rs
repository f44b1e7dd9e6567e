use crate::core::projection::CoordinateTransformer;
use crate::types::{BoundingBox, GeoGrid, PrepError, PrepResult};
use geo::{LineString, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Footprint extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintParams {
    /// Keep every n-th border pixel
    pub stride: usize,
}

impl Default for FootprintParams {
    fn default() -> Self {
        Self { stride: 100 }
    }
}

/// Closed lon/lat outline of a raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    vertices: Vec<(f64, f64)>,
}

impl Footprint {
    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    pub fn is_closed(&self) -> bool {
        match (self.vertices.first(), self.vertices.last()) {
            (Some(first), Some(last)) => self.vertices.len() > 1 && first == last,
            _ => false,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for &(lon, lat) in &self.vertices {
            bbox.min_lon = bbox.min_lon.min(lon);
            bbox.max_lon = bbox.max_lon.max(lon);
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lat = bbox.max_lat.max(lat);
        }
        bbox
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(LineString::from(self.vertices.clone()), vec![])
    }

    /// `POLYGON((lon lat, ...))` text for catalog queries
    pub fn to_wkt(&self) -> String {
        let coords: Vec<String> = self
            .vertices
            .iter()
            .map(|(lon, lat)| format!("{} {}", lon, lat))
            .collect();
        format!("POLYGON(({}))", coords.join(","))
    }

    /// Single-feature GeoJSON FeatureCollection
    pub fn to_geojson(&self) -> serde_json::Value {
        let ring: Vec<[f64; 2]> = self.vertices.iter().map(|&(lon, lat)| [lon, lat]).collect();
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [ring]
                    }
                }
            ]
        })
    }

    pub fn write_geojson<P: AsRef<std::path::Path>>(&self, path: P) -> PrepResult<()> {
        log::info!("Writing footprint GeoJSON: {}", path.as_ref().display());
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer(std::io::BufWriter::new(file), &self.to_geojson())?;
        Ok(())
    }
}

/// Derives a raster footprint from its border pixel centres
pub struct FootprintExtractor {
    params: FootprintParams,
}

impl FootprintExtractor {
    pub fn new(params: FootprintParams) -> PrepResult<Self> {
        if params.stride == 0 {
            return Err(PrepError::Config("Footprint stride must be positive".to_string()));
        }
        Ok(Self { params })
    }

    pub fn standard() -> Self {
        Self {
            params: FootprintParams::default(),
        }
    }

    /// Extract the lon/lat ring of `grid`.
    ///
    /// Edges are walked right (first column, top to bottom), down (last row,
    /// left to right), left (last column, bottom to top) and up (first row,
    /// right to left). The last vertex of the up edge is pinned to the first
    /// vertex of the right edge.
    pub fn extract(&self, grid: &GeoGrid) -> PrepResult<Footprint> {
        let (rows, cols) = (grid.rows(), grid.cols());
        log::debug!("Extracting footprint from {}x{} grid", rows, cols);

        let row_idx = sample_indices(rows, self.params.stride);
        let col_idx = sample_indices(cols, self.params.stride);

        let right: Vec<(usize, usize)> = row_idx.iter().map(|&r| (r, 0)).collect();
        let down: Vec<(usize, usize)> = col_idx.iter().map(|&c| (rows - 1, c)).collect();
        let left: Vec<(usize, usize)> = row_idx.iter().rev().map(|&r| (r, cols - 1)).collect();
        let up: Vec<(usize, usize)> = col_idx.iter().rev().map(|&c| (0, c)).collect();

        let center = grid.transform().pixel_center();
        let pixels: Vec<(usize, usize)> = right
            .iter()
            .chain(down.iter())
            .chain(left.iter())
            .chain(up.iter())
            .copied()
            .collect();

        let mut xs = Vec::with_capacity(pixels.len());
        let mut ys = Vec::with_capacity(pixels.len());
        for &(r, c) in &pixels {
            let (x, y) = center.apply(c as f64, r as f64);
            xs.push(x);
            ys.push(y);
        }

        let transformer = CoordinateTransformer::to_wgs84(grid.crs())?;
        transformer.transform_points(&mut xs, &mut ys)?;

        let mut vertices: Vec<(f64, f64)> = xs.into_iter().zip(ys).collect();
        if let Some(&first) = vertices.first() {
            if let Some(last) = vertices.last_mut() {
                *last = first;
            }
        }

        log::info!("Footprint created with {} vertices", vertices.len());
        Ok(Footprint { vertices })
    }
}

/// Indices `0, stride, 2*stride, ...` plus the final index of the edge
pub fn sample_indices(len: usize, stride: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut indices: Vec<usize> = (0..len).step_by(stride.max(1)).collect();
    if indices.last() != Some(&(len - 1)) {
        indices.push(len - 1);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Crs, GeoTransform, PixelType};
    use ndarray::Array2;

    fn geographic_grid(rows: usize, cols: usize) -> GeoGrid {
        GeoGrid::single_band(
            Array2::from_elem((rows, cols), 1.0),
            GeoTransform::north_up(10.0, 70.0, 0.01, -0.01),
            Crs::wgs84(),
            None,
            PixelType::Float32,
        )
        .unwrap()
    }

    #[test]
    fn test_sample_indices() {
        assert_eq!(sample_indices(1, 100), vec![0]);
        assert_eq!(sample_indices(5, 100), vec![0, 4]);
        assert_eq!(sample_indices(250, 100), vec![0, 100, 200, 249]);
        assert_eq!(sample_indices(201, 100), vec![0, 100, 200]);
        assert!(sample_indices(0, 100).is_empty());
    }

    #[test]
    fn test_small_raster_ring_is_closed() {
        let grid = geographic_grid(10, 10);
        let footprint = FootprintExtractor::standard().extract(&grid).unwrap();
        assert!(footprint.is_closed());
        assert_eq!(footprint.vertices().len(), 8);
        // First vertex is the centre of the top-left pixel
        let (lon, lat) = footprint.vertices()[0];
        assert!((lon - 10.005).abs() < 1e-12);
        assert!((lat - 69.995).abs() < 1e-12);
    }

    #[test]
    fn test_vertices_inside_extent() {
        let grid = geographic_grid(350, 420);
        let footprint = FootprintExtractor::standard().extract(&grid).unwrap();
        let bbox = BoundingBox {
            min_lon: 10.0,
            max_lon: 14.2,
            min_lat: 66.5,
            max_lat: 70.0,
        };
        for &(lon, lat) in footprint.vertices() {
            assert!(bbox.contains(lon, lat), "({}, {}) outside", lon, lat);
        }
        assert!(footprint.is_closed());
    }

    #[test]
    fn test_projected_grid_vertices_inside_reprojected_extent() {
        // 3.5 km x 4.2 km UTM 33N grid near 63N
        let (rows, cols) = (350, 420);
        let transform = GeoTransform::north_up(480000.0, 7000000.0, 10.0, -10.0);
        let crs = Crs::from_epsg(32633);
        let grid = GeoGrid::single_band(
            Array2::from_elem((rows, cols), 1.0),
            transform,
            crs.clone(),
            None,
            PixelType::Float32,
        )
        .unwrap();
        let footprint = FootprintExtractor::standard().extract(&grid).unwrap();
        assert!(footprint.is_closed());

        // Lon/lat box of the densely walked raster outline
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for c in 0..=cols {
            for r in [0, rows] {
                let (x, y) = transform.apply(c as f64, r as f64);
                xs.push(x);
                ys.push(y);
            }
        }
        for r in 0..=rows {
            for c in [0, cols] {
                let (x, y) = transform.apply(c as f64, r as f64);
                xs.push(x);
                ys.push(y);
            }
        }
        CoordinateTransformer::to_wgs84(&crs)
            .unwrap()
            .transform_points(&mut xs, &mut ys)
            .unwrap();
        let eps = 1e-7;
        let bbox = BoundingBox {
            min_lon: xs.iter().cloned().fold(f64::INFINITY, f64::min) - eps,
            max_lon: xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + eps,
            min_lat: ys.iter().cloned().fold(f64::INFINITY, f64::min) - eps,
            max_lat: ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + eps,
        };
        assert!(bbox.min_lon > 14.0 && bbox.max_lon < 15.0, "{:?}", bbox);
        assert!(bbox.min_lat > 62.0 && bbox.max_lat < 64.0, "{:?}", bbox);
        for &(lon, lat) in footprint.vertices() {
            assert!(bbox.contains(lon, lat), "({}, {}) outside", lon, lat);
        }

        // First vertex is the top-left pixel centre in geographic coordinates
        let (lon0, lat0) = CoordinateTransformer::to_wgs84(&crs)
            .unwrap()
            .transform_point(480005.0, 6999995.0)
            .unwrap();
        let (lon, lat) = footprint.vertices()[0];
        assert!((lon - lon0).abs() < 1e-9 && (lat - lat0).abs() < 1e-9);
    }

    #[test]
    fn test_traversal_order() {
        let grid = geographic_grid(3, 3);
        let footprint = FootprintExtractor::new(FootprintParams { stride: 1 })
            .unwrap()
            .extract(&grid)
            .unwrap();
        let v = footprint.vertices();
        // right edge walks down the first column
        assert!(v[1].1 < v[0].1);
        assert_eq!(v[1].0, v[0].0);
        // down edge starts at the bottom-left pixel
        assert_eq!(v[3], v[2]);
        assert!(v[4].0 > v[3].0);
    }

    #[test]
    fn test_wkt_and_geojson() {
        let grid = geographic_grid(2, 2);
        let footprint = FootprintExtractor::standard().extract(&grid).unwrap();
        let wkt = footprint.to_wkt();
        assert!(wkt.starts_with("POLYGON(("));
        let geojson = footprint.to_geojson();
        let ring = &geojson["features"][0]["geometry"]["coordinates"][0];
        assert_eq!(ring.as_array().unwrap().len(), footprint.vertices().len());
    }

    #[test]
    fn test_zero_stride_rejected() {
        assert!(FootprintExtractor::new(FootprintParams { stride: 0 }).is_err());
    }
}
