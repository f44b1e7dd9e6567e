use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Geographic bounding box in WGS84 degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Whether a lon/lat point lies inside the box (edges inclusive)
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// Projected extent of a grid in its native CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Smallest extent covering both
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Geospatial transformation parameters (GDAL ordering)
///
/// Maps pixel (col, row) to map (x, y):
/// `x = top_left_x + col * pixel_width + row * rotation_x`,
/// `y = top_left_y + col * rotation_y + row * pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation terms
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Apply the affine map to (u, v)
    ///
    /// For a forward transform (u, v) is (col, row) and the result is map (x, y).
    /// For a transform obtained from [`GeoTransform::inverse`] the roles swap.
    pub fn apply(&self, u: f64, v: f64) -> (f64, f64) {
        (
            self.top_left_x + u * self.pixel_width + v * self.rotation_x,
            self.top_left_y + u * self.rotation_y + v * self.pixel_height,
        )
    }

    /// Transform anchored on pixel centres instead of pixel corners
    pub fn pixel_center(&self) -> GeoTransform {
        let (x, y) = self.apply(0.5, 0.5);
        GeoTransform {
            top_left_x: x,
            top_left_y: y,
            ..*self
        }
    }

    /// Inverse mapping map (x, y) -> pixel (col, row)
    pub fn inverse(&self) -> PrepResult<GeoTransform> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 || !det.is_finite() {
            return Err(PrepError::Geometry(format!(
                "Singular geotransform (determinant {})",
                det
            )));
        }
        let inv_det = 1.0 / det;
        let a = self.pixel_height * inv_det;
        let b = -self.rotation_x * inv_det;
        let d = -self.rotation_y * inv_det;
        let e = self.pixel_width * inv_det;
        Ok(GeoTransform {
            top_left_x: -(a * self.top_left_x + b * self.top_left_y),
            pixel_width: a,
            rotation_x: b,
            top_left_y: -(d * self.top_left_x + e * self.top_left_y),
            rotation_y: d,
            pixel_height: e,
        })
    }

    pub fn is_north_up(&self) -> bool {
        self.rotation_x == 0.0 && self.rotation_y == 0.0
    }

    /// Extent covered by a `rows` x `cols` grid
    pub fn extent(&self, rows: usize, cols: usize) -> Extent {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(cols as f64, 0.0),
            self.apply(0.0, rows as f64),
            self.apply(cols as f64, rows as f64),
        ];
        let mut extent = Extent {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            extent.min_x = extent.min_x.min(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_x = extent.max_x.max(x);
            extent.max_y = extent.max_y.max(y);
        }
        extent
    }
}

/// Coordinate reference system, held as any definition GDAL understands
/// (WKT, PROJ string or `EPSG:<code>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    definition: String,
}

impl Crs {
    pub fn new<S: Into<String>>(definition: S) -> Self {
        Self {
            definition: definition.into(),
        }
    }

    pub fn from_epsg(code: u32) -> Self {
        Self::new(format!("EPSG:{}", code))
    }

    /// Geographic WGS84, used for footprints and catalog geometries
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn to_spatial_ref(&self) -> PrepResult<gdal::spatial_ref::SpatialRef> {
        if self.definition.trim().is_empty() {
            return Err(PrepError::InvalidFormat("Empty CRS definition".to_string()));
        }
        Ok(gdal::spatial_ref::SpatialRef::from_definition(&self.definition)?)
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.definition.chars().count() > 48 {
            let head: String = self.definition.chars().take(48).collect();
            write!(f, "{}...", head)
        } else {
            write!(f, "{}", self.definition)
        }
    }
}

/// Storage type of raster pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl PixelType {
    /// Map a GDAL band data type
    pub fn from_gdal(data_type: gdal::raster::GdalDataType) -> PrepResult<Self> {
        use gdal::raster::GdalDataType;
        match data_type {
            GdalDataType::UInt8 => Ok(PixelType::UInt8),
            GdalDataType::UInt16 => Ok(PixelType::UInt16),
            GdalDataType::Int16 => Ok(PixelType::Int16),
            GdalDataType::UInt32 => Ok(PixelType::UInt32),
            GdalDataType::Int32 => Ok(PixelType::Int32),
            GdalDataType::Float32 => Ok(PixelType::Float32),
            GdalDataType::Float64 => Ok(PixelType::Float64),
            other => Err(PrepError::InvalidFormat(format!(
                "Unsupported GDAL data type {:?}",
                other
            ))),
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, PixelType::Float32 | PixelType::Float64)
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelType::UInt8 => "uint8",
            PixelType::UInt16 => "uint16",
            PixelType::Int16 => "int16",
            PixelType::UInt32 => "uint32",
            PixelType::Int32 => "int32",
            PixelType::Float32 => "float32",
            PixelType::Float64 => "float64",
        };
        write!(f, "{}", name)
    }
}

/// Spatial frame of a grid without its pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTemplate {
    pub transform: GeoTransform,
    pub crs: Crs,
    pub rows: usize,
    pub cols: usize,
}

impl GridTemplate {
    pub fn extent(&self) -> Extent {
        self.transform.extent(self.rows, self.cols)
    }
}

/// Geocoded raster: pixels (band, row, col) with the transform and CRS that
/// locate them. Never mutated in place.
#[derive(Debug, Clone)]
pub struct GeoGrid {
    data: Array3<f64>,
    transform: GeoTransform,
    crs: Crs,
    nodata: Option<f64>,
    pixel_type: PixelType,
}

impl GeoGrid {
    pub fn new(
        data: Array3<f64>,
        transform: GeoTransform,
        crs: Crs,
        nodata: Option<f64>,
        pixel_type: PixelType,
    ) -> PrepResult<Self> {
        let (bands, rows, cols) = data.dim();
        if bands == 0 || rows == 0 || cols == 0 {
            return Err(PrepError::InvalidFormat(format!(
                "Grid must not be empty, got {}x{}x{}",
                bands, rows, cols
            )));
        }
        Ok(Self {
            data,
            transform,
            crs,
            nodata,
            pixel_type,
        })
    }

    pub fn single_band(
        band: Array2<f64>,
        transform: GeoTransform,
        crs: Crs,
        nodata: Option<f64>,
        pixel_type: PixelType,
    ) -> PrepResult<Self> {
        Self::new(band.insert_axis(Axis(0)), transform, crs, nodata, pixel_type)
    }

    /// Same spatial frame, new pixels
    pub fn with_data(
        &self,
        data: Array3<f64>,
        nodata: Option<f64>,
        pixel_type: PixelType,
    ) -> PrepResult<Self> {
        let (_, rows, cols) = data.dim();
        if rows != self.rows() || cols != self.cols() {
            return Err(PrepError::Processing(format!(
                "Data shape {}x{} does not match grid {}x{}",
                rows,
                cols,
                self.rows(),
                self.cols()
            )));
        }
        Self::new(data, self.transform, self.crs.clone(), nodata, pixel_type)
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Zero-based band view
    pub fn band(&self, index: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(0), index)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn band_count(&self) -> usize {
        self.data.dim().0
    }

    pub fn rows(&self) -> usize {
        self.data.dim().1
    }

    pub fn cols(&self) -> usize {
        self.data.dim().2
    }

    pub fn extent(&self) -> Extent {
        self.transform.extent(self.rows(), self.cols())
    }

    pub fn template(&self) -> GridTemplate {
        GridTemplate {
            transform: self.transform,
            crs: self.crs.clone(),
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        is_nodata_value(value, self.nodata)
    }
}

/// Nodata comparison that also treats NaN sentinels as nodata
pub fn is_nodata_value(value: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => value.is_nan(),
        Some(nd) => value == nd,
        None => false,
    }
}

/// Error types for Sentinel-2 preparation
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for preparation operations
pub type PrepResult<T> = Result<T, PrepError>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    #[test]
    fn test_pixel_center_translation() {
        let gt = GeoTransform::north_up(500000.0, 7000000.0, 10.0, -10.0);
        let center = gt.pixel_center();
        assert_relative_eq!(center.top_left_x, 500005.0);
        assert_relative_eq!(center.top_left_y, 6999995.0);
        assert_eq!(center.pixel_width, gt.pixel_width);
    }

    #[test]
    fn test_inverse_roundtrip_with_rotation() {
        let gt = GeoTransform {
            top_left_x: 100.0,
            pixel_width: 2.0,
            rotation_x: 0.5,
            top_left_y: 200.0,
            rotation_y: -0.25,
            pixel_height: -3.0,
        };
        let inv = gt.inverse().unwrap();
        let (x, y) = gt.apply(7.25, 3.5);
        let (col, row) = inv.apply(x, y);
        assert_relative_eq!(col, 7.25, epsilon = 1e-9);
        assert_relative_eq!(row, 3.5, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_transform_rejected() {
        let gt = GeoTransform::north_up(0.0, 0.0, 0.0, -1.0);
        assert!(gt.inverse().is_err());
    }

    #[test]
    fn test_extent() {
        let gt = GeoTransform::north_up(10.0, 50.0, 0.5, -0.25);
        let extent = gt.extent(4, 6);
        assert_relative_eq!(extent.min_x, 10.0);
        assert_relative_eq!(extent.max_x, 13.0);
        assert_relative_eq!(extent.min_y, 49.0);
        assert_relative_eq!(extent.max_y, 50.0);
    }

    #[test]
    fn test_empty_grid_rejected() {
        let data = Array3::<f64>::zeros((1, 0, 3));
        let result = GeoGrid::new(
            data,
            GeoTransform::north_up(0.0, 0.0, 1.0, -1.0),
            Crs::wgs84(),
            None,
            PixelType::Float32,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pixel_type_from_gdal() {
        use gdal::raster::GdalDataType;
        assert_eq!(PixelType::from_gdal(GdalDataType::UInt8).unwrap(), PixelType::UInt8);
        assert_eq!(PixelType::from_gdal(GdalDataType::UInt16).unwrap(), PixelType::UInt16);
        assert_eq!(PixelType::from_gdal(GdalDataType::Float32).unwrap(), PixelType::Float32);
        assert!(PixelType::from_gdal(GdalDataType::Unknown).is_err());
    }

    #[test]
    fn test_nan_nodata() {
        assert!(is_nodata_value(f64::NAN, Some(f64::NAN)));
        assert!(!is_nodata_value(1.0, Some(f64::NAN)));
        assert!(!is_nodata_value(0.0, None));
        assert!(is_nodata_value(0.0, Some(0.0)));
    }
}
