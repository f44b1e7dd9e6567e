use crate::core::projection::crs_from_spatial_ref;
use crate::types::{GeoGrid, GeoTransform, GridTemplate, PixelType, PrepError, PrepResult};
use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager};
use ndarray::{Array2, Array3, Axis};
use num_traits::NumCast;
use std::path::Path;

/// Reads GDAL rasters into [`GeoGrid`]s
pub struct RasterReader;

impl RasterReader {
    fn open(path: &Path) -> PrepResult<Dataset> {
        if !path.exists() {
            return Err(PrepError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Raster not found: {}", path.display()),
            )));
        }
        Ok(Dataset::open(path)?)
    }

    fn frame(dataset: &Dataset, path: &Path) -> PrepResult<GridTemplate> {
        let transform = GeoTransform::from_gdal(&dataset.geo_transform()?);
        let crs = dataset
            .spatial_ref()
            .map_err(|_| {
                PrepError::InvalidFormat(format!(
                    "Raster {} has no coordinate reference system",
                    path.display()
                ))
            })
            .and_then(|srs| crs_from_spatial_ref(&srs))?;
        let (cols, rows) = dataset.raster_size();
        Ok(GridTemplate {
            transform,
            crs,
            rows,
            cols,
        })
    }

    /// Spatial frame of a raster without reading its pixels
    pub fn read_template<P: AsRef<Path>>(path: P) -> PrepResult<GridTemplate> {
        let path = path.as_ref();
        let dataset = Self::open(path)?;
        Self::frame(&dataset, path)
    }

    /// Read every band
    pub fn read<P: AsRef<Path>>(path: P) -> PrepResult<GeoGrid> {
        let path = path.as_ref();
        let dataset = Self::open(path)?;
        let count = dataset.raster_count() as usize;
        let bands: Vec<usize> = (1..=count).collect();
        Self::read_bands(&dataset, path, &bands)
    }

    /// Read a single one-based band
    pub fn read_band<P: AsRef<Path>>(path: P, band: usize) -> PrepResult<GeoGrid> {
        let path = path.as_ref();
        let dataset = Self::open(path)?;
        let count = dataset.raster_count() as usize;
        if band == 0 || band > count {
            return Err(PrepError::InvalidFormat(format!(
                "Band {} out of range, {} has {} band(s)",
                band,
                path.display(),
                count
            )));
        }
        Self::read_bands(&dataset, path, &[band])
    }

    fn read_bands(dataset: &Dataset, path: &Path, bands: &[usize]) -> PrepResult<GeoGrid> {
        let frame = Self::frame(dataset, path)?;
        let (rows, cols) = (frame.rows, frame.cols);
        log::info!(
            "Reading {} band(s) of {}x{} from {}",
            bands.len(),
            rows,
            cols,
            path.display()
        );

        let mut data = Array3::<f64>::zeros((bands.len(), rows, cols));
        let mut nodata = None;
        let mut pixel_type = PixelType::Float64;

        for (i, &band_index) in bands.iter().enumerate() {
            let rasterband = dataset.rasterband(band_index as isize)?;
            if i == 0 {
                nodata = rasterband.no_data_value();
                pixel_type = PixelType::from_gdal(rasterband.band_type())?;
            }
            let buffer = rasterband.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;
            let band = Array2::from_shape_vec((rows, cols), buffer.data)
                .map_err(|e| PrepError::Processing(format!("Failed to reshape band: {}", e)))?;
            data.index_axis_mut(Axis(0), i).assign(&band);
        }

        GeoGrid::new(data, frame.transform, frame.crs, nodata, pixel_type)
    }
}

/// Writes [`GeoGrid`]s as GeoTIFF
pub struct RasterWriter;

impl RasterWriter {
    /// Write all bands, storing pixels as `pixel_type` or the grid's own type
    pub fn write_geotiff<P: AsRef<Path>>(
        grid: &GeoGrid,
        path: P,
        pixel_type: Option<PixelType>,
    ) -> PrepResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let pixel_type = pixel_type.unwrap_or_else(|| grid.pixel_type());
        log::info!(
            "Saving {} band(s) as {} GeoTIFF: {}",
            grid.band_count(),
            pixel_type,
            path.display()
        );

        match pixel_type {
            PixelType::UInt8 => Self::write_typed::<u8>(grid, path, true),
            PixelType::UInt16 => Self::write_typed::<u16>(grid, path, true),
            PixelType::Int16 => Self::write_typed::<i16>(grid, path, true),
            PixelType::UInt32 => Self::write_typed::<u32>(grid, path, true),
            PixelType::Int32 => Self::write_typed::<i32>(grid, path, true),
            PixelType::Float32 => Self::write_typed::<f32>(grid, path, false),
            PixelType::Float64 => Self::write_typed::<f64>(grid, path, false),
        }
    }

    fn write_typed<T: GdalType + Copy + NumCast + Default>(
        grid: &GeoGrid,
        path: &Path,
        integer: bool,
    ) -> PrepResult<()> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let (bands, rows, cols) = grid.data().dim();

        let mut dataset =
            driver.create_with_band_type::<T, _>(path, cols as isize, rows as isize, bands as isize)?;
        dataset.set_geo_transform(&grid.transform().to_gdal())?;
        dataset.set_spatial_ref(&grid.crs().to_spatial_ref()?)?;

        let fallback: T = grid
            .nodata()
            .and_then(|nd| <T as NumCast>::from(nd))
            .unwrap_or_default();

        for band_index in 0..bands {
            let flat: Vec<T> = grid
                .band(band_index)
                .iter()
                .map(|&v| cast_pixel::<T>(v, integer).unwrap_or(fallback))
                .collect();
            let mut rasterband = dataset.rasterband(band_index as isize + 1)?;
            let buffer = Buffer::new((cols, rows), flat);
            rasterband.write((0, 0), (cols, rows), &buffer)?;
            if let Some(nd) = grid.nodata() {
                rasterband.set_no_data_value(Some(nd))?;
            }
        }

        log::debug!("GeoTIFF saved: {}", path.display());
        Ok(())
    }
}

/// Cast to the storage type; integer targets round first. NaN and
/// out-of-range values yield `None`.
fn cast_pixel<T: NumCast>(value: f64, integer: bool) -> Option<T> {
    if integer && value.is_finite() {
        <T as NumCast>::from(value.round())
    } else {
        <T as NumCast>::from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Crs;
    use ndarray::Array2;

    #[test]
    fn test_cast_pixel() {
        assert_eq!(cast_pixel::<u8>(2.6, true), Some(3));
        assert_eq!(cast_pixel::<u8>(300.0, true), None);
        assert_eq!(cast_pixel::<u16>(f64::NAN, true), None);
        assert_eq!(cast_pixel::<f32>(0.25, false), Some(0.25f32));
        assert_eq!(cast_pixel::<i16>(-2.4, true), Some(-2));
    }

    #[test]
    fn test_geotiff_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("grid.tif");
        let values = Array2::from_shape_fn((4, 6), |(r, c)| (r * 6 + c) as f64);
        let grid = GeoGrid::single_band(
            values.clone(),
            GeoTransform::north_up(10.0, 60.0, 0.5, -0.25),
            Crs::wgs84(),
            Some(255.0),
            PixelType::UInt8,
        )
        .unwrap();

        RasterWriter::write_geotiff(&grid, &path, None).unwrap();
        let back = RasterReader::read(&path).unwrap();

        assert_eq!(back.band(0).to_owned(), values);
        assert_eq!(back.pixel_type(), PixelType::UInt8);
        assert_eq!(back.nodata(), Some(255.0));
        assert_eq!(back.transform(), grid.transform());
        assert_eq!(back.crs(), &Crs::wgs84());

        let template = RasterReader::read_template(&path).unwrap();
        assert_eq!((template.rows, template.cols), (4, 6));
        assert!(RasterReader::read_band(&path, 2).is_err());
    }

    #[test]
    fn test_pixel_type_read_back() {
        let dir = tempfile::tempdir().unwrap();
        for pixel_type in [PixelType::UInt16, PixelType::Int16, PixelType::Float32] {
            let path = dir.path().join(format!("{}.tif", pixel_type));
            let grid = GeoGrid::single_band(
                Array2::from_elem((2, 3), 7.0),
                GeoTransform::north_up(0.0, 2.0, 1.0, -1.0),
                Crs::wgs84(),
                None,
                pixel_type,
            )
            .unwrap();
            RasterWriter::write_geotiff(&grid, &path, None).unwrap();
            assert_eq!(RasterReader::read(&path).unwrap().pixel_type(), pixel_type);
        }
    }

    #[test]
    fn test_missing_raster() {
        assert!(RasterReader::read("/nonexistent/raster.tif").is_err());
    }
}
