//! Python bindings

use crate::core::footprint::{Footprint, FootprintExtractor, FootprintParams};
use crate::core::overlap::{valid_percentage, OverlapEvaluator, OverlapParams};
use crate::core::validity::{build_validity_mask, ValidityRule};
use crate::io::raster::RasterReader;
use crate::types::{Crs, GeoGrid, GeoTransform, PixelType, PrepError};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

fn to_py_err(e: PrepError) -> PyErr {
    match e {
        PrepError::Config(msg) => PyErr::new::<pyo3::exceptions::PyValueError, _>(msg),
        other => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", other)),
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyFootprint>()?;
    m.add_function(wrap_pyfunction!(extract_footprint, m)?)?;
    m.add_function(wrap_pyfunction!(validity_mask, m)?)?;
    m.add_function(wrap_pyfunction!(count_overlap, m)?)?;
    Ok(())
}

/// Python wrapper for Footprint
#[pyclass(name = "Footprint")]
struct PyFootprint {
    inner: Footprint,
}

#[pymethods]
impl PyFootprint {
    #[getter]
    fn vertices(&self) -> Vec<(f64, f64)> {
        self.inner.vertices().to_vec()
    }

    #[getter]
    fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let bbox = self.inner.bounding_box();
        (bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat)
    }

    fn to_wkt(&self) -> String {
        self.inner.to_wkt()
    }

    fn to_geojson(&self) -> String {
        self.inner.to_geojson().to_string()
    }

    fn __repr__(&self) -> String {
        format!("Footprint({} vertices)", self.inner.vertices().len())
    }
}

/// Lon/lat outline of a raster file
#[pyfunction]
#[pyo3(signature = (path, stride = 100))]
fn extract_footprint(path: String, stride: usize) -> PyResult<PyFootprint> {
    let grid = RasterReader::read_band(&path, 1).map_err(to_py_err)?;
    let footprint = FootprintExtractor::new(FootprintParams { stride })
        .and_then(|e| e.extract(&grid))
        .map_err(to_py_err)?;
    Ok(PyFootprint { inner: footprint })
}

/// 100/0 validity mask of a 2-D array
#[pyfunction]
#[pyo3(signature = (array, interval = None, values = Vec::new()))]
fn validity_mask<'py>(
    py: Python<'py>,
    array: PyReadonlyArray2<'py, f64>,
    interval: Option<(f64, f64)>,
    values: Vec<i64>,
) -> PyResult<&'py PyArray2<f64>> {
    let rule = ValidityRule::from_options(interval, &values).map_err(to_py_err)?;
    let (rows, _) = array.as_array().dim();
    let grid = GeoGrid::single_band(
        array.as_array().to_owned(),
        GeoTransform::north_up(0.0, rows as f64, 1.0, -1.0),
        Crs::wgs84(),
        None,
        PixelType::Float64,
    )
    .map_err(to_py_err)?;
    let mask = build_validity_mask(&grid, &rule).map_err(to_py_err)?;
    Ok(mask.band(0).to_owned().into_pyarray(py))
}

/// Valid count, invalid count and valid percentage of a mask raster inside a
/// WKT footprint
#[pyfunction]
fn count_overlap(mask_path: String, footprint_wkt: String) -> PyResult<(usize, usize, f64)> {
    let mask = RasterReader::read_band(&mask_path, 1).map_err(to_py_err)?;
    let evaluator = OverlapEvaluator::new(&mask, OverlapParams::default()).map_err(to_py_err)?;
    let (valid, invalid) = evaluator.count_pixels(&footprint_wkt).map_err(to_py_err)?;
    Ok((valid, invalid, valid_percentage(valid, invalid)))
}
