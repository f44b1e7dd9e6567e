//! Polygon helpers shared by the overlap evaluator and the land mask

use crate::core::projection::CoordinateTransformer;
use crate::types::{GeoTransform, PrepError, PrepResult};
use gdal::vector::Geometry;
use geo::{BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use ndarray::Array2;

/// Parse POLYGON / MULTIPOLYGON well-known text
pub fn parse_wkt_polygons(wkt: &str) -> PrepResult<MultiPolygon<f64>> {
    let geometry = Geometry::from_wkt(wkt.trim())
        .map_err(|e| PrepError::Geometry(format!("Cannot parse WKT footprint: {}", e)))?;
    gdal_to_multipolygon(&geometry)
}

/// Convert an OGR polygonal geometry to `geo` polygons
pub fn gdal_to_multipolygon(geometry: &Geometry) -> PrepResult<MultiPolygon<f64>> {
    let name = geometry.geometry_name();
    match name.to_uppercase().as_str() {
        "POLYGON" => Ok(MultiPolygon(vec![gdal_polygon(geometry)?])),
        "MULTIPOLYGON" | "GEOMETRYCOLLECTION" => {
            let mut polygons = Vec::new();
            for i in 0..geometry.geometry_count() {
                let part = geometry.get_geometry(i);
                polygons.extend(gdal_to_multipolygon(&part)?.0);
            }
            Ok(MultiPolygon(polygons))
        }
        other => Err(PrepError::Geometry(format!(
            "Expected a polygonal geometry, got {}",
            other
        ))),
    }
}

fn gdal_polygon(geometry: &Geometry) -> PrepResult<Polygon<f64>> {
    let ring_count = geometry.geometry_count();
    if ring_count == 0 {
        return Err(PrepError::Geometry("Polygon has no rings".to_string()));
    }
    let mut rings = (0..ring_count).map(|i| {
        let ring = geometry.get_geometry(i);
        LineString::from(
            ring.get_point_vec()
                .into_iter()
                .map(|(x, y, _)| (x, y))
                .collect::<Vec<_>>(),
        )
    });
    // ring_count > 0 so the exterior is always present
    let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
    Ok(Polygon::new(exterior, rings.collect()))
}

/// Reproject every vertex of `polygons`
pub fn transform_polygons(
    polygons: &MultiPolygon<f64>,
    transformer: &CoordinateTransformer,
) -> PrepResult<MultiPolygon<f64>> {
    if transformer.is_identity() {
        return Ok(polygons.clone());
    }
    polygons
        .0
        .iter()
        .map(|polygon| {
            let exterior = transform_ring(polygon.exterior(), transformer)?;
            let interiors = polygon
                .interiors()
                .iter()
                .map(|ring| transform_ring(ring, transformer))
                .collect::<PrepResult<Vec<_>>>()?;
            Ok(Polygon::new(exterior, interiors))
        })
        .collect::<PrepResult<Vec<_>>>()
        .map(MultiPolygon)
}

fn transform_ring(
    ring: &LineString<f64>,
    transformer: &CoordinateTransformer,
) -> PrepResult<LineString<f64>> {
    let mut xs: Vec<f64> = ring.coords().map(|c| c.x).collect();
    let mut ys: Vec<f64> = ring.coords().map(|c| c.y).collect();
    transformer.transform_points(&mut xs, &mut ys)?;
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(PrepError::Geometry(
            "Polygon vertex falls outside the target projection".to_string(),
        ));
    }
    Ok(LineString::from(
        xs.into_iter()
            .zip(ys)
            .map(|(x, y)| Coord { x, y })
            .collect::<Vec<_>>(),
    ))
}

/// Pixels of a `rows` x `cols` grid whose centre lies inside any polygon.
///
/// Pixels outside the grid are never reported, so polygons reaching beyond
/// the raster only cover their in-bounds part.
pub fn pixels_inside(
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    polygons: &MultiPolygon<f64>,
) -> PrepResult<Array2<bool>> {
    let inverse = transform.inverse()?;
    let mut covered = Array2::from_elem((rows, cols), false);

    for polygon in &polygons.0 {
        let rect = match polygon.bounding_rect() {
            Some(rect) => rect,
            None => continue,
        };

        // Pixel window of the polygon's bounding box
        let corners = [
            inverse.apply(rect.min().x, rect.min().y),
            inverse.apply(rect.min().x, rect.max().y),
            inverse.apply(rect.max().x, rect.min().y),
            inverse.apply(rect.max().x, rect.max().y),
        ];
        let col_min = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let col_max = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let row_min = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let row_max = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

        if col_max < 0.0 || row_max < 0.0 || col_min >= cols as f64 || row_min >= rows as f64 {
            continue;
        }

        let c0 = col_min.floor().max(0.0) as usize;
        let c1 = (col_max.ceil().max(0.0) as usize).min(cols);
        let r0 = row_min.floor().max(0.0) as usize;
        let r1 = (row_max.ceil().max(0.0) as usize).min(rows);

        for row in r0..r1 {
            for col in c0..c1 {
                if covered[[row, col]] {
                    continue;
                }
                let (x, y) = transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                if polygon.contains(&Point::new(x, y)) {
                    covered[[row, col]] = true;
                }
            }
        }
    }

    Ok(covered)
}
