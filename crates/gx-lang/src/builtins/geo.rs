//! Geometry builtins over GeoJSON geometry payloads.
//!
//! Area and perimeter are computed on the WGS84 sphere (coordinates are
//! lon/lat degrees, results are square meters / meters); the centroid is
//! planar. Geometry types without the measured dimension contribute zero,
//! so `area` of a point is `0.0` rather than an error.

use std::rc::Rc;

use serde_json::{json, Value as Json};

use super::raw_arg;
use crate::error::RuntimeError;
use crate::value::{RawValue, Value};

const EARTH_RADIUS_M: f64 = 6_378_137.0;

pub(super) fn area(args: &[Value]) -> Result<Value, RuntimeError> {
    let geometry = geometry_json(raw_arg(args, 0))?;
    Ok(Value::Float(area_of(&geometry)?))
}

pub(super) fn perimeter(args: &[Value]) -> Result<Value, RuntimeError> {
    let geometry = geometry_json(raw_arg(args, 0))?;
    Ok(Value::Float(length_of(&geometry)?))
}

/// `[min_lon, min_lat, max_lon, max_lat]` over every position.
pub(super) fn bbox(args: &[Value]) -> Result<Value, RuntimeError> {
    let geometry = geometry_json(raw_arg(args, 0))?;
    let positions = positions_of(&geometry)?;
    if positions.is_empty() {
        return Err(malformed("geometry has no coordinates"));
    }
    let mut bound = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    for (x, y) in positions {
        bound[0] = bound[0].min(x);
        bound[1] = bound[1].min(y);
        bound[2] = bound[2].max(x);
        bound[3] = bound[3].max(y);
    }
    Ok(Value::Raw(RawValue::Json(Rc::new(json!(bound)))))
}

pub(super) fn centroid(args: &[Value]) -> Result<Value, RuntimeError> {
    let geometry = geometry_json(raw_arg(args, 0))?;
    let (x, y) = centroid_of(&geometry)?;
    Ok(Value::Raw(RawValue::Json(Rc::new(json!({
        "type": "Point",
        "coordinates": [x, y],
    })))))
}

/// Pull the geometry document out of a raw handle.
fn geometry_json(raw: &RawValue) -> Result<Json, RuntimeError> {
    match raw {
        RawValue::Json(value) => Ok((**value).clone()),
        RawValue::Feature(feature) => Ok(feature.borrow().geometry.clone()),
        other => Err(malformed(&format!("expected a geometry, got {other}"))),
    }
}

fn malformed(message: &str) -> RuntimeError {
    RuntimeError::InvalidArgument {
        message: format!("malformed geometry: {message}"),
    }
}

fn geometry_type(geometry: &Json) -> Result<&str, RuntimeError> {
    geometry
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| malformed("missing type"))
}

fn coordinates(geometry: &Json) -> Result<&Json, RuntimeError> {
    geometry
        .get("coordinates")
        .ok_or_else(|| malformed("missing coordinates"))
}

fn position(value: &Json) -> Result<(f64, f64), RuntimeError> {
    let pair = value.as_array().ok_or_else(|| malformed("position is not an array"))?;
    match (pair.first().and_then(Json::as_f64), pair.get(1).and_then(Json::as_f64)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(malformed("position is not numeric")),
    }
}

fn position_list(value: &Json) -> Result<Vec<(f64, f64)>, RuntimeError> {
    value
        .as_array()
        .ok_or_else(|| malformed("coordinate list is not an array"))?
        .iter()
        .map(position)
        .collect()
}

fn area_of(geometry: &Json) -> Result<f64, RuntimeError> {
    match geometry_type(geometry)? {
        "Polygon" => polygon_area(coordinates(geometry)?),
        "MultiPolygon" => {
            let polygons = coordinates(geometry)?
                .as_array()
                .ok_or_else(|| malformed("MultiPolygon coordinates"))?;
            polygons.iter().map(polygon_area).sum()
        }
        "GeometryCollection" => collection(geometry)?.iter().map(area_of).sum(),
        _ => Ok(0.0),
    }
}

fn polygon_area(rings: &Json) -> Result<f64, RuntimeError> {
    let rings = rings
        .as_array()
        .ok_or_else(|| malformed("Polygon coordinates"))?;
    let mut total = 0.0;
    for (index, ring) in rings.iter().enumerate() {
        let ring = position_list(ring)?;
        let ring_area = spherical_ring_area(&ring).abs();
        if index == 0 {
            total += ring_area;
        } else {
            total -= ring_area;
        }
    }
    Ok(total.max(0.0))
}

/// Signed spherical excess area of one ring (Chamberlain–Duquette).
fn spherical_ring_area(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for window in ring.windows(2) {
        let (lon1, lat1) = window[0];
        let (lon2, lat2) = window[1];
        sum += (lon2 - lon1).to_radians()
            * (2.0 + lat1.to_radians().sin() + lat2.to_radians().sin());
    }
    sum * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0
}

fn length_of(geometry: &Json) -> Result<f64, RuntimeError> {
    match geometry_type(geometry)? {
        "LineString" => Ok(path_length(&position_list(coordinates(geometry)?)?)),
        "MultiLineString" | "Polygon" => {
            let lines = coordinates(geometry)?
                .as_array()
                .ok_or_else(|| malformed("coordinate list is not an array"))?;
            let mut total = 0.0;
            for line in lines {
                total += path_length(&position_list(line)?);
            }
            Ok(total)
        }
        "MultiPolygon" => {
            let polygons = coordinates(geometry)?
                .as_array()
                .ok_or_else(|| malformed("MultiPolygon coordinates"))?;
            let mut total = 0.0;
            for rings in polygons {
                let rings = rings.as_array().ok_or_else(|| malformed("Polygon coordinates"))?;
                for ring in rings {
                    total += path_length(&position_list(ring)?);
                }
            }
            Ok(total)
        }
        "GeometryCollection" => collection(geometry)?.iter().map(length_of).sum(),
        _ => Ok(0.0),
    }
}

fn path_length(positions: &[(f64, f64)]) -> f64 {
    positions
        .windows(2)
        .map(|pair| haversine(pair[0], pair[1]))
        .sum()
}

fn haversine((lon1, lat1): (f64, f64), (lon2, lat2): (f64, f64)) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_M
}

fn centroid_of(geometry: &Json) -> Result<(f64, f64), RuntimeError> {
    match geometry_type(geometry)? {
        "Point" => position(coordinates(geometry)?),
        "Polygon" => {
            let rings = coordinates(geometry)?
                .as_array()
                .ok_or_else(|| malformed("Polygon coordinates"))?;
            let outer = rings.first().ok_or_else(|| malformed("empty polygon"))?;
            ring_centroid(&position_list(outer)?)
        }
        _ => {
            let positions = positions_of(geometry)?;
            if positions.is_empty() {
                return Err(malformed("geometry has no coordinates"));
            }
            let n = positions.len() as f64;
            let (sx, sy) = positions
                .iter()
                .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
            Ok((sx / n, sy / n))
        }
    }
}

/// Planar shoelace centroid of a ring; degenerate rings fall back to the
/// vertex mean.
fn ring_centroid(ring: &[(f64, f64)]) -> Result<(f64, f64), RuntimeError> {
    if ring.is_empty() {
        return Err(malformed("empty ring"));
    }
    let mut twice_area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for window in ring.windows(2) {
        let (x1, y1) = window[0];
        let (x2, y2) = window[1];
        let cross = x1 * y2 - x2 * y1;
        twice_area += cross;
        cx += (x1 + x2) * cross;
        cy += (y1 + y2) * cross;
    }
    if twice_area.abs() < f64::EPSILON {
        let n = ring.len() as f64;
        let (sx, sy) = ring.iter().fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        return Ok((sx / n, sy / n));
    }
    Ok((cx / (3.0 * twice_area), cy / (3.0 * twice_area)))
}

/// Every position in the geometry, in document order.
fn positions_of(geometry: &Json) -> Result<Vec<(f64, f64)>, RuntimeError> {
    match geometry_type(geometry)? {
        "GeometryCollection" => {
            let mut all = Vec::new();
            for child in collection(geometry)? {
                all.extend(positions_of(child)?);
            }
            Ok(all)
        }
        "Point" => Ok(vec![position(coordinates(geometry)?)?]),
        _ => {
            let mut all = Vec::new();
            flatten_positions(coordinates(geometry)?, &mut all)?;
            Ok(all)
        }
    }
}

fn flatten_positions(value: &Json, out: &mut Vec<(f64, f64)>) -> Result<(), RuntimeError> {
    let items = value
        .as_array()
        .ok_or_else(|| malformed("coordinate list is not an array"))?;
    if items.iter().all(Json::is_number) {
        out.push(position(value)?);
        return Ok(());
    }
    for item in items {
        flatten_positions(item, out)?;
    }
    Ok(())
}

fn collection(geometry: &Json) -> Result<&Vec<Json>, RuntimeError> {
    geometry
        .get("geometries")
        .and_then(Json::as_array)
        .ok_or_else(|| malformed("GeometryCollection without geometries"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(geometry: Json) -> Value {
        Value::Raw(RawValue::Json(Rc::new(geometry)))
    }

    fn square() -> Json {
        // ~1° square on the equator.
        json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
        })
    }

    #[test]
    fn area_of_equatorial_square() {
        let result = match area(&[raw(square())]).unwrap() {
            Value::Float(v) => v,
            other => panic!("unexpected {other:?}"),
        };
        // One degree is ~111 km at the equator, so ~1.2e10 m².
        assert!(result > 1.0e10 && result < 1.4e10, "area = {result}");
    }

    #[test]
    fn area_of_point_is_zero() {
        let point = json!({"type": "Point", "coordinates": [1.0, 2.0]});
        assert!(matches!(area(&[raw(point)]).unwrap(), Value::Float(v) if v == 0.0));
    }

    #[test]
    fn holes_subtract_from_area() {
        let with_hole = json!({
            "type": "Polygon",
            "coordinates": [
                [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]],
                [[0.25, 0.25], [0.75, 0.25], [0.75, 0.75], [0.25, 0.75], [0.25, 0.25]],
            ],
        });
        let full = match area(&[raw(square())]).unwrap() {
            Value::Float(v) => v,
            other => panic!("unexpected {other:?}"),
        };
        let holed = match area(&[raw(with_hole)]).unwrap() {
            Value::Float(v) => v,
            other => panic!("unexpected {other:?}"),
        };
        assert!(holed < full);
        assert!(holed > 0.0);
    }

    #[test]
    fn perimeter_of_meridian_segment() {
        // One degree of latitude is ~111 km.
        let line = json!({"type": "LineString", "coordinates": [[0.0, 0.0], [0.0, 1.0]]});
        let result = match perimeter(&[raw(line)]).unwrap() {
            Value::Float(v) => v,
            other => panic!("unexpected {other:?}"),
        };
        assert!((result - 111_000.0).abs() < 1_000.0, "length = {result}");
    }

    #[test]
    fn bbox_covers_all_positions() {
        let result = bbox(&[raw(square())]).unwrap();
        let Value::Raw(RawValue::Json(value)) = result else {
            panic!("expected raw bbox");
        };
        assert_eq!(*value, json!([0.0, 0.0, 1.0, 1.0]));
    }

    #[test]
    fn centroid_of_square() {
        let result = centroid(&[raw(square())]).unwrap();
        let Value::Raw(RawValue::Json(value)) = result else {
            panic!("expected raw centroid");
        };
        assert_eq!(*value, json!({"type": "Point", "coordinates": [0.5, 0.5]}));
    }

    #[test]
    fn malformed_geometry_fails() {
        assert!(area(&[raw(json!({"type": "Polygon"}))]).is_err());
        assert!(bbox(&[raw(json!(null))]).is_err());
    }
}
