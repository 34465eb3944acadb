//! Buffer operations
//!
//! Create buffer zones around geometries. Points become circles approximated
//! as polygons; lines and polygons are offset with round joins. Dissolving
//! merges every buffer into a single multipart polygon.

use geo::{Buffer, Geometry, LineString, MultiPolygon, Point, Polygon};
use regionbuf_core::{Error, Result};
use std::f64::consts::PI;

/// Parameters for buffer operations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer distance in dataset units (positive = expand, negative = shrink)
    pub distance: f64,
    /// Number of segments to approximate point circles (default: 64)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 1.0,
            segments: 64,
        }
    }
}

/// Create a circular buffer around a point.
///
/// Generates a polygon approximating a circle with the given number
/// of segments.
pub fn buffer_points(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance.abs();
    let cx = point.x();
    let cy = point.y();

    let mut coords = Vec::with_capacity(n + 1);
    for i in 0..n {
        let angle = 2.0 * PI * i as f64 / n as f64;
        coords.push((cx + r * angle.cos(), cy + r * angle.sin()));
    }
    // Close the ring
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

/// Buffer one geometry of any kind.
///
/// Negative distances shrink polygons and erase points and lines.
pub fn buffer_geometry(geom: &Geometry<f64>, params: &BufferParams) -> MultiPolygon<f64> {
    let d = params.distance;
    match geom {
        Geometry::Point(p) => point_buffer(p, params),
        Geometry::MultiPoint(mp) => {
            let circles: Vec<MultiPolygon<f64>> =
                mp.0.iter().map(|p| point_buffer(p, params)).collect();
            union_all(circles)
        }
        Geometry::Line(l) => LineString::from(vec![l.start, l.end]).buffer(d),
        Geometry::LineString(ls) => ls.buffer(d),
        Geometry::MultiLineString(mls) => mls.buffer(d),
        Geometry::Polygon(p) => p.buffer(d),
        Geometry::MultiPolygon(mp) => mp.buffer(d),
        Geometry::Rect(r) => r.to_polygon().buffer(d),
        Geometry::Triangle(t) => t.to_polygon().buffer(d),
        Geometry::GeometryCollection(gc) => {
            union_all(gc.0.iter().map(|g| buffer_geometry(g, params)).collect())
        }
    }
}

/// Buffer every geometry and merge the results (dissolve all).
///
/// Overlapping or touching buffers fuse; disjoint ones remain separate parts
/// of the returned multipolygon.
pub fn buffer_dissolve(geoms: &[Geometry<f64>], params: &BufferParams) -> Result<MultiPolygon<f64>> {
    if !params.distance.is_finite() {
        return Err(Error::InvalidParameter {
            name: "distance",
            value: params.distance.to_string(),
            reason: "must be finite".into(),
        });
    }
    let buffers: Vec<MultiPolygon<f64>> = geoms.iter().map(|g| buffer_geometry(g, params)).collect();
    Ok(union_all(buffers))
}

fn point_buffer(point: &Point<f64>, params: &BufferParams) -> MultiPolygon<f64> {
    if params.distance <= 0.0 {
        return MultiPolygon::new(vec![]);
    }
    MultiPolygon::new(vec![buffer_points(point, params)])
}

fn union_all(parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let polygons: Vec<Polygon<f64>> = parts.into_iter().flat_map(|mp| mp.0).collect();
    match polygons.len() {
        0 => MultiPolygon::new(vec![]),
        1 => MultiPolygon::new(polygons),
        _ => geo::unary_union(&polygons),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area};

    fn square(x0: f64, y0: f64, side: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0), (x: x0 + side, y: y0), (x: x0 + side, y: y0 + side),
            (x: x0, y: y0 + side), (x: x0, y: y0),
        ]
    }

    #[test]
    fn test_buffer_point_circle() {
        let point = Point::new(0.0, 0.0);
        let params = BufferParams {
            distance: 10.0,
            segments: 64,
        };

        let polygon = buffer_points(&point, &params);

        // Area should approximate π * r²
        let expected_area = PI * 100.0;
        let actual_area = polygon.unsigned_area();

        let error = (actual_area - expected_area).abs() / expected_area;
        assert!(
            error < 0.01,
            "Circle area error {:.2}% (expected {:.1}, got {:.1})",
            error * 100.0,
            expected_area,
            actual_area
        );
    }

    #[test]
    fn test_buffer_point_vertex_count() {
        let point = Point::new(5.0, 5.0);
        let params = BufferParams {
            distance: 1.0,
            segments: 32,
        };

        let polygon = buffer_points(&point, &params);

        // Should have segments + 1 coordinates (closed ring)
        assert_eq!(polygon.exterior().0.len(), 33);
    }

    #[test]
    fn test_buffer_square_outward() {
        let params = BufferParams { distance: 10.0, ..Default::default() };
        let result = buffer_geometry(&Geometry::Polygon(square(0.0, 0.0, 100.0)), &params);

        // Minkowski sum of a square and a disk: s² + 4sd + πd²
        let expected = 100.0 * 100.0 + 4.0 * 100.0 * 10.0 + PI * 100.0;
        let error = (result.unsigned_area() - expected).abs() / expected;
        assert!(error < 0.01, "area {} vs {}", result.unsigned_area(), expected);
        assert_eq!(result.0.len(), 1);
    }

    #[test]
    fn test_negative_buffer_shrinks() {
        let params = BufferParams { distance: -10.0, ..Default::default() };
        let result = buffer_geometry(&Geometry::Polygon(square(0.0, 0.0, 100.0)), &params);
        assert!((result.unsigned_area() - 80.0 * 80.0).abs() < 1.0);

        let point = buffer_geometry(&Geometry::Point(Point::new(0.0, 0.0)), &params);
        assert!(point.0.is_empty());
    }

    #[test]
    fn test_dissolve_merges_adjacent() {
        let params = BufferParams { distance: 5.0, ..Default::default() };
        let geoms = vec![
            Geometry::Polygon(square(0.0, 0.0, 50.0)),
            Geometry::Polygon(square(50.0, 0.0, 50.0)),
        ];
        let merged = buffer_dissolve(&geoms, &params).unwrap();
        assert_eq!(merged.0.len(), 1);

        let separate: f64 = geoms
            .iter()
            .map(|g| buffer_geometry(g, &params).unsigned_area())
            .sum();
        assert!(merged.unsigned_area() < separate);
    }

    #[test]
    fn test_dissolve_keeps_disjoint_parts() {
        let params = BufferParams { distance: 1.0, ..Default::default() };
        let geoms = vec![
            Geometry::Polygon(square(0.0, 0.0, 10.0)),
            Geometry::Polygon(square(1000.0, 1000.0, 10.0)),
        ];
        let merged = buffer_dissolve(&geoms, &params).unwrap();
        assert_eq!(merged.0.len(), 2);
    }

    #[test]
    fn test_dissolve_rejects_nan() {
        let params = BufferParams { distance: f64::NAN, ..Default::default() };
        assert!(buffer_dissolve(&[], &params).is_err());
    }
}
