//! Geometric measurements

use geo::{Area as GeoArea, Geometry};

/// Calculate the area of a geometry.
///
/// Returns unsigned area in CRS units squared. Non-areal geometries measure 0.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        Geometry::Triangle(t) => t.unsigned_area(),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(area).sum(),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiPolygon, Polygon};

    fn square() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_area_square() {
        let a = area(&Geometry::Polygon(square()));
        assert!((a - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_multipolygon_parts_add() {
        let mp = MultiPolygon::new(vec![square(), square()]);
        assert!((area(&Geometry::MultiPolygon(mp)) - 200.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_with_hole() {
        let poly = Polygon::new(
            square().exterior().clone(),
            vec![LineString::from(vec![
                (2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0), (2.0, 2.0),
            ])],
        );
        assert!((area(&Geometry::Polygon(poly)) - 64.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_non_polygon() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 10.0)]));
        assert_eq!(area(&line), 0.0);
    }
}
