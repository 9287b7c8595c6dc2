//! `geo`-backed implementation of the polygon collaborator

use super::spatial::BoundingBox;
use geo::{Area, BooleanOps, Contains, CoordsIter, InteriorPoint, MultiPolygon, Polygon};
use lagosnet_core::{Error, GeometryEngine, Result};

/// Planar polygon engine over `geo::MultiPolygon<f64>`
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

impl GeoEngine {
    pub fn new() -> Self {
        Self
    }
}

fn check_finite(polygon: &MultiPolygon<f64>) -> Result<()> {
    if polygon.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
        Ok(())
    } else {
        Err(Error::Geometry("polygon has non-finite coordinates".to_string()))
    }
}

/// Pairwise union, halving the number of parts each round
fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

impl GeometryEngine for GeoEngine {
    type Polygon = MultiPolygon<f64>;

    fn dissolve(&self, parts: &[&MultiPolygon<f64>]) -> Result<MultiPolygon<f64>> {
        for p in parts {
            check_finite(p)?;
        }
        Ok(union_all(parts.iter().map(|&p| p.clone()).collect()))
    }

    fn erase(&self, target: &MultiPolygon<f64>, eraser: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        check_finite(target)?;
        check_finite(eraser)?;
        match (BoundingBox::of(target), BoundingBox::of(eraser)) {
            (Some(t), Some(e)) if t.intersects(&e) => Ok(target.difference(eraser)),
            _ => Ok(target.clone()),
        }
    }

    fn fill_holes(&self, polygon: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        check_finite(polygon)?;
        // A part that sat inside another part's hole is swallowed by the union
        let shells: Vec<MultiPolygon<f64>> = polygon
            .iter()
            .map(|p| MultiPolygon::new(vec![Polygon::new(p.exterior().clone(), vec![])]))
            .collect();
        Ok(union_all(shells))
    }

    fn area(&self, polygon: &MultiPolygon<f64>) -> f64 {
        polygon.unsigned_area()
    }

    fn encloses(&self, outer: &MultiPolygon<f64>, inner: &MultiPolygon<f64>) -> bool {
        match (BoundingBox::of(outer), BoundingBox::of(inner)) {
            (Some(o), Some(i)) if o.intersects(&i) => inner
                .interior_point()
                .map(|pt| outer.contains(&pt))
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Coord, LineString};

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]])
    }

    fn donut() -> MultiPolygon<f64> {
        let ring = |x0: f64, size: f64| {
            LineString::from(vec![
                Coord { x: x0, y: x0 },
                Coord { x: x0 + size, y: x0 },
                Coord { x: x0 + size, y: x0 + size },
                Coord { x: x0, y: x0 + size },
                Coord { x: x0, y: x0 },
            ])
        };
        MultiPolygon::new(vec![Polygon::new(ring(0.0, 10.0), vec![ring(4.0, 2.0)])])
    }

    #[test]
    fn test_dissolve_adjacent_squares() {
        let engine = GeoEngine;
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0, 0.0, 1.0);
        let c = square(5.0, 5.0, 1.0);
        let merged = engine.dissolve(&[&a, &b, &c]).unwrap();
        assert_relative_eq!(engine.area(&merged), 3.0, epsilon = 1e-9);
        assert_eq!(merged.0.len(), 2);
    }

    #[test]
    fn test_dissolve_nothing_is_empty() {
        let engine = GeoEngine;
        let merged = engine.dissolve(&[]).unwrap();
        assert!(engine.is_empty(&merged));
    }

    #[test]
    fn test_erase() {
        let engine = GeoEngine;
        let big = square(0.0, 0.0, 4.0);
        let bite = square(0.0, 0.0, 2.0);
        let far = square(100.0, 100.0, 1.0);
        assert_relative_eq!(engine.area(&engine.erase(&big, &bite).unwrap()), 12.0, epsilon = 1e-9);
        assert_eq!(engine.erase(&big, &far).unwrap(), big);
    }

    #[test]
    fn test_fill_holes() {
        let engine = GeoEngine;
        let d = donut();
        assert_relative_eq!(engine.area(&d), 96.0, epsilon = 1e-9);
        let filled = engine.fill_holes(&d).unwrap();
        assert_relative_eq!(engine.area(&filled), 100.0, epsilon = 1e-9);
        assert!(filled.0.iter().all(|p| p.interiors().is_empty()));
    }

    #[test]
    fn test_encloses_island() {
        let engine = GeoEngine;
        let island = square(4.5, 4.5, 1.0);
        assert!(!engine.encloses(&donut(), &island));
        let filled = engine.fill_holes(&donut()).unwrap();
        assert!(engine.encloses(&filled, &island));
        assert!(!engine.encloses(&square(50.0, 50.0, 1.0), &island));
    }

    #[test]
    fn test_non_finite_rejected() {
        let engine = GeoEngine;
        let bad = square(f64::NAN, 0.0, 1.0);
        assert!(matches!(engine.dissolve(&[&bad]), Err(Error::Geometry(_))));
    }
}
