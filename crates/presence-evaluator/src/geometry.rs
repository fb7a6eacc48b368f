//! Accuracy-aware fence containment
//!
//! A GPS fix is a confidence circle, not a point. The fix only counts as
//! inside when the whole circle is inside the fence.

use presence_domain::{Coordinates, FenceShape, GeoPoint};

/// Mean earth radius in meters (IUGG)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Where a GPS confidence circle sits relative to a fence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Containment {
    /// The whole confidence circle is inside; `margin_m` is the slack left
    Inside {
        /// Distance between the circle's edge and the fence boundary
        margin_m: f64,
    },
    /// The nominal point is inside but the circle crosses the boundary
    Straddles,
    /// The nominal point is outside
    Outside,
}

/// Great-circle distance in meters
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Point `distance_m` meters from `origin` along `bearing_deg` (0 = north)
pub fn destination(origin: GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Classify a GPS fix against a fence shape
pub fn containment(fix: &Coordinates, shape: &FenceShape) -> Containment {
    let point = GeoPoint::new(fix.latitude, fix.longitude);
    match shape {
        FenceShape::Circle { center, radius_m } => circle_containment(point, fix.accuracy_m, *center, *radius_m),
        FenceShape::Polygon { vertices } => polygon_containment(point, fix.accuracy_m, vertices),
    }
}

fn circle_containment(point: GeoPoint, accuracy_m: f64, center: GeoPoint, radius_m: f64) -> Containment {
    if !(radius_m.is_finite() && radius_m > 0.0) {
        return Containment::Outside;
    }

    let distance = haversine_m(point, center);
    if distance + accuracy_m <= radius_m {
        Containment::Inside {
            margin_m: radius_m - distance - accuracy_m,
        }
    } else if distance <= radius_m {
        Containment::Straddles
    } else {
        Containment::Outside
    }
}

fn polygon_containment(point: GeoPoint, accuracy_m: f64, vertices: &[GeoPoint]) -> Containment {
    if vertices.len() < 3 {
        return Containment::Outside;
    }

    // Rooms are small enough for a flat projection around the polygon's mean
    let n = vertices.len() as f64;
    let origin = GeoPoint::new(
        vertices.iter().map(|v| v.latitude).sum::<f64>() / n,
        vertices.iter().map(|v| v.longitude).sum::<f64>() / n,
    );
    let ring: Vec<(f64, f64)> = vertices.iter().map(|v| project(origin, *v)).collect();
    let p = project(origin, point);

    if !point_in_ring(p, &ring) {
        return Containment::Outside;
    }

    let edge_distance = ring
        .iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(a, b)| distance_to_segment(p, *a, *b))
        .fold(f64::INFINITY, f64::min);

    if edge_distance >= accuracy_m {
        Containment::Inside {
            margin_m: edge_distance - accuracy_m,
        }
    } else {
        Containment::Straddles
    }
}

/// Equirectangular projection to meters east/north of `origin`
fn project(origin: GeoPoint, p: GeoPoint) -> (f64, f64) {
    let x = (p.longitude - origin.longitude).to_radians()
        * origin.latitude.to_radians().cos()
        * EARTH_RADIUS_M;
    let y = (p.latitude - origin.latitude).to_radians() * EARTH_RADIUS_M;
    (x, y)
}

/// Even-odd ray casting
fn point_in_ring(p: (f64, f64), ring: &[(f64, f64)]) -> bool {
    let (px, py) = p;
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: GeoPoint = GeoPoint {
        latitude: 40.7128,
        longitude: -74.0060,
    };

    /// Square of side `2 * half_m` centred on ORIGIN
    fn square(half_m: f64) -> Vec<GeoPoint> {
        let diag = half_m * std::f64::consts::SQRT_2;
        vec![
            destination(ORIGIN, 45.0, diag),
            destination(ORIGIN, 135.0, diag),
            destination(ORIGIN, 225.0, diag),
            destination(ORIGIN, 315.0, diag),
        ]
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is ~111.2 km
        let d = haversine_m(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 50.0, "got {}", d);
    }

    #[test]
    fn test_destination_round_trip() {
        let p = destination(ORIGIN, 73.0, 250.0);
        assert!((haversine_m(ORIGIN, p) - 250.0).abs() < 0.01);
    }

    #[test]
    fn test_circle_inside_with_accuracy() {
        let fix = destination(ORIGIN, 0.0, 5.0);
        let shape = FenceShape::Circle { center: ORIGIN, radius_m: 20.0 };

        match containment(&Coordinates::new(fix.latitude, fix.longitude, 10.0), &shape) {
            Containment::Inside { margin_m } => assert!((margin_m - 5.0).abs() < 0.01),
            other => panic!("expected Inside, got {:?}", other),
        }
    }

    #[test]
    fn test_circle_straddles_when_accuracy_crosses_edge() {
        let fix = destination(ORIGIN, 90.0, 15.0);
        let shape = FenceShape::Circle { center: ORIGIN, radius_m: 20.0 };

        assert_eq!(
            containment(&Coordinates::new(fix.latitude, fix.longitude, 10.0), &shape),
            Containment::Straddles
        );
    }

    #[test]
    fn test_circle_outside() {
        let fix = destination(ORIGIN, 180.0, 45.0);
        let shape = FenceShape::Circle { center: ORIGIN, radius_m: 20.0 };

        assert_eq!(
            containment(&Coordinates::new(fix.latitude, fix.longitude, 1.0), &shape),
            Containment::Outside
        );
    }

    #[test]
    fn test_polygon_inside_and_straddles() {
        let shape = FenceShape::Polygon { vertices: square(15.0) };

        // Centre: 15 m to every edge
        let centre = Coordinates::new(ORIGIN.latitude, ORIGIN.longitude, 10.0);
        assert!(matches!(containment(&centre, &shape), Containment::Inside { .. }));

        // 10 m east: 5 m to the east edge, less than 10 m accuracy
        let near_edge = destination(ORIGIN, 90.0, 10.0);
        assert_eq!(
            containment(&Coordinates::new(near_edge.latitude, near_edge.longitude, 10.0), &shape),
            Containment::Straddles
        );
    }

    #[test]
    fn test_polygon_outside() {
        let shape = FenceShape::Polygon { vertices: square(15.0) };
        let away = destination(ORIGIN, 0.0, 40.0);

        assert_eq!(
            containment(&Coordinates::new(away.latitude, away.longitude, 0.0), &shape),
            Containment::Outside
        );
    }

    #[test]
    fn test_degenerate_shapes_never_contain() {
        let fix = Coordinates::new(ORIGIN.latitude, ORIGIN.longitude, 0.0);
        let line = FenceShape::Polygon { vertices: square(15.0)[..2].to_vec() };
        let zero = FenceShape::Circle { center: ORIGIN, radius_m: 0.0 };

        assert_eq!(containment(&fix, &line), Containment::Outside);
        assert_eq!(containment(&fix, &zero), Containment::Outside);
    }
}
