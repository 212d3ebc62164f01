use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the WGS84 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance in kilometers between two points given in decimal degrees.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    // Rounding can push the term a hair past 1.0 for antipodal points.
    let central_angle = 2.0 * haversine.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Sum of consecutive great-circle legs; zero for fewer than two points.
pub fn path_length_km(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|leg| haversine_km(&leg[0], &leg[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, path_length_km, GeoPoint};

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(12.9716, 77.5946);
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(12.9716, 77.5946);
        let b = GeoPoint::new(12.9352, 77.6245);
        assert!((haversine_km(&a, &b) - haversine_km(&b, &a)).abs() < 1e-12);
    }

    #[test]
    fn longitude_term_is_multiplied_not_added() {
        // Same latitude, one degree of longitude at the equator is R * pi / 180.
        let a = GeoPoint::new(0.0, 10.0);
        let b = GeoPoint::new(0.0, 11.0);
        let expected = 6_371.0 * std::f64::consts::PI / 180.0;
        assert!((haversine_km(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn path_length_of_single_point_is_zero() {
        assert_eq!(path_length_km(&[GeoPoint::new(1.0, 1.0)]), 0.0);
        assert_eq!(path_length_km(&[]), 0.0);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::NAN).is_valid());
        assert!(GeoPoint::new(-33.9, 151.2).is_valid());
    }
}
