use std::sync::Arc;

use crate::error::AppError;
use crate::geo::{path_length_km, GeoPoint};
use crate::models::tracking::TrackPoint;
use crate::store::Store;

/// Per-trip polyline. Appends never touch the trip row.
pub struct Tracker {
    store: Arc<Store>,
}

impl Tracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn append_point(&self, trip_id: i64, lat: f64, lng: f64) -> Result<TrackPoint, AppError> {
        if !GeoPoint::new(lat, lng).is_valid() {
            return Err(AppError::InvalidInput(format!(
                "invalid coordinate ({lat}, {lng})"
            )));
        }
        if !self.store.trips.exists(trip_id) {
            return Err(AppError::NotFound(format!("ride {trip_id} not found")));
        }

        let point = self.store.track_points.append(trip_id, lat, lng);
        tracing::debug!(ride_id = trip_id, point_id = point.id, "track point stored");
        Ok(point)
    }

    /// Length of the tracked path in kilometers; zero below two points.
    pub fn polyline_distance(&self, trip_id: i64) -> f64 {
        let points: Vec<GeoPoint> = self
            .store
            .track_points
            .replay(trip_id)
            .iter()
            .map(TrackPoint::point)
            .collect();

        path_length_km(&points)
    }
}
