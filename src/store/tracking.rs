use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::models::tracking::TrackPoint;

/// Append-only track points, bucketed per trip.
pub struct TrackStore {
    points: DashMap<i64, Vec<TrackPoint>>,
    next_id: AtomicI64,
}

impl TrackStore {
    pub fn new() -> Self {
        Self {
            points: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Id and timestamp are assigned under the trip's bucket lock, so
    /// (timestamp, id) order matches insertion order.
    pub fn append(&self, trip_id: i64, latitude: f64, longitude: f64) -> TrackPoint {
        let mut bucket = self.points.entry(trip_id).or_default();
        let point = TrackPoint {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            trip_id,
            latitude,
            longitude,
            timestamp: Utc::now(),
        };
        bucket.push(point.clone());
        point
    }

    /// Points of one trip ordered by timestamp, ties broken by insertion id.
    pub fn replay(&self, trip_id: i64) -> Vec<TrackPoint> {
        let mut points = self
            .points
            .get(&trip_id)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default();
        points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        points
    }
}

impl Default for TrackStore {
    fn default() -> Self {
        Self::new()
    }
}
