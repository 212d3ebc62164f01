use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::AppError;
use crate::models::trip::Trip;
use crate::store::table::{Row, Table};

impl Row for Trip {
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

pub struct TripStore {
    table: Table<Trip>,
    by_driver: DashMap<String, Vec<i64>>,
}

impl TripStore {
    pub fn new() -> Self {
        Self {
            table: Table::new("ride"),
            by_driver: DashMap::new(),
        }
    }

    pub fn insert(&self, mut trip: Trip) -> Trip {
        let id = self.table.allocate_id();
        let now = Utc::now();
        trip.id = id;
        trip.created_at = now;
        trip.updated_at = now;

        self.table.insert(id, trip.clone());
        trip
    }

    pub fn get(&self, id: i64) -> Result<Trip, AppError> {
        self.table.require(id)
    }

    pub fn exists(&self, id: i64) -> bool {
        self.table.contains(id)
    }

    /// Guarded update; see [`Table::update`]. A committed driver assignment is
    /// indexed for [`TripStore::for_driver`].
    pub fn update<R>(
        &self,
        id: i64,
        change: impl FnOnce(&mut Trip) -> Result<R, AppError>,
    ) -> Result<(R, Trip), AppError> {
        let (outcome, trip) = self.table.update(id, change)?;

        if let Some(driver) = trip.clerk_driver_id.as_deref() {
            let mut ids = self.by_driver.entry(driver.to_string()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        Ok((outcome, trip))
    }

    /// Every trip ever assigned to the driver, newest first.
    pub fn for_driver(&self, clerk_driver_id: &str) -> Vec<Trip> {
        let ids = self
            .by_driver
            .get(clerk_driver_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        let mut trips: Vec<Trip> = ids.into_iter().filter_map(|id| self.table.get(id)).collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        trips
    }

    pub fn count(&self) -> usize {
        self.table.count()
    }
}

impl Default for TripStore {
    fn default() -> Self {
        Self::new()
    }
}
