use crate::error::AppError;
use crate::models::rating::Rating;
use crate::store::table::{Table, UniqueIndex};

pub struct RatingStore {
    table: Table<Rating>,
    by_trip: UniqueIndex,
}

impl RatingStore {
    pub fn new() -> Self {
        Self {
            table: Table::new("rating"),
            by_trip: UniqueIndex::new("rideId"),
        }
    }

    /// One rating per trip; a second insert is a conflict.
    pub fn insert(&self, mut rating: Rating) -> Result<Rating, AppError> {
        let id = self.table.allocate_id();
        rating.id = id;

        self.by_trip
            .claim(&rating.trip_id.to_string(), id)
            .map_err(|_| AppError::Conflict("already-rated".to_string()))?;

        self.table.insert(id, rating.clone());
        Ok(rating)
    }

    pub fn for_trip(&self, trip_id: i64) -> Option<Rating> {
        self.by_trip
            .lookup(&trip_id.to_string())
            .and_then(|id| self.table.get(id))
    }
}

impl Default for RatingStore {
    fn default() -> Self {
        Self::new()
    }
}
