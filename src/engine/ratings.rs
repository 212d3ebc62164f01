use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::rating::Rating;
use crate::models::trip::TripStatus;
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRating {
    pub ride_id: i64,
    pub user_rating: Option<u8>,
    pub driver_rating: Option<u8>,
    pub user_feedback: Option<String>,
    pub driver_feedback: Option<String>,
}

pub struct RatingBook {
    store: Arc<Store>,
}

impl RatingBook {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// One rating per completed ride, scores 1 to 5.
    pub fn rate(&self, rating: NewRating) -> Result<Rating, AppError> {
        for score in [rating.user_rating, rating.driver_rating].into_iter().flatten() {
            if !(1..=5).contains(&score) {
                return Err(AppError::InvalidInput(format!(
                    "rating must be between 1 and 5, got {score}"
                )));
            }
        }

        let trip = self.store.trips.get(rating.ride_id)?;
        if trip.status != TripStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "ride {} is {}, only completed rides can be rated",
                trip.id,
                trip.status.as_str()
            )));
        }
        let clerk_driver_id = trip.clerk_driver_id.ok_or_else(|| {
            AppError::InvalidState(format!("ride {} has no driver", trip.id))
        })?;

        let stored = self.store.ratings.insert(Rating {
            id: 0,
            trip_id: trip.id,
            clerk_user_id: trip.clerk_user_id,
            clerk_driver_id,
            user_rating: rating.user_rating,
            driver_rating: rating.driver_rating,
            user_feedback: rating.user_feedback,
            driver_feedback: rating.driver_feedback,
            created_at: Utc::now(),
        })?;

        tracing::info!(ride_id = stored.trip_id, rating_id = stored.id, "ride rated");
        Ok(stored)
    }

    pub fn for_ride(&self, ride_id: i64) -> Result<Rating, AppError> {
        self.store
            .ratings
            .for_trip(ride_id)
            .ok_or_else(|| AppError::NotFound(format!("rating for ride {ride_id} not found")))
    }
}
