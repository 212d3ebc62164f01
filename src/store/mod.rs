//! In-process relational store. Every table enforces the uniqueness constraints of the
//! data model, and row updates are applied atomically under the row lock.

pub mod drivers;
pub mod payments;
pub mod ratings;
pub mod riders;
pub mod table;
pub mod tracking;
pub mod trips;
pub mod vehicles;

use drivers::DriverStore;
use payments::PaymentStore;
use ratings::RatingStore;
use riders::RiderStore;
use tracking::TrackStore;
use trips::TripStore;
use vehicles::VehicleStore;

pub struct Store {
    pub riders: RiderStore,
    pub drivers: DriverStore,
    pub vehicles: VehicleStore,
    pub trips: TripStore,
    pub track_points: TrackStore,
    pub payments: PaymentStore,
    pub ratings: RatingStore,
}

impl Store {
    pub fn new() -> Self {
        Self {
            riders: RiderStore::new(),
            drivers: DriverStore::new(),
            vehicles: VehicleStore::new(),
            trips: TripStore::new(),
            track_points: TrackStore::new(),
            payments: PaymentStore::new(),
            ratings: RatingStore::new(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Treats blank optional strings as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
