use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::AppError;
use crate::geo::{haversine_km, GeoPoint};

/// Distance-based pricing: `base + per_km * distance`, two decimal places.
#[derive(Debug, Clone, Copy)]
pub struct FarePolicy {
    pub base: Decimal,
    pub per_km: Decimal,
}

impl FarePolicy {
    pub fn new(base: Decimal, per_km: Decimal) -> Self {
        Self { base, per_km }
    }

    /// Fare for the straight line between pickup and drop.
    pub fn quote(&self, pickup: &GeoPoint, drop: &GeoPoint) -> Result<Decimal, AppError> {
        self.for_distance(haversine_km(pickup, drop))
    }

    pub fn for_distance(&self, distance_km: f64) -> Result<Decimal, AppError> {
        let distance = Decimal::from_f64(distance_km.max(0.0)).ok_or_else(|| {
            AppError::InvalidInput(format!("distance {distance_km} is not representable"))
        })?;

        let mut fare = (self.base + self.per_km * distance)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        fare.rescale(2);
        Ok(fare)
    }
}

impl Default for FarePolicy {
    fn default() -> Self {
        Self::new(Decimal::from(25), Decimal::from(8))
    }
}
