use std::sync::Arc;

use crate::error::AppError;
use crate::geo::{haversine_km, GeoPoint};
use crate::models::driver::Driver;
use crate::models::vehicle::VehicleType;
use crate::store::Store;

/// Drivers' online flag and last known position, joined with their vehicle class.
pub struct DriverRegistry {
    store: Arc<Store>,
    search_radius_km: f64,
}

impl DriverRegistry {
    pub fn new(store: Arc<Store>, search_radius_km: f64) -> Self {
        Self {
            store,
            search_radius_km,
        }
    }

    /// Heartbeat from the driver app. Last writer wins.
    pub fn upsert_location(
        &self,
        clerk_driver_id: &str,
        lat: f64,
        lng: f64,
        is_online: bool,
    ) -> Result<Driver, AppError> {
        if !GeoPoint::new(lat, lng).is_valid() {
            return Err(AppError::InvalidInput(format!(
                "invalid coordinate ({lat}, {lng})"
            )));
        }

        let driver = self.store.drivers.update(clerk_driver_id, |driver| {
            driver.current_latitude = Some(lat);
            driver.current_longitude = Some(lng);
            driver.is_online = is_online;
            driver.last_location_update = Some(chrono::Utc::now());
            Ok(())
        })?;

        tracing::debug!(driver = %clerk_driver_id, lat, lng, is_online, "driver location updated");
        Ok(driver)
    }

    /// Online drivers with a known position within the search radius of `pickup`,
    /// restricted to `vehicle_type` when one is requested. The radius is inclusive.
    pub fn candidates(&self, pickup: &GeoPoint, vehicle_type: Option<VehicleType>) -> Vec<Driver> {
        self.store
            .drivers
            .all()
            .into_iter()
            .filter(|driver| driver.is_online)
            .filter(|driver| {
                driver
                    .location()
                    .is_some_and(|at| haversine_km(pickup, &at) <= self.search_radius_km)
            })
            .filter(|driver| match vehicle_type {
                None => true,
                Some(wanted) => self
                    .store
                    .vehicles
                    .for_driver(driver.id)
                    .is_some_and(|vehicle| vehicle.vehicle_type == wanted),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, Utc};

    use super::DriverRegistry;
    use crate::error::AppError;
    use crate::geo::GeoPoint;
    use crate::models::driver::Driver;
    use crate::models::vehicle::{Vehicle, VehicleStatus, VehicleType};
    use crate::store::Store;

    const PICKUP: GeoPoint = GeoPoint {
        lat: 12.9716,
        lng: 77.5946,
    };
    // One kilometer of latitude on a 6371 km sphere.
    const DEG_PER_KM: f64 = 1.0 / 111.194_926_644_558_73;

    fn driver(store: &Store, clerk_id: &str, phone: &str) -> Driver {
        store
            .drivers
            .insert(Driver {
                id: 0,
                clerk_driver_id: clerk_id.to_string(),
                first_name: "Test".to_string(),
                last_name: "Driver".to_string(),
                phone_number: phone.to_string(),
                user_type: "driver".to_string(),
                is_online: false,
                current_latitude: None,
                current_longitude: None,
                last_location_update: None,
                referral_code: None,
                referred_by: None,
                profile_image: None,
                license_image: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap()
    }

    fn vehicle(store: &Store, driver: &Driver, vehicle_type: VehicleType) {
        let plate = format!("KA01-{}", driver.id);
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        store
            .vehicles
            .insert(Vehicle {
                id: 0,
                driver_id: driver.id,
                clerk_driver_id: driver.clerk_driver_id.clone(),
                vehicle_type,
                vehicle_number: plate.clone(),
                vehicle_model: "Model".to_string(),
                vehicle_brand: "Brand".to_string(),
                vehicle_color: "White".to_string(),
                manufacturing_year: 2022,
                rc_number: format!("RC-{plate}"),
                insurance_number: format!("INS-{plate}"),
                insurance_expiry_date: date,
                pollution_certificate_number: format!("PUC-{plate}"),
                pollution_expiry_date: date,
                vehicle_status: VehicleStatus::Active,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();
    }

    fn ids(drivers: Vec<Driver>) -> Vec<String> {
        let mut ids: Vec<String> = drivers.into_iter().map(|d| d.clerk_driver_id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn upsert_location_of_unknown_driver_is_not_found() {
        let registry = DriverRegistry::new(Arc::new(Store::new()), 5.0);
        let err = registry
            .upsert_location("ghost", 12.0, 77.0, true)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn upsert_location_records_position_and_timestamp() {
        let store = Arc::new(Store::new());
        driver(&store, "d1", "+911");
        let registry = DriverRegistry::new(store, 5.0);

        let updated = registry.upsert_location("d1", 12.97, 77.59, true).unwrap();
        assert!(updated.is_online);
        assert_eq!(updated.current_latitude, Some(12.97));
        assert!(updated.last_location_update.is_some());
    }

    #[test]
    fn candidates_are_online_located_and_within_radius() {
        let store = Arc::new(Store::new());
        for (id, phone) in [("near", "+911"), ("far", "+912"), ("offline", "+913"), ("silent", "+914")] {
            driver(&store, id, phone);
        }
        let registry = DriverRegistry::new(store, 5.0);

        registry
            .upsert_location("near", PICKUP.lat + 2.0 * DEG_PER_KM, PICKUP.lng, true)
            .unwrap();
        registry
            .upsert_location("far", PICKUP.lat + 6.0 * DEG_PER_KM, PICKUP.lng, true)
            .unwrap();
        registry
            .upsert_location("offline", PICKUP.lat, PICKUP.lng, false)
            .unwrap();

        assert_eq!(ids(registry.candidates(&PICKUP, None)), vec!["near"]);
    }

    #[test]
    fn driver_exactly_at_radius_is_included() {
        let store = Arc::new(Store::new());
        driver(&store, "edge", "+911");
        let registry = DriverRegistry::new(store, 5.0);

        registry
            .upsert_location("edge", PICKUP.lat + 5.0 * DEG_PER_KM, PICKUP.lng, true)
            .unwrap();

        assert_eq!(ids(registry.candidates(&PICKUP, None)), vec!["edge"]);
    }

    #[test]
    fn vehicle_class_filters_candidates() {
        let store = Arc::new(Store::new());
        let cab = driver(&store, "cab", "+911");
        let bike = driver(&store, "bike", "+912");
        driver(&store, "no-vehicle", "+913");
        vehicle(&store, &cab, VehicleType::Cab);
        vehicle(&store, &bike, VehicleType::Bike);
        let registry = DriverRegistry::new(store, 5.0);

        for id in ["cab", "bike", "no-vehicle"] {
            registry
                .upsert_location(id, PICKUP.lat, PICKUP.lng, true)
                .unwrap();
        }

        assert_eq!(
            ids(registry.candidates(&PICKUP, Some(VehicleType::Cab))),
            vec!["cab"]
        );
        assert_eq!(
            ids(registry.candidates(&PICKUP, None)),
            vec!["bike", "cab", "no-vehicle"]
        );
    }
}
