use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use crate::clients::identity::{parse_date, IdentityClaims, IdentityVerifier, UserType};
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::rider::Rider;
use crate::models::vehicle::{Vehicle, VehicleStatus, VehicleType};
use crate::store::Store;

/// Optional profile edits; blank values leave the stored field alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub profile_image: Option<Vec<u8>>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    pub clerk_driver_id: String,
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
    pub vehicle_model: String,
    pub vehicle_brand: String,
    pub vehicle_color: String,
    pub manufacturing_year: i32,
    pub rc_number: String,
    pub insurance_number: String,
    pub insurance_expiry_date: NaiveDate,
    pub pollution_certificate_number: String,
    pub pollution_expiry_date: NaiveDate,
    pub vehicle_status: Option<VehicleStatus>,
}

/// Onboarding of riders, drivers and vehicles from verified identity tokens.
pub struct Accounts {
    store: Arc<Store>,
    verifier: Arc<IdentityVerifier>,
}

impl Accounts {
    pub fn new(store: Arc<Store>, verifier: Arc<IdentityVerifier>) -> Self {
        Self { store, verifier }
    }

    pub async fn create_rider(
        &self,
        token: &str,
        profile_image: Option<Vec<u8>>,
    ) -> Result<Rider, AppError> {
        let claims = self.verifier.verify(token).await?;
        require_role(&claims, UserType::Rider)?;
        let profile = claims.require_profile()?;
        let metadata = claims.metadata();

        let rider = self.store.riders.insert(Rider {
            id: 0,
            clerk_user_id: profile.external_id,
            phone_number: profile.phone_number,
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: claims.email(),
            user_type: profile.user_type.as_str().to_string(),
            date_of_birth: metadata.date_of_birth()?,
            gender: metadata.gender()?,
            user_emergency_contact_name: non_blank(metadata.user_emergency_contact_name),
            user_emergency_contact_number: non_blank(metadata.user_emergency_contact_number),
            referral_code: non_blank(metadata.referral_code),
            referred_by: non_blank(metadata.referred_by),
            profile_image: profile_image.filter(|bytes| !bytes.is_empty()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })?;

        info!(rider_id = rider.id, clerk_user_id = %rider.clerk_user_id, "rider created");
        Ok(rider)
    }

    pub fn rider(&self, clerk_user_id: &str) -> Result<Rider, AppError> {
        self.store.riders.by_clerk_id(clerk_user_id)
    }

    /// The rider is taken from the bearer token, never from the request body.
    pub async fn update_profile(&self, token: &str, update: ProfileUpdate) -> Result<Rider, AppError> {
        let claims = self.verifier.verify(token).await?;
        let clerk_user_id = claims
            .sub
            .as_deref()
            .map(str::trim)
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| AppError::Unauthenticated("token has no subject".to_string()))?;

        let date_of_birth = parse_date(update.date_of_birth.as_deref())?;
        let rider = self.store.riders.update(clerk_user_id, |rider| {
            if let Some(image) = update.profile_image.filter(|bytes| !bytes.is_empty()) {
                rider.profile_image = Some(image);
            }
            if let Some(name) = non_blank(update.emergency_contact_name) {
                rider.user_emergency_contact_name = Some(name);
            }
            if let Some(number) = non_blank(update.emergency_contact_number) {
                rider.user_emergency_contact_number = Some(number);
            }
            if let Some(date) = date_of_birth {
                rider.date_of_birth = Some(date);
            }
            Ok(())
        })?;

        info!(rider_id = rider.id, "rider profile updated");
        Ok(rider)
    }

    pub async fn create_driver(
        &self,
        token: &str,
        profile_image: Option<Vec<u8>>,
        license_image: Option<Vec<u8>>,
    ) -> Result<Driver, AppError> {
        let claims = self.verifier.verify(token).await?;
        require_role(&claims, UserType::Driver)?;
        let profile = claims.require_profile()?;
        let metadata = claims.metadata();

        let driver = self.store.drivers.insert(Driver {
            id: 0,
            clerk_driver_id: profile.external_id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            phone_number: profile.phone_number,
            user_type: profile.user_type.as_str().to_string(),
            is_online: false,
            current_latitude: None,
            current_longitude: None,
            last_location_update: None,
            referral_code: non_blank(metadata.referral_code),
            referred_by: non_blank(metadata.referred_by),
            profile_image: profile_image.filter(|bytes| !bytes.is_empty()),
            license_image: license_image.filter(|bytes| !bytes.is_empty()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })?;

        info!(driver_id = driver.id, clerk_driver_id = %driver.clerk_driver_id, "driver created");
        Ok(driver)
    }

    /// The onboarded driver behind a bearer token.
    pub async fn authenticated_driver(&self, token: &str) -> Result<Driver, AppError> {
        let claims = self.verifier.verify(token).await?;
        require_role(&claims, UserType::Driver)?;
        let clerk_driver_id = claims
            .sub
            .as_deref()
            .map(str::trim)
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| AppError::Unauthenticated("token has no subject".to_string()))?;

        self.store.drivers.by_clerk_id(clerk_driver_id)
    }

    pub fn driver(&self, id: i64) -> Result<Driver, AppError> {
        self.store.drivers.get(id)
    }

    pub fn driver_by_clerk_id(&self, clerk_driver_id: &str) -> Result<Driver, AppError> {
        self.store.drivers.by_clerk_id(clerk_driver_id)
    }

    pub fn register_vehicle(&self, vehicle: NewVehicle) -> Result<Vehicle, AppError> {
        let driver = self.store.drivers.by_clerk_id(vehicle.clerk_driver_id.trim())?;

        let required = [
            ("vehicleNumber", &vehicle.vehicle_number),
            ("rcNumber", &vehicle.rc_number),
            ("insuranceNumber", &vehicle.insurance_number),
            ("pollutionCertificateNumber", &vehicle.pollution_certificate_number),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AppError::InvalidInput(format!("{field} is required")));
        }

        let vehicle = self.store.vehicles.insert(Vehicle {
            id: 0,
            driver_id: driver.id,
            clerk_driver_id: driver.clerk_driver_id,
            vehicle_type: vehicle.vehicle_type,
            vehicle_number: vehicle.vehicle_number.trim().to_string(),
            vehicle_model: vehicle.vehicle_model,
            vehicle_brand: vehicle.vehicle_brand,
            vehicle_color: vehicle.vehicle_color,
            manufacturing_year: vehicle.manufacturing_year,
            rc_number: vehicle.rc_number.trim().to_string(),
            insurance_number: vehicle.insurance_number.trim().to_string(),
            insurance_expiry_date: vehicle.insurance_expiry_date,
            pollution_certificate_number: vehicle.pollution_certificate_number.trim().to_string(),
            pollution_expiry_date: vehicle.pollution_expiry_date,
            vehicle_status: vehicle.vehicle_status.unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })?;

        info!(vehicle_id = vehicle.id, driver_id = vehicle.driver_id, vehicle_type = ?vehicle.vehicle_type, "vehicle registered");
        Ok(vehicle)
    }

    pub fn vehicle_for_driver(&self, driver_id: i64) -> Result<Vehicle, AppError> {
        self.store
            .vehicles
            .for_driver(driver_id)
            .ok_or_else(|| AppError::NotFound(format!("vehicle for driver {driver_id} not found")))
    }
}

fn require_role(claims: &IdentityClaims, role: UserType) -> Result<(), AppError> {
    let user_type = claims.user_type.as_deref().unwrap_or_default().trim();
    if user_type.eq_ignore_ascii_case(role.as_str()) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "userType '{user_type}' is not a {}",
            role.as_str()
        )))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::NaiveDate;
    use serde_json::json;

    use super::{require_role, Accounts, NewVehicle};
    use crate::clients::identity::{IdentityClaims, IdentityVerifier, UserType};
    use crate::error::AppError;
    use crate::models::driver::Driver;
    use crate::models::vehicle::{VehicleStatus, VehicleType};
    use crate::store::Store;

    fn accounts(store: Arc<Store>) -> Accounts {
        // Never contacted: these tests do not verify tokens.
        let verifier = IdentityVerifier::new(
            "http://127.0.0.1:9/jwks".to_string(),
            Duration::from_millis(50),
            Duration::ZERO,
        )
        .unwrap();
        Accounts::new(store, Arc::new(verifier))
    }

    fn driver(store: &Store) -> Driver {
        store
            .drivers
            .insert(Driver {
                id: 0,
                clerk_driver_id: "d1".to_string(),
                first_name: "Dev".to_string(),
                last_name: "Driver".to_string(),
                phone_number: "+911".to_string(),
                user_type: "driver".to_string(),
                is_online: false,
                current_latitude: None,
                current_longitude: None,
                last_location_update: None,
                referral_code: None,
                referred_by: None,
                profile_image: None,
                license_image: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .unwrap()
    }

    fn vehicle(plate: &str) -> NewVehicle {
        let date = NaiveDate::from_ymd_opt(2030, 6, 30).unwrap();
        NewVehicle {
            clerk_driver_id: "d1".to_string(),
            vehicle_type: VehicleType::Cab,
            vehicle_number: plate.to_string(),
            vehicle_model: "Dzire".to_string(),
            vehicle_brand: "Maruti".to_string(),
            vehicle_color: "White".to_string(),
            manufacturing_year: 2021,
            rc_number: format!("RC-{plate}"),
            insurance_number: format!("INS-{plate}"),
            insurance_expiry_date: date,
            pollution_certificate_number: format!("PUC-{plate}"),
            pollution_expiry_date: date,
            vehicle_status: None,
        }
    }

    #[test]
    fn role_check_is_case_insensitive() {
        let claims: IdentityClaims = serde_json::from_value(json!({ "userType": "Driver" })).unwrap();
        assert!(require_role(&claims, UserType::Driver).is_ok());
        assert!(matches!(
            require_role(&claims, UserType::Rider),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_role(&IdentityClaims::default(), UserType::Rider),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn vehicle_defaults_to_active_and_is_one_per_driver() {
        let store = Arc::new(Store::new());
        let owner = driver(&store);
        let accounts = accounts(store);

        let registered = accounts.register_vehicle(vehicle("KA01AB1234")).unwrap();
        assert_eq!(registered.vehicle_status, VehicleStatus::Active);
        assert_eq!(registered.driver_id, owner.id);
        assert_eq!(accounts.vehicle_for_driver(owner.id).unwrap().id, registered.id);

        let err = accounts.register_vehicle(vehicle("KA01AB9999")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn vehicle_for_unknown_driver_is_not_found() {
        let accounts = accounts(Arc::new(Store::new()));
        assert!(matches!(
            accounts.register_vehicle(vehicle("KA01AB1234")),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(accounts.vehicle_for_driver(1), Err(AppError::NotFound(_))));
    }

    #[test]
    fn blank_registration_number_is_invalid() {
        let store = Arc::new(Store::new());
        driver(&store);
        let accounts = accounts(store);

        let mut blank = vehicle("KA01AB1234");
        blank.rc_number = "  ".to_string();
        assert!(matches!(
            accounts.register_vehicle(blank),
            Err(AppError::InvalidInput(_))
        ));
    }
}
