use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::vehicle::Vehicle;
use crate::store::table::{claim_all, Row, Table, UniqueIndex};

impl Row for Vehicle {
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

pub struct VehicleStore {
    table: Table<Vehicle>,
    by_driver: UniqueIndex,
    by_number: UniqueIndex,
    by_rc: UniqueIndex,
    by_insurance: UniqueIndex,
    by_pollution_certificate: UniqueIndex,
}

impl VehicleStore {
    pub fn new() -> Self {
        Self {
            table: Table::new("vehicle"),
            by_driver: UniqueIndex::new("driverId"),
            by_number: UniqueIndex::new("vehicleNumber"),
            by_rc: UniqueIndex::new("rcNumber"),
            by_insurance: UniqueIndex::new("insuranceNumber"),
            by_pollution_certificate: UniqueIndex::new("pollutionCertificateNumber"),
        }
    }

    pub fn insert(&self, mut vehicle: Vehicle) -> Result<Vehicle, AppError> {
        let id = self.table.allocate_id();
        let now = Utc::now();
        vehicle.id = id;
        vehicle.created_at = now;
        vehicle.updated_at = now;

        let driver_key = vehicle.driver_id.to_string();
        claim_all(
            &[
                (&self.by_driver, Some(driver_key.as_str())),
                (&self.by_number, Some(vehicle.vehicle_number.as_str())),
                (&self.by_rc, Some(vehicle.rc_number.as_str())),
                (&self.by_insurance, Some(vehicle.insurance_number.as_str())),
                (
                    &self.by_pollution_certificate,
                    Some(vehicle.pollution_certificate_number.as_str()),
                ),
            ],
            id,
        )?;

        self.table.insert(id, vehicle.clone());
        Ok(vehicle)
    }

    pub fn for_driver(&self, driver_id: i64) -> Option<Vehicle> {
        self.by_driver
            .lookup(&driver_id.to_string())
            .and_then(|id| self.table.get(id))
    }
}

impl Default for VehicleStore {
    fn default() -> Self {
        Self::new()
    }
}
