use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::store::non_blank;
use crate::store::table::{claim_all, Row, Table, UniqueIndex};

impl Row for Driver {
    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

pub struct DriverStore {
    table: Table<Driver>,
    by_clerk_id: UniqueIndex,
    by_phone: UniqueIndex,
    by_referral_code: UniqueIndex,
}

impl DriverStore {
    pub fn new() -> Self {
        Self {
            table: Table::new("driver"),
            by_clerk_id: UniqueIndex::new("clerkDriverId"),
            by_phone: UniqueIndex::new("phoneNumber"),
            by_referral_code: UniqueIndex::new("referralCode"),
        }
    }

    pub fn insert(&self, mut driver: Driver) -> Result<Driver, AppError> {
        let id = self.table.allocate_id();
        let now = Utc::now();
        driver.id = id;
        driver.created_at = now;
        driver.updated_at = now;

        claim_all(
            &[
                (&self.by_clerk_id, Some(driver.clerk_driver_id.as_str())),
                (&self.by_phone, Some(driver.phone_number.as_str())),
                (&self.by_referral_code, non_blank(&driver.referral_code)),
            ],
            id,
        )?;

        self.table.insert(id, driver.clone());
        Ok(driver)
    }

    pub fn get(&self, id: i64) -> Result<Driver, AppError> {
        self.table.require(id)
    }

    pub fn by_clerk_id(&self, clerk_driver_id: &str) -> Result<Driver, AppError> {
        self.by_clerk_id
            .lookup(clerk_driver_id)
            .and_then(|id| self.table.get(id))
            .ok_or_else(|| AppError::NotFound(format!("driver {clerk_driver_id} not found")))
    }

    pub fn update(
        &self,
        clerk_driver_id: &str,
        change: impl FnOnce(&mut Driver) -> Result<(), AppError>,
    ) -> Result<Driver, AppError> {
        let id = self
            .by_clerk_id
            .lookup(clerk_driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {clerk_driver_id} not found")))?;

        let ((), driver) = self.table.update(id, change)?;
        Ok(driver)
    }

    pub fn all(&self) -> Vec<Driver> {
        self.table.all()
    }

    pub fn count(&self) -> usize {
        self.table.count()
    }
}

impl Default for DriverStore {
    fn default() -> Self {
        Self::new()
    }
}
