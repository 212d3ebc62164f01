use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleType {
    #[serde(alias = "bike")]
    Bike,
    #[serde(alias = "auto")]
    Auto,
    #[serde(alias = "cab")]
    Cab,
    #[serde(alias = "parcel")]
    Parcel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    #[default]
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "inactive")]
    Inactive,
    #[serde(alias = "under_verification")]
    UnderVerification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: i64,
    pub driver_id: i64,
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
    pub vehicle_status: VehicleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
