use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: i64,
    pub clerk_driver_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub user_type: String,
    pub is_online: bool,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
    #[serde(skip)]
    pub profile_image: Option<Vec<u8>>,
    #[serde(skip)]
    pub license_image: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// Last reported position, if the driver has ever sent one.
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.current_latitude, self.current_longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}
