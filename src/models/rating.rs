use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: i64,
    pub trip_id: i64,
    pub clerk_user_id: String,
    pub clerk_driver_id: String,
    pub user_rating: Option<u8>,
    pub driver_rating: Option<u8>,
    pub user_feedback: Option<String>,
    pub driver_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}
