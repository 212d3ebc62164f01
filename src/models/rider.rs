use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    #[serde(alias = "male")]
    Male,
    #[serde(alias = "female")]
    Female,
    #[serde(alias = "other")]
    Other,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: i64,
    pub clerk_user_id: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub user_type: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub user_emergency_contact_name: Option<String>,
    pub user_emergency_contact_number: Option<String>,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
    #[serde(skip)]
    pub profile_image: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
