use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Cash,
    Online,
    Wallet,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// `Pending -> Pending` covers order re-issue on retry.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;

        matches!(
            (self, next),
            (Pending, Pending) | (Pending, Success) | (Pending, Failed) | (Success, Refunded)
        )
    }

    /// Amount and trip reference are frozen from here on.
    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Refunded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub trip_id: i64,
    pub clerk_user_id: String,
    pub clerk_driver_id: Option<String>,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_gateway: String,
    pub gateway_order_id: String,
    pub transaction_id: String,
    pub gateway_response: String,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
