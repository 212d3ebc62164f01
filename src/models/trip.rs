use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::models::vehicle::VehicleType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TripStatus {
    Pending,
    Accepted,
    Started,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// Edges of the ride lifecycle. Anything not listed here is rejected.
    pub fn can_transition_to(self, next: TripStatus) -> bool {
        use TripStatus::*;

        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Cancelled)
                | (Accepted, Started)
                | (Accepted, Cancelled)
                | (Accepted, Completed)
                | (Started, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::Pending => "PENDING",
            TripStatus::Accepted => "ACCEPTED",
            TripStatus::Started => "STARTED",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TripPaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: i64,
    pub clerk_user_id: String,
    pub clerk_driver_id: Option<String>,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub drop_latitude: f64,
    pub drop_longitude: f64,
    pub vehicle_type: Option<VehicleType>,
    pub notes: String,
    pub status: TripStatus,
    pub fare: Option<Decimal>,
    pub payment_status: TripPaymentStatus,
    pub payment_mode: Option<String>,
    /// Code the rider reads out to the driver; set on accept, never serialized.
    #[serde(skip)]
    pub start_otp: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn pickup(&self) -> GeoPoint {
        GeoPoint::new(self.pickup_latitude, self.pickup_longitude)
    }

    /// Cash rides are settled in hand at drop-off. A ride without a payment mode is
    /// paid online.
    pub fn is_cash(&self) -> bool {
        self.payment_mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("cash"))
    }
}

#[cfg(test)]
mod tests {
    use super::TripStatus::{self, *};

    const ALL: [TripStatus; 5] = [Pending, Accepted, Started, Completed, Cancelled];

    #[test]
    fn only_drawn_edges_are_allowed() {
        let allowed = [
            (Pending, Accepted),
            (Pending, Cancelled),
            (Accepted, Started),
            (Accepted, Cancelled),
            (Accepted, Completed),
            (Started, Completed),
        ];

        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [Completed, Cancelled] {
            assert!(from.is_terminal());
            assert!(ALL.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn started_trip_cannot_be_cancelled() {
        assert!(!Started.can_transition_to(Cancelled));
    }
}
