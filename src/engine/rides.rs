use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clients::relay::{driver_room, user_room, EventKind, EventRelay, RelayEvent};
use crate::engine::fare::FarePolicy;
use crate::engine::queue::{DispatchJob, DispatchQueue};
use crate::engine::tracking::Tracker;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::trip::{Trip, TripPaymentStatus, TripStatus};
use crate::models::vehicle::VehicleType;
use crate::observability::metrics::Metrics;
use crate::store::Store;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub clerk_user_id: String,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub drop_latitude: f64,
    pub drop_longitude: f64,
    pub vehicle_type: Option<VehicleType>,
    pub notes: Option<String>,
    pub payment_mode: Option<String>,
}

/// The ride lifecycle. Sole writer of a trip's status, driver and fare.
pub struct RideEngine {
    store: Arc<Store>,
    fares: FarePolicy,
    tracker: Arc<Tracker>,
    relay: Arc<EventRelay>,
    queue: DispatchQueue,
    metrics: Metrics,
}

/// What the rider receives on accept: the trip plus the code that unlocks `start`.
#[derive(Serialize)]
struct AcceptedRide<'a> {
    #[serde(flatten)]
    trip: &'a Trip,
    otp: &'a str,
}

impl RideEngine {
    pub fn new(
        store: Arc<Store>,
        fares: FarePolicy,
        tracker: Arc<Tracker>,
        relay: Arc<EventRelay>,
        queue: DispatchQueue,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            fares,
            tracker,
            relay,
            queue,
            metrics,
        }
    }

    /// Persists a pending trip with a quoted fare, then queues it for dispatch.
    /// A failed enqueue is logged; the trip stands.
    pub async fn request(&self, request: RideRequest) -> Result<Trip, AppError> {
        let rider = self.store.riders.by_clerk_id(request.clerk_user_id.trim())?;

        let pickup = GeoPoint::new(request.pickup_latitude, request.pickup_longitude);
        let drop = GeoPoint::new(request.drop_latitude, request.drop_longitude);
        if !pickup.is_valid() || !drop.is_valid() {
            return Err(AppError::InvalidInput(
                "pickup and drop must be valid coordinates".to_string(),
            ));
        }

        let fare = self.fares.quote(&pickup, &drop)?;
        let payment_mode = request
            .payment_mode
            .map(|mode| mode.trim().to_ascii_uppercase())
            .filter(|mode| !mode.is_empty());

        let trip = self.store.trips.insert(Trip {
            id: 0,
            clerk_user_id: rider.clerk_user_id,
            clerk_driver_id: None,
            pickup_latitude: pickup.lat,
            pickup_longitude: pickup.lng,
            drop_latitude: drop.lat,
            drop_longitude: drop.lng,
            vehicle_type: request.vehicle_type,
            notes: request.notes.unwrap_or_default(),
            status: TripStatus::Pending,
            fare: Some(fare),
            payment_status: TripPaymentStatus::Pending,
            payment_mode,
            start_otp: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });

        self.metrics.record_transition("request", "success");
        info!(ride_id = trip.id, rider = %trip.clerk_user_id, fare = %fare, "ride requested");

        if let Err(err) = self.queue.enqueue(DispatchJob { trip_id: trip.id }).await {
            warn!(ride_id = trip.id, error = %err, "ride not queued for dispatch");
        }

        Ok(trip)
    }

    /// First driver wins. The status check and the write happen under the trip's row
    /// lock, so concurrent accepts see exactly one success.
    pub async fn accept(&self, trip_id: i64, clerk_driver_id: &str) -> Result<Trip, AppError> {
        let driver = self.store.drivers.by_clerk_id(clerk_driver_id.trim())?;
        let otp = start_code();

        let trip = self.transition(trip_id, "accept", |trip| {
            if trip.status != TripStatus::Pending {
                return Err(AppError::InvalidState("already-taken".to_string()));
            }
            trip.clerk_driver_id = Some(driver.clerk_driver_id.clone());
            trip.status = TripStatus::Accepted;
            trip.start_otp = Some(otp.clone());
            Ok(())
        })?;

        let accepted = AcceptedRide {
            trip: &trip,
            otp: &otp,
        };
        self.announce_payload(
            EventKind::RideAccepted,
            user_room(&trip.clerk_user_id),
            trip.id,
            &accepted,
        )
        .await;
        Ok(trip)
    }

    /// The rider's start code for an accepted ride. Only the rider who booked it may read it.
    pub fn start_otp(&self, trip_id: i64, clerk_user_id: &str) -> Result<String, AppError> {
        let trip = self.store.trips.get(trip_id)?;
        if trip.clerk_user_id != clerk_user_id.trim() {
            return Err(AppError::Forbidden(format!(
                "ride {trip_id} belongs to another rider"
            )));
        }
        if trip.status.is_terminal() {
            return Err(AppError::InvalidState(format!("ride {trip_id} is closed")));
        }

        trip.start_otp.ok_or_else(|| {
            AppError::InvalidState(format!(
                "ride {trip_id} has no start code in status {}",
                trip.status.as_str()
            ))
        })
    }

    /// Starts the ride once the driver presents the rider's code. When `clerk_driver_id`
    /// is given it must be the assigned driver.
    pub async fn start(
        &self,
        trip_id: i64,
        otp: &str,
        clerk_driver_id: Option<&str>,
    ) -> Result<Trip, AppError> {
        self.transition(trip_id, "start", |trip| {
            if let Some(driver) = clerk_driver_id.map(str::trim) {
                if trip.clerk_driver_id.as_deref() != Some(driver) {
                    return Err(AppError::Forbidden(format!(
                        "driver {driver} is not assigned to ride {}",
                        trip.id
                    )));
                }
            }
            ensure_edge(trip, TripStatus::Started, "start")?;
            if trip.start_otp.as_deref() != Some(otp.trim()) {
                return Err(AppError::InvalidInput("invalid-otp".to_string()));
            }
            trip.status = TripStatus::Started;
            trip.start_otp = None;
            Ok(())
        })
    }

    pub async fn cancel(&self, trip_id: i64) -> Result<Trip, AppError> {
        let trip = self.transition(trip_id, "cancel", |trip| {
            ensure_edge(trip, TripStatus::Cancelled, "cancel")?;
            trip.status = TripStatus::Cancelled;
            Ok(())
        })?;

        self.announce(EventKind::RideCancelled, user_room(&trip.clerk_user_id), &trip)
            .await;
        if let Some(driver) = trip.clerk_driver_id.as_deref() {
            self.announce(EventKind::RideCancelled, driver_room(driver), &trip)
                .await;
        }
        Ok(trip)
    }

    /// Re-prices the trip from its tracked polyline and closes it. The fare covers the
    /// points stored when the row lock is taken. Cash rides are marked paid; everything
    /// else waits for the payment callback.
    pub async fn complete(&self, trip_id: i64) -> Result<Trip, AppError> {
        let mut distance_km = 0.0;

        let trip = self.transition(trip_id, "complete", |trip| {
            ensure_edge(trip, TripStatus::Completed, "complete")?;
            distance_km = self.tracker.polyline_distance(trip.id);
            trip.fare = Some(self.fares.for_distance(distance_km)?);
            trip.status = TripStatus::Completed;
            trip.start_otp = None;
            if trip.is_cash() {
                trip.payment_status = TripPaymentStatus::Paid;
            }
            Ok(())
        })?;

        info!(ride_id = trip.id, distance_km, fare = ?trip.fare, "final fare computed");
        self.announce(EventKind::RideCompleted, user_room(&trip.clerk_user_id), &trip)
            .await;
        Ok(trip)
    }

    pub fn get(&self, trip_id: i64) -> Result<Trip, AppError> {
        self.store.trips.get(trip_id)
    }

    /// Rides the driver has accepted, newest first.
    pub fn history_for_driver(&self, clerk_driver_id: &str) -> Result<Vec<Trip>, AppError> {
        let driver = self.store.drivers.by_clerk_id(clerk_driver_id.trim())?;
        Ok(self.store.trips.for_driver(&driver.clerk_driver_id))
    }

    fn transition(
        &self,
        trip_id: i64,
        name: &'static str,
        change: impl FnOnce(&mut Trip) -> Result<(), AppError>,
    ) -> Result<Trip, AppError> {
        match self.store.trips.update(trip_id, change) {
            Ok(((), trip)) => {
                self.metrics.record_transition(name, "success");
                info!(
                    ride_id = trip.id,
                    transition = name,
                    status = trip.status.as_str(),
                    driver = ?trip.clerk_driver_id,
                    "ride transitioned"
                );
                Ok(trip)
            }
            Err(err) => {
                let outcome = match err {
                    AppError::NotFound(_) => "not_found",
                    AppError::Forbidden(_) => "forbidden",
                    _ => "rejected",
                };
                self.metrics.record_transition(name, outcome);
                warn!(ride_id = trip_id, transition = name, error = %err, "ride transition refused");
                Err(err)
            }
        }
    }

    async fn announce(&self, kind: EventKind, room: String, trip: &Trip) {
        self.announce_payload(kind, room, trip.id, trip).await;
    }

    /// Delivery is best effort once the transition has committed.
    async fn announce_payload(
        &self,
        kind: EventKind,
        room: String,
        trip_id: i64,
        payload: &impl Serialize,
    ) {
        let event = match RelayEvent::new(kind, room, payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(ride_id = trip_id, error = %err, "event not built");
                return;
            }
        };

        if let Err(err) = self.relay.emit(&event).await {
            warn!(ride_id = trip_id, kind = ?event.kind, room = %event.room, error = %err, "event not delivered");
        }
    }
}

/// Four random digits.
fn start_code() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

fn ensure_edge(trip: &Trip, next: TripStatus, action: &str) -> Result<(), AppError> {
    if trip.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidState(format!(
            "cannot {action} ride {} in status {}",
            trip.id,
            trip.status.as_str()
        )))
    }
}
