use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::clients::relay::{driver_room, EventKind, EventRelay, RelayEvent};
use crate::engine::queue::DispatchJob;
use crate::engine::registry::DriverRegistry;
use crate::error::AppError;
use crate::models::trip::{Trip, TripStatus};
use crate::observability::metrics::Metrics;
use crate::state::AppState;

/// Outcome of one fan-out, by external driver id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub notified: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `backoff * 2^(attempt - 1)`.
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

pub struct Dispatcher {
    registry: Arc<DriverRegistry>,
    relay: Arc<EventRelay>,
    metrics: Metrics,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<DriverRegistry>,
        relay: Arc<EventRelay>,
        metrics: Metrics,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            relay,
            metrics,
            retry,
        }
    }

    /// Sends `ride_request` to every candidate driver concurrently. Individual
    /// failures are logged and reported, never returned.
    pub async fn dispatch(&self, trip: &Trip) -> DispatchReport {
        let candidates = self.registry.candidates(&trip.pickup(), trip.vehicle_type);
        if candidates.is_empty() {
            warn!(ride_id = trip.id, "no candidate drivers in range");
            return DispatchReport::default();
        }

        let sends = candidates.iter().map(|driver| async move {
            let outcome = self.notify(&driver.clerk_driver_id, trip).await;
            (driver.clerk_driver_id.clone(), outcome)
        });

        let mut report = DispatchReport::default();
        for (driver, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => {
                    self.metrics
                        .dispatch_events_total
                        .with_label_values(&["sent"])
                        .inc();
                    report.notified.push(driver);
                }
                Err(err) => {
                    self.metrics
                        .dispatch_events_total
                        .with_label_values(&["failed"])
                        .inc();
                    error!(ride_id = trip.id, driver = %driver, error = %err, "ride request not delivered");
                    report.failed.push(driver);
                }
            }
        }

        info!(
            ride_id = trip.id,
            notified = report.notified.len(),
            failed = report.failed.len(),
            "ride dispatched"
        );
        report
    }

    async fn notify(&self, clerk_driver_id: &str, trip: &Trip) -> Result<(), AppError> {
        let event = RelayEvent::new(EventKind::RideRequest, driver_room(clerk_driver_id), trip)?;

        let mut attempt = 1;
        loop {
            match self.relay.emit(&event).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    debug!(
                        ride_id = trip.id,
                        driver = %clerk_driver_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying ride request"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub async fn run_dispatch_worker(state: Arc<AppState>, mut dispatch_rx: mpsc::Receiver<DispatchJob>) {
    info!("dispatch worker started");

    while let Some(job) = dispatch_rx.recv().await {
        state.metrics.dispatch_queue_depth.dec();

        let trip = match state.store.trips.get(job.trip_id) {
            Ok(trip) => trip,
            Err(err) => {
                error!(ride_id = job.trip_id, error = %err, "dispatch job for unknown ride");
                continue;
            }
        };

        if trip.status != TripStatus::Pending {
            debug!(ride_id = trip.id, status = trip.status.as_str(), "ride no longer pending; skipping dispatch");
            continue;
        }

        state.dispatcher.dispatch(&trip).await;
    }

    warn!("dispatch worker stopped: queue channel closed");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{DispatchReport, Dispatcher, RetryPolicy};
    use crate::clients::relay::EventRelay;
    use crate::engine::registry::DriverRegistry;
    use crate::models::driver::Driver;
    use crate::models::trip::{Trip, TripPaymentStatus, TripStatus};
    use crate::observability::metrics::Metrics;
    use crate::store::Store;

    fn online_driver(store: &Store, clerk_id: &str, phone: &str) {
        store
            .drivers
            .insert(Driver {
                id: 0,
                clerk_driver_id: clerk_id.to_string(),
                first_name: "D".to_string(),
                last_name: "River".to_string(),
                phone_number: phone.to_string(),
                user_type: "driver".to_string(),
                is_online: true,
                current_latitude: Some(12.9716),
                current_longitude: Some(77.5946),
                last_location_update: Some(Utc::now()),
                referral_code: None,
                referred_by: None,
                profile_image: None,
                license_image: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();
    }

    fn pending_trip() -> Trip {
        Trip {
            id: 9,
            clerk_user_id: "u1".to_string(),
            clerk_driver_id: None,
            pickup_latitude: 12.9716,
            pickup_longitude: 77.5946,
            drop_latitude: 12.9352,
            drop_longitude: 77.6245,
            vehicle_type: None,
            notes: String::new(),
            status: TripStatus::Pending,
            fare: None,
            payment_status: TripPaymentStatus::Pending,
            payment_mode: Some("CASH".to_string()),
            start_otp: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn dispatcher(store: Arc<Store>, relay_url: String, max_attempts: u32) -> (Dispatcher, Metrics) {
        let metrics = Metrics::new().unwrap();
        let relay = EventRelay::new(relay_url, Duration::from_secs(2)).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(DriverRegistry::new(store, 5.0)),
            Arc::new(relay),
            metrics.clone(),
            RetryPolicy {
                max_attempts,
                backoff: Duration::from_millis(5),
            },
        );
        (dispatcher, metrics)
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn one_failing_driver_does_not_stop_the_fan_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "room": "driver:bad" })))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "room": "driver:good" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(Store::new());
        online_driver(&store, "good", "+911");
        online_driver(&store, "bad", "+912");
        let (dispatcher, metrics) = dispatcher(store, format!("{}/emit", server.uri()), 2);

        let report = dispatcher.dispatch(&pending_trip()).await;

        assert_eq!(report.notified, vec!["good".to_string()]);
        assert_eq!(report.failed, vec!["bad".to_string()]);
        assert_eq!(metrics.dispatch_events_total.with_label_values(&["sent"]).get(), 1);
        assert_eq!(metrics.dispatch_events_total.with_label_values(&["failed"]).get(), 1);
    }

    #[tokio::test]
    async fn transient_relay_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = Arc::new(Store::new());
        online_driver(&store, "d1", "+911");
        let (dispatcher, _metrics) = dispatcher(store, format!("{}/emit", server.uri()), 3);

        let report = dispatcher.dispatch(&pending_trip()).await;
        assert_eq!(report.notified, vec!["d1".to_string()]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn no_candidates_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (dispatcher, _metrics) =
            dispatcher(Arc::new(Store::new()), format!("{}/emit", server.uri()), 3);

        let report = dispatcher.dispatch(&pending_trip()).await;
        assert_eq!(report, DispatchReport::default());
    }
}
