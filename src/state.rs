use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::clients::identity::IdentityVerifier;
use crate::clients::razorpay::RazorpayClient;
use crate::clients::relay::EventRelay;
use crate::config::Config;
use crate::engine::accounts::Accounts;
use crate::engine::dispatch::{Dispatcher, RetryPolicy};
use crate::engine::fare::FarePolicy;
use crate::engine::payments::PaymentEngine;
use crate::engine::queue::{DispatchJob, DispatchQueue};
use crate::engine::ratings::RatingBook;
use crate::engine::registry::DriverRegistry;
use crate::engine::rides::RideEngine;
use crate::engine::tracking::Tracker;
use crate::error::AppError;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<Store>,
    pub accounts: Accounts,
    pub registry: Arc<DriverRegistry>,
    pub tracker: Arc<Tracker>,
    pub rides: RideEngine,
    pub dispatcher: Dispatcher,
    pub payments: PaymentEngine,
    pub ratings: RatingBook,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Result<(Self, mpsc::Receiver<DispatchJob>), AppError> {
        let store = Arc::new(Store::new());
        let metrics = Metrics::new()?;
        let timeout = config.http_timeout();

        let relay = Arc::new(EventRelay::new(config.relay_url(), timeout)?);
        let verifier = Arc::new(IdentityVerifier::new(
            config.jwks_url.clone(),
            timeout,
            Duration::from_millis(config.jwks_refresh_cooldown_ms),
        )?);
        let gateway = Arc::new(RazorpayClient::new(
            config.razorpay_orders_url.clone(),
            config.razorpay_key_id.clone(),
            config.razorpay_key_secret.clone(),
            timeout,
        )?);

        let registry = Arc::new(DriverRegistry::new(store.clone(), config.search_radius_km));
        let tracker = Arc::new(Tracker::new(store.clone()));
        let (queue, dispatch_rx) = DispatchQueue::new(config.dispatch_queue_size, metrics.clone());

        let rides = RideEngine::new(
            store.clone(),
            FarePolicy::new(config.fare_base, config.fare_per_km),
            tracker.clone(),
            relay.clone(),
            queue,
            metrics.clone(),
        );
        let dispatcher = Dispatcher::new(
            registry.clone(),
            relay,
            metrics.clone(),
            RetryPolicy {
                max_attempts: config.dispatch_max_attempts.max(1),
                backoff: Duration::from_millis(config.dispatch_backoff_ms),
            },
        );

        Ok((
            Self {
                accounts: Accounts::new(store.clone(), verifier),
                payments: PaymentEngine::new(store.clone(), gateway, metrics.clone()),
                ratings: RatingBook::new(store.clone()),
                registry,
                tracker,
                rides,
                dispatcher,
                metrics,
                store,
            },
            dispatch_rx,
        ))
    }
}
